//! Themed Web UI bundles.
//!
//! The web template tree is copied verbatim into `webui-<theme-id>/`, one
//! stylesheet template is substituted, translations are compiled when a
//! compiler is available, and the tree is packed into every configured
//! archive format.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::Result;
use crate::substitute::{substitute, unresolved};
use crate::theme::ThemeDefinition;
use crate::tools::{Archiver, TranslationCompiler};
use crate::util::{copy_tree, write_bytes, write_string};
use crate::workspace::BuildWorkspace;

pub const STYLESHEET_TEMPLATE: &str = "private/css/theme.css.template";
pub const PRIVATE_STYLESHEET: &str = "private/css/theme.css";
pub const PUBLIC_CSS_DIR: &str = "public/css";
pub const PUBLIC_STYLESHEET: &str = "public/css/theme.css";
pub const TRANSLATION_SOURCE_EXTENSION: &str = "ts";
pub const TRANSLATION_CATALOG_EXTENSION: &str = "qm";

#[must_use]
pub fn bundle_name(theme_id: &str) -> String {
    format!("webui-{theme_id}")
}

#[must_use]
pub fn archive_path(output_dir: &Path, theme_id: &str, extension: &str) -> PathBuf {
    output_dir.join(format!("{}.{extension}", bundle_name(theme_id)))
}

/// Why a web bundle could not be attempted for a theme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unavailable {
    MissingTemplateTree(PathBuf),
    MissingStylesheetTemplate(PathBuf),
}

impl std::fmt::Display for Unavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingTemplateTree(path) => {
                write!(f, "web template tree not found: {}", path.display())
            }
            Self::MissingStylesheetTemplate(path) => {
                write!(f, "stylesheet template not found: {}", path.display())
            }
        }
    }
}

/// Checks that the template tree and its stylesheet template exist.
pub fn check_templates(templates_dir: &Path) -> std::result::Result<(), Unavailable> {
    if !templates_dir.is_dir() {
        return Err(Unavailable::MissingTemplateTree(templates_dir.to_path_buf()));
    }
    let template = templates_dir.join(STYLESHEET_TEMPLATE);
    if !template.is_file() {
        return Err(Unavailable::MissingStylesheetTemplate(template));
    }
    Ok(())
}

/// Substitutes the stylesheet template inside a staged bundle root.
///
/// Returns the stylesheet paths written, relative to `root`.
pub fn apply_stylesheet(theme: &ThemeDefinition, root: &Path) -> Result<Vec<PathBuf>> {
    let template_path = root.join(STYLESHEET_TEMPLATE);
    let template = fs::read_to_string(&template_path)?;
    let missing = unresolved(&template, &theme.colors);
    if !missing.is_empty() {
        tracing::debug!(theme = %theme.id, missing = ?missing, "web stylesheet placeholders left unresolved");
    }
    let themed = substitute(&template, &theme.colors);

    let mut written = vec![PathBuf::from(PRIVATE_STYLESHEET)];
    write_string(&root.join(PRIVATE_STYLESHEET), &themed)?;
    if root.join(PUBLIC_CSS_DIR).is_dir() {
        write_string(&root.join(PUBLIC_STYLESHEET), &themed)?;
        written.push(PathBuf::from(PUBLIC_STYLESHEET));
    }
    fs::remove_file(&template_path)?;
    Ok(written)
}

/// Compiles every `*.ts` source under `root` into a sibling `*.qm` catalog.
///
/// Best-effort: failures are logged and skipped. Returns the catalogs written.
pub fn compile_translations(
    theme_id: &str,
    root: &Path,
    compiler: &dyn TranslationCompiler,
) -> Vec<PathBuf> {
    let sources = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| {
            path.extension()
                .is_some_and(|extension| extension == TRANSLATION_SOURCE_EXTENSION)
        })
        .collect::<Vec<_>>();

    let mut catalogs = Vec::new();
    for source in sources {
        let catalog = source.with_extension(TRANSLATION_CATALOG_EXTENSION);
        match compiler
            .compile(&source)
            .and_then(|bytes| write_bytes(&catalog, &bytes))
        {
            Ok(()) => catalogs.push(catalog),
            Err(error) => tracing::warn!(
                theme = theme_id,
                source = %source.display(),
                %error,
                "translation compile failed; leaving it untranslated"
            ),
        }
    }
    catalogs
}

/// Outcome of a web bundle build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebOutcome {
    Built {
        archives: Vec<PathBuf>,
        translations: usize,
    },
    Skipped(Unavailable),
}

/// Collaborators used to package a bundle.
pub struct WebTools<'a> {
    pub tar: &'a dyn Archiver,
    pub zip: Option<&'a dyn Archiver>,
    pub translations: Option<&'a dyn TranslationCompiler>,
}

/// Builds `<output_dir>/webui-<theme-id>.tar.gz` (and `.zip` when possible).
///
/// A missing template tree or stylesheet template skips the bundle rather than
/// failing. Packaging with the mandatory archiver is fail-fast; the optional
/// zip archiver only logs its failures.
pub fn build(
    theme: &ThemeDefinition,
    templates_dir: &Path,
    output_dir: &Path,
    tools: &WebTools<'_>,
    scratch_dir: Option<&Path>,
) -> Result<WebOutcome> {
    if let Err(unavailable) = check_templates(templates_dir) {
        tracing::warn!(theme = %theme.id, reason = %unavailable, "web bundle skipped");
        return Ok(WebOutcome::Skipped(unavailable));
    }

    let workspace = BuildWorkspace::create(&theme.id, scratch_dir)?;
    let root_name = bundle_name(&theme.id);
    let root = workspace.join(&root_name);

    let copied = copy_tree(templates_dir, &root)?;
    apply_stylesheet(theme, &root)?;
    tracing::debug!(theme = %theme.id, files = copied.len(), "web tree staged");

    let translations = tools
        .translations
        .map(|compiler| compile_translations(&theme.id, &root, compiler).len())
        .unwrap_or_default();

    let mut archives = Vec::new();
    let tarball = tools.tar.pack(workspace.path(), &root_name)?;
    let tar_path = archive_path(output_dir, &theme.id, tools.tar.extension());
    write_bytes(&tar_path, &tarball)?;
    archives.push(tar_path);

    if let Some(zip) = tools.zip {
        match zip.pack(workspace.path(), &root_name) {
            Ok(bytes) => {
                let zip_path = archive_path(output_dir, &theme.id, zip.extension());
                write_bytes(&zip_path, &bytes)?;
                archives.push(zip_path);
            }
            Err(error) => {
                tracing::warn!(theme = %theme.id, %error, "zip packaging failed; shipping tarball only");
            }
        }
    }

    Ok(WebOutcome::Built {
        archives,
        translations,
    })
}
