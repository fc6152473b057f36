//! Desktop-client theme archives.
//!
//! Layout of the client template directory:
//!
//! ```text
//! stylesheet.qss   substituted
//! config.json      substituted
//! icons/**         *.svg substituted, everything else copied as-is
//! ```
//!
//! Staged files are listed in a Qt resource collection (`resources.qrc`) and
//! compiled into a single `<theme-id>.qbtheme` container.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{ForgeError, Result};
use crate::substitute::{substitute, unresolved};
use crate::theme::ThemeDefinition;
use crate::tools::ResourceCompiler;
use crate::util::{ensure_dir, relative_to, slash_path, write_bytes, write_string};
use crate::workspace::BuildWorkspace;

pub const STYLESHEET: &str = "stylesheet.qss";
pub const CONFIG: &str = "config.json";
pub const ICONS_DIR: &str = "icons";
pub const MANIFEST: &str = "resources.qrc";
pub const RESOURCE_PREFIX: &str = "/uitheme";
pub const ARCHIVE_EXTENSION: &str = "qbtheme";

#[must_use]
pub fn archive_path(output_dir: &Path, theme_id: &str) -> PathBuf {
    output_dir.join(format!("{theme_id}.{ARCHIVE_EXTENSION}"))
}

fn is_vector_icon(path: &Path) -> bool {
    path.extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("svg"))
}

fn substitute_file(theme: &ThemeDefinition, source: &Path, target: &Path) -> Result<()> {
    let template = fs::read_to_string(source)?;
    let missing = unresolved(&template, &theme.colors);
    if !missing.is_empty() {
        tracing::debug!(
            theme = %theme.id,
            template = %source.display(),
            missing = ?missing,
            "placeholders left unresolved"
        );
    }
    write_string(target, &substitute(&template, &theme.colors))
}

/// Writes the themed client files into `staging` and returns their relative paths.
pub fn stage(
    theme: &ThemeDefinition,
    templates_dir: &Path,
    staging: &Path,
) -> Result<Vec<PathBuf>> {
    for required in [STYLESHEET, CONFIG] {
        let path = templates_dir.join(required);
        if !path.is_file() {
            return Err(ForgeError::MissingPath { path });
        }
    }

    let mut staged = Vec::new();
    for name in [STYLESHEET, CONFIG] {
        substitute_file(theme, &templates_dir.join(name), &staging.join(name))?;
        staged.push(PathBuf::from(name));
    }

    let icons = templates_dir.join(ICONS_DIR);
    if icons.is_dir() {
        ensure_dir(&staging.join(ICONS_DIR))?;
        for entry in WalkDir::new(&icons).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(relative) = relative_to(templates_dir, entry.path()) else {
                continue;
            };
            let target = staging.join(&relative);
            if is_vector_icon(entry.path()) {
                substitute_file(theme, entry.path(), &target)?;
            } else {
                write_bytes(&target, &fs::read(entry.path())?)?;
            }
            staged.push(relative);
        }
    }

    Ok(staged)
}

/// Renders the Qt resource collection listing every staged file.
#[must_use]
pub fn render_manifest(files: &[PathBuf]) -> String {
    let mut entries = files.iter().map(|path| slash_path(path)).collect::<Vec<_>>();
    entries.sort();
    entries.dedup();

    let mut manifest = String::from("<!DOCTYPE RCC>\n<RCC version=\"1.0\">\n");
    manifest.push_str(&format!("  <qresource prefix=\"{RESOURCE_PREFIX}\">\n"));
    for entry in &entries {
        let escaped = entry
            .split('/')
            .map(|part| v_htmlescape::escape(part).to_string())
            .collect::<Vec<_>>()
            .join("/");
        manifest.push_str(&format!("    <file>{escaped}</file>\n"));
    }
    manifest.push_str("  </qresource>\n</RCC>\n");
    manifest
}

/// Builds `<output_dir>/<theme-id>.qbtheme` for one theme.
pub fn build(
    theme: &ThemeDefinition,
    templates_dir: &Path,
    output_dir: &Path,
    compiler: &dyn ResourceCompiler,
    scratch_dir: Option<&Path>,
) -> Result<PathBuf> {
    let workspace = BuildWorkspace::create(&theme.id, scratch_dir)?;
    let staged = stage(theme, templates_dir, workspace.path())?;

    let manifest = workspace.join(MANIFEST);
    write_string(&manifest, &render_manifest(&staged))?;
    tracing::debug!(theme = %theme.id, files = staged.len(), "client manifest written");

    let compiled = compiler.compile(&manifest)?;
    let target = archive_path(output_dir, &theme.id);
    write_bytes(&target, &compiled)?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use tempfile::tempdir;

    use super::{build, render_manifest, stage};
    use crate::error::{ForgeError, Result};
    use crate::theme::ThemeDefinition;
    use crate::tools::ResourceCompiler;
    use crate::util::{write_bytes, write_string};

    const PNG_BYTES: [u8; 7] = [0x89, b'P', b'N', b'G', b'%', b'A', b'%'];

    fn theme() -> ThemeDefinition {
        ThemeDefinition {
            id: "dracula".to_string(),
            source: PathBuf::from("dracula.json"),
            colors: BTreeMap::from([
                ("BG_PRIMARY".to_string(), "#1e1e2e".to_string()),
                ("ACCENT".to_string(), "#89b4fa".to_string()),
            ]),
        }
    }

    fn write_templates(dir: &Path) {
        write_string(&dir.join("stylesheet.qss"), "QWidget { background: %BG_PRIMARY%; }")
            .expect("stylesheet");
        write_string(
            &dir.join("config.json"),
            r#"{"colors":{"Palette.Window":"%BG_PRIMARY%","X":"%UNKNOWN%"}}"#,
        )
        .expect("config");
        write_string(
            &dir.join("icons/status/ok.svg"),
            r#"<svg><path fill="%ACCENT%"/></svg>"#,
        )
        .expect("svg icon");
        write_bytes(&dir.join("icons/app.png"), &PNG_BYTES).expect("png icon");
    }

    /// Records the manifest it saw and returns it as the "compiled" payload.
    #[derive(Default)]
    struct EchoCompiler {
        seen: Mutex<Vec<PathBuf>>,
    }

    impl ResourceCompiler for EchoCompiler {
        fn compile(&self, manifest: &Path) -> Result<Vec<u8>> {
            self.seen.lock().expect("lock").push(manifest.to_path_buf());
            Ok(fs::read(manifest)?)
        }
    }

    struct FailingCompiler;

    impl ResourceCompiler for FailingCompiler {
        fn compile(&self, _manifest: &Path) -> Result<Vec<u8>> {
            Err(ForgeError::ExternalCommandFailed {
                command: "rcc".to_string(),
                exit_code: 1,
            })
        }
    }

    #[test]
    fn stage_substitutes_text_and_svg_but_copies_binary_icons() {
        let temp = tempdir().expect("tempdir");
        let templates = temp.path().join("templates");
        let staging = temp.path().join("staging");
        write_templates(&templates);

        let staged = stage(&theme(), &templates, &staging).expect("stage");
        assert_eq!(staged.len(), 4);

        assert_eq!(
            fs::read_to_string(staging.join("stylesheet.qss")).expect("read"),
            "QWidget { background: #1e1e2e; }"
        );
        assert_eq!(
            fs::read_to_string(staging.join("config.json")).expect("read"),
            r##"{"colors":{"Palette.Window":"#1e1e2e","X":"%UNKNOWN%"}}"##
        );
        assert_eq!(
            fs::read_to_string(staging.join("icons/status/ok.svg")).expect("read"),
            r##"<svg><path fill="#89b4fa"/></svg>"##
        );
        assert_eq!(
            fs::read(staging.join("icons/app.png")).expect("read"),
            PNG_BYTES.to_vec()
        );
    }

    #[test]
    fn stage_requires_both_primary_templates() {
        let temp = tempdir().expect("tempdir");
        let templates = temp.path().join("templates");
        write_string(&templates.join("stylesheet.qss"), "x").expect("stylesheet");

        let staging = temp.path().join("staging");
        match stage(&theme(), &templates, &staging).expect_err("missing config") {
            ForgeError::MissingPath { path } => assert_eq!(path, templates.join("config.json")),
            other => panic!("expected MissingPath, got {other}"),
        }
    }

    #[test]
    fn manifest_lists_sorted_escaped_entries_under_prefix() {
        let manifest = render_manifest(&[
            PathBuf::from("stylesheet.qss"),
            PathBuf::from("config.json"),
            PathBuf::from("icons/a&b.svg"),
        ]);
        let expected = "<!DOCTYPE RCC>\n<RCC version=\"1.0\">\n  <qresource prefix=\"/uitheme\">\n    <file>config.json</file>\n    <file>icons/a&amp;b.svg</file>\n    <file>stylesheet.qss</file>\n  </qresource>\n</RCC>\n";
        assert_eq!(manifest, expected);
    }

    #[test]
    fn build_writes_compiled_archive_and_discards_workspace() {
        let temp = tempdir().expect("tempdir");
        let templates = temp.path().join("templates");
        let output = temp.path().join("out");
        let scratch = temp.path().join("scratch");
        write_templates(&templates);

        let compiler = EchoCompiler::default();
        let archive =
            build(&theme(), &templates, &output, &compiler, Some(&scratch)).expect("build");

        assert_eq!(archive, output.join("dracula.qbtheme"));
        let payload = fs::read_to_string(&archive).expect("read archive");
        assert!(payload.contains("<file>icons/status/ok.svg</file>"));
        assert!(payload.contains("<file>icons/app.png</file>"));

        let seen = compiler.seen.lock().expect("lock");
        assert_eq!(seen.len(), 1);
        assert!(!seen[0].exists(), "workspace manifest should be gone after build");
        assert_eq!(fs::read_dir(&scratch).expect("scratch").count(), 0);
    }

    #[test]
    fn compiler_failure_aborts_without_output_or_leftover_workspace() {
        let temp = tempdir().expect("tempdir");
        let templates = temp.path().join("templates");
        let output = temp.path().join("out");
        let scratch = temp.path().join("scratch");
        write_templates(&templates);

        let error = build(&theme(), &templates, &output, &FailingCompiler, Some(&scratch))
            .expect_err("compiler failure");
        assert_eq!(error.category(), "stage");
        assert!(!output.join("dracula.qbtheme").exists());
        assert_eq!(fs::read_dir(&scratch).expect("scratch").count(), 0);
    }
}
