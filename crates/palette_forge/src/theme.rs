//! Theme source documents.
//!
//! A theme source is a JSON (or TOML) document with a `colors` object mapping
//! upper-snake-case keys to color literals. The file stem becomes the theme id.
//! Keys may use any characters except `%`, which delimits placeholders.
//! When `<id>.json` and `<id>.toml` both exist, the JSON source wins.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ForgeError, Result};

pub const THEME_EXTENSIONS: [&str; 2] = ["json", "toml"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeDefinition {
    pub id: String,
    pub source: PathBuf,
    pub colors: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ThemeSource {
    colors: Option<BTreeMap<String, String>>,
}

impl ThemeDefinition {
    #[must_use]
    pub fn color(&self, key: &str) -> Option<&str> {
        self.colors.get(key).map(String::as_str)
    }
}

/// Derives a theme id from a source path: the file name without extension.
#[must_use]
pub fn theme_id(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn is_conventional_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .bytes()
            .all(|byte| byte.is_ascii_uppercase() || byte.is_ascii_digit() || byte == b'_')
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("toml"))
}

/// Parses a theme source document already read into memory.
pub fn parse(path: &Path, content: &str) -> Result<ThemeDefinition> {
    let parsed = if is_toml(path) {
        toml::from_str::<ThemeSource>(content)
            .map_err(|error| ForgeError::load(path, error.to_string()))?
    } else {
        serde_json::from_str::<ThemeSource>(content)
            .map_err(|error| ForgeError::load(path, error.to_string()))?
    };

    let colors = parsed
        .colors
        .ok_or_else(|| ForgeError::load(path, "missing `colors` section"))?;

    if let Some(key) = colors
        .keys()
        .find(|key| key.is_empty() || key.contains('%'))
    {
        return Err(ForgeError::load(
            path,
            format!("color key {key:?} must be non-empty and must not contain `%`"),
        ));
    }

    let id = theme_id(path);
    for key in colors.keys().filter(|key| !is_conventional_key(key)) {
        tracing::warn!(theme = %id, key = %key, "color key does not follow UPPER_SNAKE_CASE");
    }

    Ok(ThemeDefinition {
        id,
        source: path.to_path_buf(),
        colors,
    })
}

/// Loads a theme definition from disk.
pub fn load(path: &Path) -> Result<ThemeDefinition> {
    if !path.is_file() {
        return Err(ForgeError::load(path, "file does not exist"));
    }
    let content =
        fs::read_to_string(path).map_err(|error| ForgeError::load(path, error.to_string()))?;
    let theme = parse(path, &content)?;
    tracing::debug!(
        theme = %theme.id,
        colors = theme.colors.len(),
        source = %path.display(),
        "theme loaded"
    );
    Ok(theme)
}

fn has_theme_extension(path: &Path) -> bool {
    path.extension().is_some_and(|extension| {
        THEME_EXTENSIONS
            .iter()
            .any(|candidate| extension.eq_ignore_ascii_case(candidate))
    })
}

fn extension_rank(path: &Path) -> usize {
    path.extension()
        .and_then(|extension| {
            THEME_EXTENSIONS
                .iter()
                .position(|candidate| extension.eq_ignore_ascii_case(candidate))
        })
        .unwrap_or(THEME_EXTENSIONS.len())
}

/// Lists theme sources in `dir`, sorted by file name, one per theme id.
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ForgeError::MissingPath {
            path: dir.to_path_buf(),
        });
    }

    let mut sources = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_theme_extension(&path) {
            sources.push(path);
        }
    }
    sources.sort_by(|left, right| {
        theme_id(left)
            .cmp(&theme_id(right))
            .then_with(|| extension_rank(left).cmp(&extension_rank(right)))
            .then_with(|| left.cmp(right))
    });

    let mut kept: Vec<PathBuf> = Vec::with_capacity(sources.len());
    for path in sources {
        if let Some(winner) = kept.last()
            && theme_id(winner) == theme_id(&path)
        {
            tracing::warn!(
                theme = %theme_id(&path),
                kept = %winner.display(),
                ignored = %path.display(),
                "duplicate theme id"
            );
            continue;
        }
        kept.push(path);
    }
    kept.sort();
    Ok(kept)
}

fn dedup_requested(sources: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    let mut seen_paths = BTreeSet::new();
    let mut ids: BTreeMap<String, PathBuf> = BTreeMap::new();
    let mut unique = Vec::with_capacity(sources.len());

    for path in sources {
        if !seen_paths.insert(path.clone()) {
            continue;
        }
        let id = theme_id(&path);
        if let Some(existing) = ids.get(&id) {
            return Err(ForgeError::invalid(format!(
                "theme id `{id}` is requested from both {} and {}",
                existing.display(),
                path.display()
            )));
        }
        ids.insert(id, path.clone());
        unique.push(path);
    }
    Ok(unique)
}

/// Maps user-requested themes to source paths.
///
/// An entry naming an existing file, or one that looks like a path, is used as
/// given. Bare names resolve to `<dir>/<name>.json`. Unresolvable entries still
/// produce a path so the failure is reported against that theme when loading.
#[must_use]
pub fn resolve(dir: &Path, requested: &[String]) -> Vec<PathBuf> {
    requested
        .iter()
        .map(|entry| {
            let candidate = PathBuf::from(entry);
            let looks_like_path =
                candidate.components().count() > 1 || has_theme_extension(&candidate);
            if candidate.is_file() || looks_like_path {
                candidate
            } else {
                dir.join(format!("{entry}.json"))
            }
        })
        .collect()
}

/// Resolves the run's theme selection: explicit requests, or every theme in `dir`.
///
/// Repeated requests for the same file build it once. Two different files that
/// share a theme id would write the same artifacts, so that is rejected.
pub fn select(dir: &Path, requested: &[String]) -> Result<Vec<PathBuf>> {
    let sources = if requested.is_empty() {
        discover(dir).map_err(|_| ForgeError::NotFound {
            message: format!("theme directory {} does not exist", dir.display()),
        })?
    } else {
        dedup_requested(resolve(dir, requested))?
    };

    if sources.is_empty() {
        return Err(ForgeError::NotFound {
            message: format!("no *.json or *.toml themes in {}", dir.display()),
        });
    }
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use tempfile::tempdir;

    use super::{discover, load, parse, resolve, select, theme_id};
    use crate::error::ForgeError;
    use crate::util::write_string;

    const DRACULA: &str = r##"{"colors":{"BG_PRIMARY":"#1e1e2e","BG_SECONDARY":"#181825","FG_PRIMARY":"#cdd6f4","ACCENT":"#89b4fa","STATUS_DOWNLOADING":"#a6e3a1","STATUS_UPLOADING":"#89dceb","STATUS_PAUSED":"#f9e2af","STATUS_ERROR":"#f38ba8"}}"##;

    #[test]
    fn load_json_theme_uses_file_stem_as_id() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("dracula.json");
        write_string(&path, DRACULA).expect("write theme");

        let theme = load(&path).expect("load theme");
        assert_eq!(theme.id, "dracula");
        assert_eq!(theme.colors.len(), 8);
        assert_eq!(theme.color("ACCENT"), Some("#89b4fa"));
        assert_eq!(theme.source, path);
    }

    #[test]
    fn parse_toml_theme_reads_colors_table() {
        let theme = parse(
            Path::new("themes/nord.toml"),
            "name = \"Nord\"\n[colors]\nBG_PRIMARY = \"#2e3440\"\nACCENT = \"#88c0d0\"\n",
        )
        .expect("parse toml theme");
        assert_eq!(theme.id, "nord");
        assert_eq!(theme.color("BG_PRIMARY"), Some("#2e3440"));
    }

    #[test]
    fn extra_top_level_fields_are_ignored() {
        let theme = parse(
            Path::new("mocha.json"),
            r#"{"name":"Mocha","author":"someone","colors":{"ACCENT":"red"}}"#,
        )
        .expect("parse theme");
        assert_eq!(theme.color("ACCENT"), Some("red"));
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let error = load(Path::new("/tmp/palette_forge/does-not-exist.json"))
            .expect_err("missing file should fail");
        match error {
            ForgeError::Load { reason, .. } => assert_eq!(reason, "file does not exist"),
            other => panic!("expected Load, got {other}"),
        }
    }

    #[test]
    fn missing_colors_section_is_a_load_error() {
        let error = parse(Path::new("bare.json"), r#"{"name":"bare"}"#)
            .expect_err("missing colors should fail");
        assert!(error.to_string().contains("missing `colors` section"));
    }

    #[test]
    fn malformed_documents_and_non_string_values_are_load_errors() {
        let malformed = parse(Path::new("broken.json"), "{not json").expect_err("malformed");
        assert_eq!(malformed.category(), "load");

        let numeric = parse(Path::new("numeric.json"), r#"{"colors":{"ACCENT":42}}"#)
            .expect_err("numeric value");
        assert_eq!(numeric.category(), "load");
    }

    #[test]
    fn discover_lists_theme_files_sorted() {
        let temp = tempdir().expect("tempdir");
        write_string(&temp.path().join("zeta.json"), DRACULA).expect("write");
        write_string(&temp.path().join("alpha.toml"), "[colors]\n").expect("write");
        write_string(&temp.path().join("notes.txt"), "ignore me").expect("write");

        let found = discover(temp.path()).expect("discover");
        let ids = found.iter().map(|path| theme_id(path)).collect::<Vec<_>>();
        assert_eq!(ids, vec!["alpha", "zeta"]);
    }

    #[test]
    fn keys_containing_the_placeholder_sigil_are_rejected() {
        let error = parse(Path::new("odd.json"), r##"{"colors":{"BAD%KEY":"#fff"}}"##)
            .expect_err("sigil in key");
        assert_eq!(error.category(), "load");
        assert!(error.to_string().contains("BAD%KEY"));

        let empty = parse(Path::new("empty.json"), r##"{"colors":{"":"#fff"}}"##)
            .expect_err("empty key");
        assert_eq!(empty.category(), "load");
    }

    #[test]
    fn non_conventional_keys_are_accepted() {
        let theme = parse(
            Path::new("kebab.json"),
            r##"{"colors":{"bg-primary":"#111","fg.alt":"#222"}}"##,
        )
        .expect("parse theme");
        assert_eq!(theme.color("bg-primary"), Some("#111"));
        assert_eq!(theme.color("fg.alt"), Some("#222"));
    }

    #[test]
    fn discover_keeps_json_when_toml_shares_its_id() {
        let temp = tempdir().expect("tempdir");
        write_string(&temp.path().join("dracula.toml"), "[colors]\n").expect("write");
        write_string(&temp.path().join("dracula.json"), DRACULA).expect("write");
        write_string(&temp.path().join("nord.toml"), "[colors]\n").expect("write");

        let found = discover(temp.path()).expect("discover");
        assert_eq!(
            found,
            vec![
                temp.path().join("dracula.json"),
                temp.path().join("nord.toml"),
            ]
        );
    }

    #[test]
    fn select_builds_repeated_requests_once() {
        let temp = tempdir().expect("tempdir");
        let selected = select(
            temp.path(),
            &["dracula".to_string(), "dracula".to_string()],
        )
        .expect("select");
        assert_eq!(selected, vec![temp.path().join("dracula.json")]);
    }

    #[test]
    fn select_rejects_two_sources_for_one_theme_id() {
        let temp = tempdir().expect("tempdir");
        let toml = temp.path().join("dracula.toml");
        let error = select(
            temp.path(),
            &["dracula".to_string(), toml.display().to_string()],
        )
        .expect_err("conflicting ids");
        assert_eq!(error.category(), "invalid");
        assert!(error.to_string().contains("dracula"));
    }

    #[test]
    fn resolve_maps_bare_names_into_theme_dir() {
        let dir = Path::new("/themes");
        let resolved = resolve(
            dir,
            &[
                "dracula".to_string(),
                "custom/nord.json".to_string(),
                "mocha.toml".to_string(),
            ],
        );
        assert_eq!(resolved[0], Path::new("/themes/dracula.json"));
        assert_eq!(resolved[1], Path::new("custom/nord.json"));
        assert_eq!(resolved[2], Path::new("mocha.toml"));
    }

    #[test]
    fn select_without_requests_and_no_themes_is_not_found() {
        let temp = tempdir().expect("tempdir");
        let error = select(temp.path(), &[]).expect_err("empty dir should fail");
        assert_eq!(error.category(), "not-found");

        let missing_dir = select(&temp.path().join("nope"), &[]).expect_err("missing dir");
        assert_eq!(missing_dir.category(), "not-found");
    }
}
