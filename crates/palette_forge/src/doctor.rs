use std::path::{Path, PathBuf};

use clap::Args;
use serde_json::json;

use crate::client;
use crate::config::ForgeConfig;
use crate::error::{ForgeError, Result};
use crate::palette::SWATCH_KEYS;
use crate::theme;
use crate::tools::{ToolRequirement, locate, requirements};
use crate::util::{CliOutput, OutputIntegration, ensure_executable, ensure_exists, output_for};
use crate::web;

#[derive(Debug, Clone, Default, Args)]
pub struct DoctorArgs {
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long = "themes-dir")]
    pub themes_dir: Option<PathBuf>,

    /// Also load every theme and check the swatch keys.
    #[arg(long)]
    pub full: bool,
}

fn looks_like_path(program: &str) -> bool {
    Path::new(program).components().count() > 1
}

fn check_tool(requirement: &ToolRequirement, ui: &CliOutput) -> Result<()> {
    let program = requirement.program.as_str();
    if looks_like_path(program) {
        ensure_executable(Path::new(program))?;
    }
    if requirement.available {
        let resolved = locate(program)
            .map_or_else(|| program.to_string(), |path| path.display().to_string());
        ui.success(&format!(
            "command available: {program} ({}) -> {resolved}",
            requirement.purpose
        ));
        return Ok(());
    }
    if requirement.required {
        ui.error(&format!(
            "command missing: {program} (required for {})",
            requirement.purpose
        ));
        return Err(ForgeError::MissingCommand {
            command: program.to_string(),
        });
    }
    ui.warning(&format!(
        "command missing: {program} ({} disabled)",
        requirement.purpose
    ));
    Ok(())
}

fn check_client_templates(dir: &Path) -> Result<()> {
    ensure_exists(dir)?;
    for name in [client::STYLESHEET, client::CONFIG] {
        ensure_exists(&dir.join(name))?;
    }
    Ok(())
}

/// Loads one theme and returns the swatch keys it lacks.
fn missing_swatch_keys(source: &Path) -> Result<Vec<&'static str>> {
    let theme = theme::load(source)?;
    Ok(SWATCH_KEYS
        .into_iter()
        .filter(|key| theme.color(key).is_none())
        .collect())
}

pub fn run_doctor(args: DoctorArgs) -> Result<()> {
    let integration = OutputIntegration::detect();
    let ui = output_for(&integration);

    let mut config = ForgeConfig::load(args.config.as_deref())?;
    if let Some(dir) = &args.themes_dir {
        config.themes_dir = dir.clone();
    }

    ui.rule(Some("palette_forge doctor"));
    ui.info(&format!("themes_dir={}", config.themes_dir.display()));
    ui.info(&format!("stages={}", config.stages.labels().join(",")));

    ui.rule(Some("environment detection"));
    ui.info(&format!(
        "fastapi_output mode={} agent={} ci={} tty={}",
        integration.fastapi_mode,
        integration.fastapi_agent,
        integration.fastapi_ci,
        integration.fastapi_tty
    ));
    ui.info(&format!(
        "sqlmodel_console mode={} agent={}",
        integration.sqlmodel_mode, integration.sqlmodel_agent
    ));

    ui.rule(Some("tools"));
    let tools = requirements(&config.tools, config.stages.client, config.stages.web);
    for requirement in &tools {
        check_tool(requirement, &ui)?;
    }

    ui.rule(Some("directories"));
    let sources = theme::discover(&config.themes_dir)?;
    if sources.is_empty() {
        return Err(ForgeError::NotFound {
            message: format!("no themes in {}", config.themes_dir.display()),
        });
    }
    ui.success(&format!("themes found: {}", sources.len()));

    if config.stages.client {
        check_client_templates(&config.client_templates_dir)?;
        ui.success(&format!(
            "client templates: {}",
            config.client_templates_dir.display()
        ));
    }
    if config.stages.web {
        match web::check_templates(&config.web_templates_dir) {
            Ok(()) => ui.success(&format!(
                "web templates: {}",
                config.web_templates_dir.display()
            )),
            Err(reason) => ui.warning(&format!("{reason} (web bundles will be skipped)")),
        }
    }

    let mut incomplete = 0_usize;
    if args.full {
        ui.rule(Some("theme checks"));
        for source in &sources {
            let id = theme::theme_id(source);
            let missing = missing_swatch_keys(source)?;
            if missing.is_empty() {
                ui.success(&format!("theme {id}: ok"));
            } else {
                incomplete = incomplete.saturating_add(1);
                ui.warning(&format!("theme {id}: swatch keys missing: {}", missing.join(", ")));
            }
        }
    }

    ui.success("doctor completed successfully");

    if integration.should_emit_json() {
        println!(
            "{}",
            json!({
                "command": "doctor",
                "status": "ok",
                "themes_dir": config.themes_dir.display().to_string(),
                "theme_count": sources.len(),
                "incomplete_themes": incomplete,
                "tools": tools,
                "integration": integration,
            })
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{check_client_templates, check_tool, missing_swatch_keys};
    use crate::error::ForgeError;
    use crate::tools::ToolRequirement;
    use crate::util::{CliOutput, write_string};

    fn requirement(program: &str, required: bool, available: bool) -> ToolRequirement {
        ToolRequirement {
            program: program.to_string(),
            purpose: "testing",
            required,
            available,
        }
    }

    #[test]
    fn missing_required_tool_is_fatal_but_optional_is_not() {
        let ui = CliOutput::silent();
        match check_tool(&requirement("rcc-missing", true, false), &ui)
            .expect_err("required tool")
        {
            ForgeError::MissingCommand { command } => assert_eq!(command, "rcc-missing"),
            other => panic!("expected MissingCommand, got {other}"),
        }
        assert!(check_tool(&requirement("zip-missing", false, false), &ui).is_ok());
    }

    #[test]
    fn tool_given_as_missing_path_is_reported() {
        let ui = CliOutput::silent();
        let error = check_tool(&requirement("/definitely/not/rcc", true, false), &ui)
            .expect_err("missing path");
        assert!(matches!(error, ForgeError::MissingPath { .. }));
    }

    #[test]
    fn client_templates_need_both_primary_files() {
        let temp = tempdir().expect("tempdir");
        write_string(&temp.path().join("stylesheet.qss"), "x").expect("write");
        match check_client_templates(temp.path()).expect_err("config.json missing") {
            ForgeError::MissingPath { path } => assert!(path.ends_with("config.json")),
            other => panic!("expected MissingPath, got {other}"),
        }

        write_string(&temp.path().join("config.json"), "{}").expect("write");
        assert!(check_client_templates(temp.path()).is_ok());
    }

    #[test]
    fn missing_swatch_keys_lists_absent_keys_in_order() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("partial.json");
        write_string(
            &path,
            r##"{"colors":{"BG_PRIMARY":"#000","ACCENT":"#fff","BG_SECONDARY":"#111","FG_PRIMARY":"#eee","STATUS_DOWNLOADING":"#0f0","STATUS_UPLOADING":"#00f"}}"##,
        )
        .expect("write");
        assert_eq!(
            missing_swatch_keys(&path).expect("load"),
            vec!["STATUS_PAUSED", "STATUS_ERROR"]
        );
    }
}
