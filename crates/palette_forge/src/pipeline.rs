use std::path::{Path, PathBuf};

use clap::Args;
use serde::Serialize;

use crate::client;
use crate::config::ForgeConfig;
use crate::error::{ForgeError, Result};
use crate::palette::{self, SwatchFormat};
use crate::theme::{self, ThemeDefinition};
use crate::tools::{Toolchain, preflight};
use crate::util::{CliOutput, OutputIntegration, now_utc_iso, output_for, write_string};
use crate::web::{self, WebOutcome, WebTools};

#[derive(Debug, Clone, Default, Args)]
pub struct BuildArgs {
    /// Theme names or source paths. Every theme in the themes directory when omitted.
    #[arg(value_name = "THEME")]
    pub themes: Vec<String>,

    #[arg(long = "themes-dir")]
    pub themes_dir: Option<PathBuf>,

    #[arg(long = "client-templates")]
    pub client_templates: Option<PathBuf>,

    #[arg(long = "web-templates")]
    pub web_templates: Option<PathBuf>,

    #[arg(long = "client-out")]
    pub client_out: Option<PathBuf>,

    #[arg(long = "web-out")]
    pub web_out: Option<PathBuf>,

    #[arg(long = "assets-dir")]
    pub assets_dir: Option<PathBuf>,

    #[arg(long = "palette-only")]
    pub palette_only: bool,

    #[arg(long = "client-only")]
    pub client_only: bool,

    #[arg(long = "web-only")]
    pub web_only: bool,

    #[arg(long = "no-palette")]
    pub no_palette: bool,

    #[arg(long = "no-client")]
    pub no_client: bool,

    #[arg(long = "no-web")]
    pub no_web: bool,

    #[arg(long = "swatch-format", value_enum)]
    pub swatch_format: Option<SwatchFormat>,

    /// Resource compiler used for client archives.
    #[arg(long)]
    pub rcc: Option<String>,

    #[arg(long)]
    pub tar: Option<String>,

    #[arg(long)]
    pub zip: Option<String>,

    #[arg(long)]
    pub lrelease: Option<String>,

    /// Seconds an external tool may run before it is killed.
    #[arg(long = "tool-timeout", value_name = "SECS")]
    pub tool_timeout: Option<u64>,

    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the run report as JSON to this path.
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Palette,
    Client,
    Web,
}

impl Stage {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Palette => "palette",
            Self::Client => "client",
            Self::Web => "web",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StageStatus {
    Done {
        artifacts: Vec<PathBuf>,
    },
    Skipped {
        reason: String,
    },
    Failed {
        error: String,
        category: &'static str,
    },
    Disabled,
}

impl StageStatus {
    fn enabled_or_disabled(enabled: bool, otherwise: impl FnOnce() -> Self) -> Self {
        if enabled { otherwise() } else { Self::Disabled }
    }

    fn failed(error: &ForgeError) -> Self {
        Self::Failed {
            error: error.to_string(),
            category: error.category(),
        }
    }

    #[must_use]
    pub fn artifacts(&self) -> &[PathBuf] {
        match self {
            Self::Done { artifacts } => artifacts,
            _ => &[],
        }
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThemeReport {
    pub theme: String,
    pub source: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_error: Option<String>,
    pub palette: StageStatus,
    pub client: StageStatus,
    pub web: StageStatus,
}

impl ThemeReport {
    #[must_use]
    pub fn stage(&self, stage: Stage) -> &StageStatus {
        match stage {
            Stage::Palette => &self.palette,
            Stage::Client => &self.client,
            Stage::Web => &self.web,
        }
    }

    #[must_use]
    pub fn artifacts(&self) -> Vec<&Path> {
        [&self.palette, &self.client, &self.web]
            .into_iter()
            .flat_map(StageStatus::artifacts)
            .map(PathBuf::as_path)
            .collect()
    }

    /// A theme fails the run when none of its enabled stages produced anything.
    #[must_use]
    pub fn produced_nothing(&self) -> bool {
        self.artifacts().is_empty()
    }

    #[must_use]
    pub fn stage_failures(&self) -> usize {
        [&self.palette, &self.client, &self.web]
            .into_iter()
            .filter(|status| status.is_failed())
            .count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: String,
    pub finished_at: String,
    pub stages: Vec<&'static str>,
    pub success_count: usize,
    pub failure_count: usize,
    pub themes: Vec<ThemeReport>,
}

impl RunReport {
    #[must_use]
    pub fn failed_themes(&self) -> Vec<&str> {
        self.themes
            .iter()
            .filter(|report| report.produced_nothing())
            .map(|report| report.theme.as_str())
            .collect()
    }
}

fn run_outcome_error(report: &RunReport) -> Option<ForgeError> {
    if report.failure_count == 0 {
        return None;
    }
    Some(ForgeError::exit(
        1,
        format!(
            "{} of {} themes produced no artifacts: {}",
            report.failure_count,
            report.themes.len(),
            report.failed_themes().join(", ")
        ),
    ))
}

fn status_label(report: &RunReport) -> &'static str {
    if report.failure_count == 0 {
        "ok"
    } else {
        "failed"
    }
}

/// Drives every enabled stage for each selected theme.
pub struct Pipeline<'a> {
    config: &'a ForgeConfig,
    toolchain: &'a Toolchain,
    ui: &'a CliOutput,
}

impl<'a> Pipeline<'a> {
    #[must_use]
    pub fn new(config: &'a ForgeConfig, toolchain: &'a Toolchain, ui: &'a CliOutput) -> Self {
        Self {
            config,
            toolchain,
            ui,
        }
    }

    fn record(&self, theme_id: &str, stage: Stage, status: &StageStatus) {
        let label = stage.label();
        match status {
            StageStatus::Done { artifacts } => {
                for artifact in artifacts {
                    self.ui
                        .success(&format!("{theme_id} {label} -> {}", artifact.display()));
                }
            }
            StageStatus::Skipped { reason } => {
                self.ui
                    .warning(&format!("{theme_id} {label} skipped: {reason}"));
            }
            StageStatus::Failed { error, category } => {
                tracing::warn!(theme = theme_id, stage = label, category, %error, "stage failed");
                self.ui
                    .error(&format!("{theme_id} {label} failed [{category}]: {error}"));
            }
            StageStatus::Disabled => {}
        }
    }

    fn palette_stage(&self, theme: &ThemeDefinition) -> StageStatus {
        match palette::write_swatch(theme, &self.config.assets_dir, self.config.swatch_format) {
            Ok(path) => StageStatus::Done {
                artifacts: vec![path],
            },
            Err(error) => StageStatus::failed(&error),
        }
    }

    fn client_stage(&self, theme: &ThemeDefinition) -> StageStatus {
        match client::build(
            theme,
            &self.config.client_templates_dir,
            &self.config.client_output_dir,
            self.toolchain.resource_compiler.as_ref(),
            self.config.scratch_dir.as_deref(),
        ) {
            Ok(path) => StageStatus::Done {
                artifacts: vec![path],
            },
            Err(error) => StageStatus::failed(&error),
        }
    }

    fn web_stage(&self, theme: &ThemeDefinition) -> StageStatus {
        let tools = WebTools {
            tar: self.toolchain.tar.as_ref(),
            zip: self.toolchain.zip.as_deref(),
            translations: self.toolchain.translations.as_deref(),
        };
        match web::build(
            theme,
            &self.config.web_templates_dir,
            &self.config.web_output_dir,
            &tools,
            self.config.scratch_dir.as_deref(),
        ) {
            Ok(WebOutcome::Built { archives, .. }) => StageStatus::Done {
                artifacts: archives,
            },
            Ok(WebOutcome::Skipped(reason)) => StageStatus::Skipped {
                reason: reason.to_string(),
            },
            Err(error) => StageStatus::failed(&error),
        }
    }

    /// Runs every enabled stage for one theme source. Never fails: stage and
    /// load errors are recorded in the returned report.
    pub fn build_theme(&self, source: &Path) -> ThemeReport {
        let theme_id = theme::theme_id(source);
        let span = tracing::info_span!("theme", id = %theme_id);
        let _entered = span.enter();
        let stages = self.config.stages;

        let theme = match theme::load(source) {
            Ok(theme) => theme,
            Err(error) => {
                tracing::warn!(%error, "theme failed to load");
                self.ui.error(&format!("{theme_id} load failed: {error}"));
                let not_attempted = || StageStatus::Skipped {
                    reason: "theme failed to load".to_string(),
                };
                return ThemeReport {
                    theme: theme_id,
                    source: source.to_path_buf(),
                    load_error: Some(error.to_string()),
                    palette: StageStatus::enabled_or_disabled(stages.palette, not_attempted),
                    client: StageStatus::enabled_or_disabled(stages.client, not_attempted),
                    web: StageStatus::enabled_or_disabled(stages.web, not_attempted),
                };
            }
        };

        self.ui.info(&format!("building theme {}", theme.id));
        let palette = StageStatus::enabled_or_disabled(stages.palette, || self.palette_stage(&theme));
        self.record(&theme.id, Stage::Palette, &palette);
        let client = StageStatus::enabled_or_disabled(stages.client, || self.client_stage(&theme));
        self.record(&theme.id, Stage::Client, &client);
        let web = StageStatus::enabled_or_disabled(stages.web, || self.web_stage(&theme));
        self.record(&theme.id, Stage::Web, &web);

        ThemeReport {
            theme: theme.id,
            source: source.to_path_buf(),
            load_error: None,
            palette,
            client,
            web,
        }
    }

    /// Builds every source in order. A failing theme never stops later ones.
    pub fn run(&self, sources: &[PathBuf]) -> RunReport {
        let started_at = now_utc_iso();
        let mut themes = Vec::with_capacity(sources.len());
        let mut success_count = 0_usize;
        let mut failure_count = 0_usize;

        for source in sources {
            let report = self.build_theme(source);
            if report.produced_nothing() {
                failure_count = failure_count.saturating_add(1);
            } else {
                success_count = success_count.saturating_add(1);
            }
            themes.push(report);
        }

        RunReport {
            started_at,
            finished_at: now_utc_iso(),
            stages: self.config.stages.labels(),
            success_count,
            failure_count,
            themes,
        }
    }
}

/// Aborts before any theme when the client template tree is missing.
fn check_startup(config: &ForgeConfig) -> Result<()> {
    if config.stages.client && !config.client_templates_dir.is_dir() {
        return Err(ForgeError::config(format!(
            "client template directory not found: {}",
            config.client_templates_dir.display()
        )));
    }
    preflight(&config.tools, config.stages.client, config.stages.web)?;
    Ok(())
}

pub fn run_build(args: BuildArgs) -> Result<()> {
    let integration = OutputIntegration::detect();
    let ui = output_for(&integration);

    let config = ForgeConfig::for_build(&args)?;
    check_startup(&config)?;
    let sources = theme::select(&config.themes_dir, &args.themes)?;
    let toolchain = Toolchain::from_config(&config.tools);

    ui.rule(Some("palette_forge build"));
    ui.info(&format!(
        "themes={} stages={}",
        sources.len(),
        config.stages.labels().join(",")
    ));

    let report = Pipeline::new(&config, &toolchain, &ui).run(&sources);

    if let Some(path) = &args.report {
        write_string(path, &serde_json::to_string_pretty(&report)?)?;
        ui.info(&format!("report={}", path.display()));
    }

    if report.failure_count == 0 {
        ui.success(&format!("build complete: {} themes", report.success_count));
    } else {
        ui.warning(&format!(
            "build complete with failures: success={} failure={}",
            report.success_count, report.failure_count
        ));
    }

    if integration.should_emit_json() {
        println!(
            "{}",
            serde_json::json!({
                "command": "build",
                "status": status_label(&report),
                "stages": report.stages,
                "success_count": report.success_count,
                "failure_count": report.failure_count,
                "failed_themes": report.failed_themes(),
                "integration": integration,
            })
        );
    }

    if let Some(error) = run_outcome_error(&report) {
        return Err(error);
    }
    Ok(())
}
