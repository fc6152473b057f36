//! Run configuration: built-in defaults, an optional TOML file, then CLI flags.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ForgeError, Result};
use crate::palette::SwatchFormat;
use crate::pipeline::BuildArgs;
use crate::tools::ToolConfig;

/// Picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "palette_forge.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageSelection {
    pub palette: bool,
    pub client: bool,
    pub web: bool,
}

impl Default for StageSelection {
    fn default() -> Self {
        Self {
            palette: true,
            client: true,
            web: true,
        }
    }
}

impl StageSelection {
    #[must_use]
    pub fn is_empty(self) -> bool {
        !(self.palette || self.client || self.web)
    }

    /// `*-only` flags replace the selection with their union; `no-*` flags
    /// then remove stages. An empty result is rejected.
    pub fn resolve(self, only: StageSelection, without: StageSelection) -> Result<Self> {
        let mut selection = if only.is_empty() { self } else { only };
        selection.palette &= !without.palette;
        selection.client &= !without.client;
        selection.web &= !without.web;
        if selection.is_empty() {
            return Err(ForgeError::invalid(
                "stage flags leave nothing to build; enable at least one of palette, client, web",
            ));
        }
        Ok(selection)
    }

    #[must_use]
    pub fn labels(self) -> Vec<&'static str> {
        [
            (self.palette, "palette"),
            (self.client, "client"),
            (self.web, "web"),
        ]
        .into_iter()
        .filter_map(|(enabled, label)| enabled.then_some(label))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    pub themes_dir: PathBuf,
    pub client_templates_dir: PathBuf,
    pub web_templates_dir: PathBuf,
    pub client_output_dir: PathBuf,
    pub web_output_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub stages: StageSelection,
    pub swatch_format: SwatchFormat,
    pub tools: ToolConfig,
    /// Parent directory for build workspaces; the system temp dir when unset.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            themes_dir: PathBuf::from("themes"),
            client_templates_dir: PathBuf::from("templates/client"),
            web_templates_dir: PathBuf::from("templates/webui"),
            client_output_dir: PathBuf::from("dist/client"),
            web_output_dir: PathBuf::from("dist/webui"),
            assets_dir: PathBuf::from("assets"),
            stages: StageSelection::default(),
            swatch_format: SwatchFormat::default(),
            tools: ToolConfig::default(),
            scratch_dir: None,
        }
    }
}

impl ForgeConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(ForgeError::config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|error| {
            ForgeError::config(format!("invalid config {}: {error}", path.display()))
        })
    }

    /// Loads `explicit`, or `palette_forge.toml` from the working directory when
    /// present, or the built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_toml_file(path);
        }
        let implicit = Path::new(DEFAULT_CONFIG_FILE);
        if implicit.is_file() {
            tracing::debug!(path = %implicit.display(), "using implicit config file");
            return Self::from_toml_file(implicit);
        }
        Ok(Self::default())
    }

    pub fn apply_args(&mut self, args: &BuildArgs) -> Result<()> {
        if let Some(value) = &args.themes_dir {
            self.themes_dir = value.clone();
        }
        if let Some(value) = &args.client_templates {
            self.client_templates_dir = value.clone();
        }
        if let Some(value) = &args.web_templates {
            self.web_templates_dir = value.clone();
        }
        if let Some(value) = &args.client_out {
            self.client_output_dir = value.clone();
        }
        if let Some(value) = &args.web_out {
            self.web_output_dir = value.clone();
        }
        if let Some(value) = &args.assets_dir {
            self.assets_dir = value.clone();
        }
        if let Some(value) = args.swatch_format {
            self.swatch_format = value;
        }
        if let Some(value) = &args.rcc {
            self.tools.resource_compiler = value.clone();
        }
        if let Some(value) = &args.tar {
            self.tools.tar = value.clone();
        }
        if let Some(value) = &args.zip {
            self.tools.zip = value.clone();
        }
        if let Some(value) = &args.lrelease {
            self.tools.translation_compiler = value.clone();
        }
        if let Some(value) = args.tool_timeout {
            if value == 0 {
                return Err(ForgeError::invalid("--tool-timeout must be at least 1 second"));
            }
            self.tools.timeout_seconds = value;
        }

        let only = StageSelection {
            palette: args.palette_only,
            client: args.client_only,
            web: args.web_only,
        };
        let without = StageSelection {
            palette: args.no_palette,
            client: args.no_client,
            web: args.no_web,
        };
        self.stages = self.stages.resolve(only, without)?;
        Ok(())
    }

    /// Resolves the effective configuration for one `build` invocation.
    pub fn for_build(args: &BuildArgs) -> Result<Self> {
        let mut config = Self::load(args.config.as_deref())?;
        config.apply_args(args)?;
        Ok(config)
    }
}
