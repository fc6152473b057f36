use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ForgeError>;

#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("image encoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("missing dependency command: {command}")]
    MissingCommand { command: String },

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("failed to load theme {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("theme {theme} is missing color key {key}")]
    MissingColorKey { theme: String, key: String },

    #[error("color {key}={value} is not a hex color literal")]
    InvalidColor { key: String, value: String },

    #[error("no theme sources found: {message}")]
    NotFound { message: String },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("required path does not exist: {path}")]
    MissingPath { path: PathBuf },

    #[error("external command failed: {command} (exit={exit_code})")]
    ExternalCommandFailed { command: String, exit_code: i32 },

    #[error("external command timed out: {command} ({seconds}s)")]
    ExternalCommandTimedOut { command: String, seconds: u64 },

    #[error("{message}")]
    Exit { code: i32, message: String },
}

impl ForgeError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Exit { code, .. } => *code,
            Self::MissingCommand { .. } | Self::Config { .. } => 2,
            _ => 1,
        }
    }

    /// Short label used when reporting which class of failure hit a stage.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::MissingCommand { .. } | Self::Config { .. } => "config",
            Self::Load { .. } | Self::Json(_) | Self::Toml(_) => "load",
            Self::MissingColorKey { .. } => "missing-color-key",
            Self::ExternalCommandFailed { .. } | Self::ExternalCommandTimedOut { .. } => "stage",
            Self::NotFound { .. } => "not-found",
            Self::MissingPath { .. } => "missing-path",
            Self::InvalidColor { .. } | Self::InvalidArgument { .. } => "invalid",
            Self::Io(_) | Self::Image(_) | Self::Exit { .. } => "internal",
        }
    }

    #[must_use]
    pub fn exit(code: i32, message: impl Into<String>) -> Self {
        Self::Exit {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
