//! External collaborators behind narrow capability traits.
//!
//! The pipeline only talks to [`ResourceCompiler`], [`Archiver`] and
//! [`TranslationCompiler`]. The process-backed implementations here shell out
//! to `rcc`, `tar`, `zip` and `lrelease`; tests inject in-memory fakes.

use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use wait_timeout::ChildExt;

use crate::error::{ForgeError, Result};
use crate::util::command_exists;

/// Compiles a resource manifest into one binary container.
pub trait ResourceCompiler: Send + Sync {
    fn compile(&self, manifest: &Path) -> Result<Vec<u8>>;
}

/// Packs the directory `parent/root_name` into an archive whose sole top-level
/// entry is `root_name`.
pub trait Archiver: Send + Sync {
    /// File extension of the produced archive, without a leading dot.
    fn extension(&self) -> &'static str;

    fn pack(&self, parent: &Path, root_name: &str) -> Result<Vec<u8>>;
}

/// Compiles a translation source into a binary catalog.
pub trait TranslationCompiler: Send + Sync {
    fn compile(&self, source: &Path) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub resource_compiler: String,
    pub tar: String,
    pub zip: String,
    pub translation_compiler: String,
    pub timeout_seconds: u64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            resource_compiler: "rcc".to_string(),
            tar: "tar".to_string(),
            zip: "zip".to_string(),
            translation_compiler: "lrelease".to_string(),
            timeout_seconds: 120,
        }
    }
}

/// One external program invocation with a bounded wait.
///
/// The executable is resolved once, against `PATH` and the current directory,
/// so a relative program path keeps working when a run sets another `cwd`.
#[derive(Debug, Clone)]
pub struct ExternalTool {
    program: String,
    executable: PathBuf,
    timeout: Duration,
}

fn resolve_executable(program: &str) -> PathBuf {
    let found = locate(program).unwrap_or_else(|| PathBuf::from(program));
    if found.components().count() > 1 {
        std::path::absolute(&found).unwrap_or(found)
    } else {
        found
    }
}

impl ExternalTool {
    #[must_use]
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        let program = program.into();
        Self {
            executable: resolve_executable(&program),
            program,
            timeout,
        }
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        command_exists(&self.program)
    }

    /// Runs the program to completion, killing it once the timeout elapses.
    ///
    /// Stderr is captured into `scratch/<program>.stderr` and logged on failure.
    pub fn run(&self, args: &[OsString], cwd: Option<&Path>, scratch: &Path) -> Result<()> {
        let label = Path::new(&self.program)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.clone());
        let stderr_path = scratch.join(format!("{label}.stderr"));
        let stderr_file = File::create(&stderr_path)?;

        let mut command = Command::new(&self.executable);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr_file));
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }

        tracing::debug!(
            program = %self.program,
            executable = %self.executable.display(),
            ?args,
            "running external tool"
        );
        let mut child = command.spawn().map_err(|error| {
            if error.kind() == std::io::ErrorKind::NotFound {
                ForgeError::MissingCommand {
                    command: self.program.clone(),
                }
            } else {
                ForgeError::Io(error)
            }
        })?;

        let exit_code = match child.wait_timeout(self.timeout)? {
            Some(status) => status.code().unwrap_or(1),
            None => {
                child.kill()?;
                let _ = child.wait();
                return Err(ForgeError::ExternalCommandTimedOut {
                    command: self.program.clone(),
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        if exit_code == 0 {
            return Ok(());
        }

        let stderr = fs::read_to_string(&stderr_path).unwrap_or_default();
        tracing::warn!(
            program = %self.program,
            exit_code,
            stderr = %stderr.trim(),
            "external tool failed"
        );
        Err(ForgeError::ExternalCommandFailed {
            command: self.program.clone(),
            exit_code,
        })
    }

    /// Runs the program and returns the bytes it wrote to `output_name` inside a
    /// private scratch directory. `build_args` receives the output path.
    fn run_for_output(
        &self,
        output_name: &str,
        cwd: Option<&Path>,
        build_args: impl FnOnce(&Path) -> Vec<OsString>,
    ) -> Result<Vec<u8>> {
        let scratch = tempfile::Builder::new()
            .prefix("palette_forge-tool-")
            .tempdir()?;
        let output = scratch.path().join(output_name);
        let args = build_args(&output);
        self.run(&args, cwd, scratch.path())?;
        if !output.is_file() {
            return Err(ForgeError::ExternalCommandFailed {
                command: self.program.clone(),
                exit_code: 0,
            });
        }
        Ok(fs::read(&output)?)
    }
}

fn os(value: impl Into<OsString>) -> OsString {
    value.into()
}

/// Qt resource compiler (`rcc -binary <manifest> -o <out>`).
#[derive(Debug, Clone)]
pub struct RccCompiler {
    tool: ExternalTool,
}

impl RccCompiler {
    #[must_use]
    pub fn new(tool: ExternalTool) -> Self {
        Self { tool }
    }
}

impl ResourceCompiler for RccCompiler {
    fn compile(&self, manifest: &Path) -> Result<Vec<u8>> {
        let cwd = manifest.parent();
        self.tool.run_for_output("theme.rcc", cwd, |output| {
            vec![
                os("-binary"),
                manifest.as_os_str().to_owned(),
                os("-o"),
                output.as_os_str().to_owned(),
            ]
        })
    }
}

/// Gzip-compressed tarball via `tar -czf`.
#[derive(Debug, Clone)]
pub struct TarGzArchiver {
    tool: ExternalTool,
}

impl TarGzArchiver {
    #[must_use]
    pub fn new(tool: ExternalTool) -> Self {
        Self { tool }
    }
}

impl Archiver for TarGzArchiver {
    fn extension(&self) -> &'static str {
        "tar.gz"
    }

    fn pack(&self, parent: &Path, root_name: &str) -> Result<Vec<u8>> {
        self.tool.run_for_output("bundle.tar.gz", None, |output| {
            vec![
                os("-czf"),
                output.as_os_str().to_owned(),
                os("-C"),
                parent.as_os_str().to_owned(),
                os(root_name),
            ]
        })
    }
}

/// Zip archive via `zip -qr`, run from inside `parent`.
#[derive(Debug, Clone)]
pub struct ZipArchiver {
    tool: ExternalTool,
}

impl ZipArchiver {
    #[must_use]
    pub fn new(tool: ExternalTool) -> Self {
        Self { tool }
    }
}

impl Archiver for ZipArchiver {
    fn extension(&self) -> &'static str {
        "zip"
    }

    fn pack(&self, parent: &Path, root_name: &str) -> Result<Vec<u8>> {
        self.tool.run_for_output("bundle.zip", Some(parent), |output| {
            vec![
                os("-qr"),
                output.as_os_str().to_owned(),
                os(root_name),
            ]
        })
    }
}

/// Qt Linguist release tool (`lrelease <source.ts> -qm <out.qm>`).
#[derive(Debug, Clone)]
pub struct LreleaseCompiler {
    tool: ExternalTool,
}

impl LreleaseCompiler {
    #[must_use]
    pub fn new(tool: ExternalTool) -> Self {
        Self { tool }
    }
}

impl TranslationCompiler for LreleaseCompiler {
    fn compile(&self, source: &Path) -> Result<Vec<u8>> {
        self.tool.run_for_output("catalog.qm", None, |output| {
            vec![
                os("-silent"),
                source.as_os_str().to_owned(),
                os("-qm"),
                output.as_os_str().to_owned(),
            ]
        })
    }
}

/// The set of collaborators one build run uses.
pub struct Toolchain {
    pub resource_compiler: Box<dyn ResourceCompiler>,
    pub tar: Box<dyn Archiver>,
    pub zip: Option<Box<dyn Archiver>>,
    pub translations: Option<Box<dyn TranslationCompiler>>,
}

impl std::fmt::Debug for Toolchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolchain")
            .field("zip", &self.zip.is_some())
            .field("translations", &self.translations.is_some())
            .finish_non_exhaustive()
    }
}

impl Toolchain {
    /// Builds the process-backed toolchain. Optional tools that are not on
    /// `PATH` are left out so their stages degrade instead of failing.
    #[must_use]
    pub fn from_config(config: &ToolConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_seconds.max(1));
        let tool = |program: &str| ExternalTool::new(program, timeout);

        let zip = tool(&config.zip);
        let zip: Option<Box<dyn Archiver>> = if zip.is_available() {
            Some(Box::new(ZipArchiver::new(zip)))
        } else {
            tracing::warn!(program = zip.program(), "zip not found; bundles will ship as .tar.gz only");
            None
        };

        let lrelease = tool(&config.translation_compiler);
        let translations: Option<Box<dyn TranslationCompiler>> = if lrelease.is_available() {
            Some(Box::new(LreleaseCompiler::new(lrelease)))
        } else {
            tracing::debug!(
                program = lrelease.program(),
                "translation compiler not found; translations stay uncompiled"
            );
            None
        };

        Self {
            resource_compiler: Box::new(RccCompiler::new(tool(&config.resource_compiler))),
            tar: Box::new(TarGzArchiver::new(tool(&config.tar))),
            zip,
            translations,
        }
    }
}

/// A tool the enabled stages rely on, as reported by preflight and `doctor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolRequirement {
    pub program: String,
    pub purpose: &'static str,
    pub required: bool,
    pub available: bool,
}

/// Lists the tools the given stages need, with their availability.
#[must_use]
pub fn requirements(config: &ToolConfig, client: bool, web: bool) -> Vec<ToolRequirement> {
    let mut wanted = Vec::new();
    if client {
        wanted.push((&config.resource_compiler, "client archive compilation", true));
    }
    if web {
        wanted.push((&config.tar, "web bundle .tar.gz packaging", true));
        wanted.push((&config.zip, "web bundle .zip packaging", false));
        wanted.push((&config.translation_compiler, "web UI translations", false));
    }
    wanted
        .into_iter()
        .map(|(program, purpose, required)| ToolRequirement {
            program: program.clone(),
            purpose,
            required,
            available: command_exists(program),
        })
        .collect()
}

/// Fails with `MissingCommand` for the first required tool that is unavailable.
pub fn preflight(config: &ToolConfig, client: bool, web: bool) -> Result<Vec<ToolRequirement>> {
    let requirements = requirements(config, client, web);
    if let Some(missing) = requirements
        .iter()
        .find(|requirement| requirement.required && !requirement.available)
    {
        return Err(ForgeError::MissingCommand {
            command: missing.program.clone(),
        });
    }
    Ok(requirements)
}

/// Resolves a configured program to an absolute path when it is on `PATH`.
#[must_use]
pub fn locate(program: &str) -> Option<PathBuf> {
    which::which(program).ok()
}
