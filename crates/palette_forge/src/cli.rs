use std::fs;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::doctor::{DoctorArgs, run_doctor};
use crate::error::{ForgeError, Result};
use crate::pipeline::{BuildArgs, run_build};
use crate::substitute::{substitute, unresolved};
use crate::theme;
use crate::util::{OutputIntegration, init_tracing, output_for, write_string};

#[derive(Debug, Parser)]
#[command(
    name = "palette_forge",
    about = "Build client theme archives, web UI bundles and palette swatches from theme definitions",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
#[allow(clippy::large_enum_variant)]
pub enum Commands {
    /// Build every enabled artifact for the selected themes.
    Build(BuildArgs),

    /// Print the theme ids found in the themes directory.
    List(ListArgs),

    /// Substitute one template with one theme's colors.
    Render(RenderArgs),

    /// Validate directories and external tools.
    Doctor(DoctorArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ListArgs {
    #[arg(long = "themes-dir", default_value = "themes")]
    pub themes_dir: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct RenderArgs {
    /// Theme name (looked up in --themes-dir) or source path.
    #[arg(long)]
    pub theme: String,

    #[arg(long)]
    pub template: PathBuf,

    /// Output file; stdout when omitted.
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long = "themes-dir", default_value = "themes")]
    pub themes_dir: PathBuf,

    /// Fail when the template references keys the theme does not define.
    #[arg(long)]
    pub strict: bool,
}

fn run_list(args: ListArgs) -> Result<()> {
    let integration = OutputIntegration::detect();
    let sources = theme::discover(&args.themes_dir)?;
    let ids = sources
        .iter()
        .map(|path| theme::theme_id(path))
        .collect::<Vec<_>>();

    if integration.should_emit_json() {
        println!(
            "{}",
            serde_json::json!({
                "command": "list",
                "themes_dir": args.themes_dir.display().to_string(),
                "themes": ids,
            })
        );
    } else {
        for id in &ids {
            println!("{id}");
        }
    }
    Ok(())
}

fn run_render(args: RenderArgs) -> Result<()> {
    let integration = OutputIntegration::detect();
    let ui = output_for(&integration);

    let source = theme::resolve(&args.themes_dir, std::slice::from_ref(&args.theme))
        .into_iter()
        .next()
        .ok_or_else(|| ForgeError::invalid("--theme must not be empty"))?;
    let definition = theme::load(&source)?;
    let template = fs::read_to_string(&args.template)?;

    let missing = unresolved(&template, &definition.colors);
    if !missing.is_empty() {
        if args.strict {
            return Err(ForgeError::invalid(format!(
                "{} does not define: {}",
                definition.id,
                missing.join(", ")
            )));
        }
        ui.warning(&format!("left unresolved: {}", missing.join(", ")));
    }

    let rendered = substitute(&template, &definition.colors);
    match &args.output {
        Some(path) => {
            write_string(path, &rendered)?;
            ui.success(&format!("rendered {}", path.display()));
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

pub fn run_from_env() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run(cli)
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Build(args) => run_build(args),
        Commands::List(args) => run_list(args),
        Commands::Render(args) => run_render(args),
        Commands::Doctor(args) => run_doctor(args),
    }
}
