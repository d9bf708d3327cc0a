mod cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tether_context::TetherProject;
use tracing_subscriber::EnvFilter;

pub use cmd::render::{apply_op, Op};

const DEFAULT_LOG: &str = "warn";

#[derive(Parser)]
#[command(name = "tether", version, about = "Tether - bind templates to JSON models")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bind a template to a model, apply a mutation script and print the result
    Render {
        /// Template file (defaults to `template` in tether.json)
        template: Option<PathBuf>,
        /// JSON model file
        #[arg(long)]
        model: Option<PathBuf>,
        /// JSON mutation script
        #[arg(long)]
        ops: Option<PathBuf>,
    },
    /// Validate a template and list the directives it contains
    Check {
        /// Template file (defaults to `template` in tether.json)
        template: Option<PathBuf>,
    },
}

pub fn run() {
    let cli = Cli::parse();

    if let Err(e) = execute(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn execute(cli: Cli) -> Result<()> {
    let project = TetherProject::load_cwd()?;
    init_tracing(project.config.log.as_deref());

    match cli.command {
        Commands::Render {
            template,
            model,
            ops,
        } => cmd::render::run(&project, template.as_deref(), model.as_deref(), ops.as_deref()),
        Commands::Check { template } => cmd::check::run(&project, template.as_deref()),
    }
}

/// Log to stderr, filtered by `RUST_LOG`, else the configured level, else `warn`.
fn init_tracing(configured: Option<&str>) {
    let fallback = configured.unwrap_or(DEFAULT_LOG);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(fallback))
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
