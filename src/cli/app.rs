//! Main CLI application structure

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use super::output::{Output, OutputFormat};
use super::{cue, show, team, time_cmd};
use crate::storage::{Config, Project};

#[derive(Parser)]
#[command(name = "cueflow")]
#[command(author, version, about = "Run sheets for live-event shows")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the global config, then text)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new cueflow project
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,
    },

    /// Manage shows
    #[command(subcommand)]
    Show(show::ShowCommands),

    /// Manage a show's team
    #[command(subcommand)]
    Team(team::TeamCommands),

    /// Manage a show's cues
    #[command(subcommand)]
    Cue(cue::CueCommands),

    /// Clock arithmetic on HH:MM:SS times
    #[command(subcommand)]
    Time(time_cmd::TimeCommands),
}

/// Installs the stderr log subscriber
///
/// `RUST_LOG` wins; otherwise `--verbose` enables debug logs for this crate.
fn init_logging(verbose: bool) {
    let default = if verbose { "cueflow=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // Fails only if a subscriber is already installed
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let format = match cli.format {
        Some(format) => format,
        None => Config::load_global()?.default_format.into(),
    };
    let output = Output::new(format, cli.verbose);

    output.verbose("CueFlow starting");

    match cli.command {
        Commands::Init { path } => {
            output.verbose_ctx("init", &format!("Initializing project at: {}", path));
            let project = Project::init(&path)?;
            output.verbose_ctx(
                "init",
                &format!("Created data directory at: {}", project.data_dir().display()),
            );
            output.success(&format!(
                "Initialized cueflow project at {}",
                project.root().display()
            ));
        }

        Commands::Show(cmd) => show::run(cmd, &output)?,
        Commands::Team(cmd) => team::run(cmd, &output)?,
        Commands::Cue(cmd) => cue::run(cmd, &output)?,
        Commands::Time(cmd) => time_cmd::run(cmd, &output)?,
    }

    Ok(())
}
