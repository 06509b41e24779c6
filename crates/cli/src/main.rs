//! `sas`: turn a task description into a robot program, one reply at a time.

mod commands;
mod render;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sas")]
#[command(version)]
#[command(about = "Generate block-based robot programs from natural-language task descriptions")]
struct Cli {
    /// Project directory containing `.sas/`
    #[arg(long, short = 'C', global = true, default_value = ".")]
    project: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create `.sas/` with configuration, a parameter store and a starter catalog
    Init {
        /// Overwrite an existing `.sas/` directory
        #[arg(long)]
        force: bool,

        /// Only write the motion and gripper operation types
        #[arg(long)]
        minimal: bool,
    },

    /// Interactive session: answer the pipeline's questions on stdin
    Chat,

    /// Advance a run by one reply and exit
    Invoke {
        /// State file of the run to continue
        #[arg(long, conflicts_with = "last")]
        state: Option<PathBuf>,

        /// Continue the most recently updated run
        #[arg(long)]
        last: bool,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,

        /// The reply; omit to start a run or repeat the pending question
        reply: Vec<String>,
    },

    /// List the operation types in the catalog
    Catalog,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("SAS_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Init { force, minimal } => commands::init(&cli.project, force, minimal).await,
        Commands::Chat => commands::chat(&cli.project).await,
        Commands::Invoke {
            state,
            last,
            json,
            reply,
        } => {
            let reply = (!reply.is_empty()).then(|| reply.join(" "));
            let source = match (state, last) {
                (Some(path), _) => commands::StateSource::File(path),
                (None, true) => commands::StateSource::Latest,
                (None, false) => commands::StateSource::NewRun,
            };
            commands::invoke(&cli.project, source, reply, json).await
        }
        Commands::Catalog => commands::catalog(&cli.project).await,
    }
}
