//! CLI for docfilter
//!
//! Commands:
//! - filter: Run the filter script over a JSON snapshot
//! - check: Report whether a script artifact is usable

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod output;
mod snapshot;

#[derive(Parser)]
#[command(name = "docfilter")]
#[command(about = "docfilter - script-backed document and link filtering", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Filter the documents and links of a snapshot file
    Filter(commands::filter::FilterArgs),

    /// Load a script artifact and report whether it is available
    Check(commands::check::CheckArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Filter(args) => {
            init_tracing(args.verbose);
            commands::filter::run(args).await
        }
        Commands::Check(args) => {
            init_tracing(args.verbose);
            commands::check::run(args)
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
