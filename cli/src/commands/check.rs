//! Check command implementation

use crate::output;
use anyhow::Result;
use clap::Args;
use docfilter_runtime::{ArtifactState, RuntimeConfig, ScriptArtifact, ScriptSource};
use docfilter_shared::FILTER_API_VERSION;
use std::path::PathBuf;
use tracing::debug;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Script artifact to check instead of the configured one
    #[arg(long)]
    pub script: Option<PathBuf>,

    /// Runtime configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

pub fn run(args: CheckArgs) -> Result<()> {
    let config = RuntimeConfig::load(args.config.as_deref())?;
    let source = ScriptSource::from_path(args.script.or(config.script_path));

    debug!("Checking script artifact {:?}", source);
    let artifact = ScriptArtifact::load(&source);
    match artifact.state() {
        ArtifactState::Available(function) => {
            output::success(&format!("Script artifact {} is available", function.source_name()));
            output::field("entry point", function.entry_point());
            output::field("calling convention", format!("v{}", FILTER_API_VERSION));
            output::field("functions", function.ast().iter_functions().count());
            Ok(())
        }
        ArtifactState::Unavailable { reason } => {
            anyhow::bail!("Script artifact unavailable: {}", reason)
        }
    }
}
