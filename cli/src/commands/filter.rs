//! Filter command implementation

use crate::output;
use crate::snapshot::{SelectionReport, SnapshotFile};
use anyhow::{Context, Result};
use clap::Args;
use docfilter_runtime::{DataFilterTask, FilterOutcome, FilterRuntime, RuntimeConfig};
use docfilter_shared::Language;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

/// Number of ids listed per entity kind in the summary
const LISTED_IDS: usize = 20;

#[derive(Args, Debug)]
pub struct FilterArgs {
    /// JSON snapshot with documents, collections, links, query and permissions
    #[arg(short, long)]
    pub snapshot: PathBuf,

    /// Script artifact overriding the bundled filters
    #[arg(long)]
    pub script: Option<PathBuf>,

    /// Runtime configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Language for formatted values (en, cs, sk, de, hu)
    #[arg(short, long)]
    pub language: Option<String>,

    /// Also select children of matching documents
    #[arg(long)]
    pub include_children: bool,

    /// Keep documents that no selected link touches
    #[arg(long)]
    pub include_non_linked: bool,

    /// Give up waiting after this long (e.g., "500ms", "30s")
    #[arg(short, long)]
    pub timeout: Option<String>,

    /// Write the selected ids as JSON
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

pub async fn run(args: FilterArgs) -> Result<()> {
    let mut config = RuntimeConfig::load(args.config.as_deref())?;
    if let Some(script) = args.script {
        config.script_path = Some(script);
    }

    let language = match args.language.as_deref() {
        Some(tag) => tag.parse::<Language>()?,
        None => config.language,
    };

    let timeout = args
        .timeout
        .as_deref()
        .map(docfilter_shared::utils::parse_duration)
        .transpose()
        .context("Failed to parse timeout")?;

    let snapshot = SnapshotFile::load(&args.snapshot)?;
    let request = snapshot.into_request(language, args.include_children, args.include_non_linked);
    let total_documents = request.documents.len();
    let total_links = request.link_instances.len();
    info!(
        "Loaded snapshot {} ({} documents, {} link instances)",
        args.snapshot.display(),
        total_documents,
        total_links
    );
    debug!("Runtime configuration: {:?}", config);

    let runtime = FilterRuntime::init(&config);
    let task = DataFilterTask::with_runtime(request, runtime.clone());

    let started = Instant::now();
    let handle = task.spawn();
    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, handle).await {
            Ok(joined) => joined,
            Err(_) => {
                output::error(&format!("Filter did not finish within {:?}", limit));
                // The blocking worker cannot be cancelled and would hold up
                // runtime shutdown.
                std::process::exit(1);
            }
        },
        None => handle.await,
    };
    let outcome = joined.context("Filter worker failed")??;
    let elapsed = started.elapsed();
    debug!("Filter call finished in {:?}", elapsed);

    if let FilterOutcome::Fallback(err) = &outcome {
        output::warning(&format!("Filter script failed, selection is empty: {}", err));
    }
    let fallback = outcome.is_fallback();
    let data = outcome.into_data();

    output::success(&format!(
        "Selected {} of {} documents and {} of {} link instances",
        data.documents.len(),
        total_documents,
        data.link_instances.len(),
        total_links
    ));
    output::field("language", language);
    output::field("elapsed", format!("{:.2}ms", elapsed.as_secs_f64() * 1000.0));
    output::field("documents", listed(&data.document_ids()));
    output::field("link instances", listed(&data.link_instance_ids()));

    if let Some(path) = &args.json {
        SelectionReport::new(language, fallback, &data).write(path)?;
        output::success(&format!("Wrote selection to {}", path.display()));
    }

    Ok(())
}

fn listed(ids: &[&str]) -> String {
    if ids.is_empty() {
        return "-".to_string();
    }
    let mut text = ids.iter().take(LISTED_IDS).copied().collect::<Vec<_>>().join(", ");
    if ids.len() > LISTED_IDS {
        text.push_str(&format!(" (+{} more)", ids.len() - LISTED_IDS));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listed_ids() {
        assert_eq!(listed(&[]), "-");
        assert_eq!(listed(&["a", "b"]), "a, b");

        let many: Vec<String> = (0..25).map(|i| format!("d{}", i)).collect();
        let refs: Vec<&str> = many.iter().map(String::as_str).collect();
        let text = listed(&refs);
        assert!(text.starts_with("d0, d1"));
        assert!(text.ends_with("(+5 more)"));
    }
}
