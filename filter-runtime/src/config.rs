//! Runtime configuration

use anyhow::Context;
use docfilter_shared::Language;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix, e.g. `DOCFILTER_SCRIPT_PATH`
pub const ENV_PREFIX: &str = "DOCFILTER";

/// Default depth limit for nested script calls
pub const DEFAULT_MAX_CALL_LEVELS: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Script artifact overriding the bundled one
    pub script_path: Option<PathBuf>,

    /// Operation budget per invocation (0 = unlimited)
    pub max_operations: u64,

    /// Maximum depth of nested script function calls
    pub max_call_levels: usize,

    /// Language used when a caller does not pick one
    pub language: Language,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            script_path: None,
            max_operations: 0,
            max_call_levels: DEFAULT_MAX_CALL_LEVELS,
            language: Language::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from an optional TOML file layered under
    /// `DOCFILTER_*` environment variables.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config: RuntimeConfig = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()
            .context("Failed to read runtime configuration")?
            .try_deserialize()
            .context("Invalid runtime configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_call_levels == 0 {
            anyhow::bail!("max_call_levels must be greater than 0");
        }

        if let Some(path) = &self.script_path {
            if path.as_os_str().is_empty() {
                anyhow::bail!("script_path must not be empty");
            }
        }

        Ok(())
    }
}
