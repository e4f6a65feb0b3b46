//! Process-wide filter runtime: the loaded artifact plus the shared engine

use crate::artifact::{ScriptArtifact, ScriptSource};
use crate::config::RuntimeConfig;
use crate::engine::{EngineLimits, EngineManager};
use once_cell::sync::OnceCell;
use std::sync::Arc;

static GLOBAL: OnceCell<FilterRuntime> = OnceCell::new();

/// Cheap handle to an artifact and the engine that runs it
#[derive(Debug, Clone)]
pub struct FilterRuntime {
    artifact: Arc<ScriptArtifact>,
    engine: Arc<EngineManager>,
}

impl FilterRuntime {
    pub fn new(artifact: ScriptArtifact, engine: EngineManager) -> Self {
        Self {
            artifact: Arc::new(artifact),
            engine: Arc::new(engine),
        }
    }

    /// Load the configured artifact and prepare (but not build) the engine
    pub fn from_config(config: &RuntimeConfig) -> Self {
        let source = ScriptSource::from_path(config.script_path.clone());
        Self::new(
            ScriptArtifact::load(&source),
            EngineManager::new(EngineLimits::from(config)),
        )
    }

    /// Initialise the process-wide runtime.
    ///
    /// Only the first call loads anything; later calls, whatever their
    /// configuration, return the runtime established by the first one.
    pub fn init(config: &RuntimeConfig) -> &'static FilterRuntime {
        GLOBAL.get_or_init(|| Self::from_config(config))
    }

    /// The process-wide runtime, initialised with defaults if nobody called
    /// [`FilterRuntime::init`] first
    pub fn global() -> &'static FilterRuntime {
        GLOBAL.get_or_init(|| Self::from_config(&RuntimeConfig::default()))
    }

    pub fn artifact(&self) -> &ScriptArtifact {
        &self.artifact
    }

    pub fn engine(&self) -> &EngineManager {
        &self.engine
    }
}
