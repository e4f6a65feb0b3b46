//! Execution engine manager.
//!
//! One Rhai [`Engine`] is built lazily and shared for the lifetime of the
//! manager; every filtering call gets its own [`ExecutionContext`] with a
//! fresh [`Scope`]. The artifact's top-level statements run inside that scope
//! on each call, so no script bindings survive from one call to the next.
//!
//! Trust boundary: the engine runs with the full standard package set and
//! script code can read every host value handed to it. The script artifact
//! is a trusted dependency shipped with the host, not user input; nothing
//! here sandboxes hostile code.

use crate::artifact::{
    FilterFunction, ENTRY_POINT_ARITY, MAX_EXPR_DEPTH, MAX_FUNCTION_EXPR_DEPTH,
};
use crate::config::RuntimeConfig;
use crate::error::{FilterError, Result};
use crate::marshal;
use once_cell::sync::OnceCell;
use rhai::{CallFnOptions, Dynamic, Engine, Scope};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Engine limits taken from the runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineLimits {
    /// Operation budget per call (0 = unlimited)
    pub max_operations: u64,
    pub max_call_levels: usize,
}

impl From<&RuntimeConfig> for EngineLimits {
    fn from(config: &RuntimeConfig) -> Self {
        Self {
            max_operations: config.max_operations,
            max_call_levels: config.max_call_levels,
        }
    }
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self::from(&RuntimeConfig::default())
    }
}

/// Owner of the shared engine; hands out isolated execution contexts.
///
/// `EngineManager` is `Sync`: any number of threads may call
/// [`EngineManager::new_context`] at once without external locking.
pub struct EngineManager {
    limits: EngineLimits,
    engine: OnceCell<Engine>,
    created: AtomicU64,
    released: AtomicU64,
}

impl EngineManager {
    pub fn new(limits: EngineLimits) -> Self {
        Self {
            limits,
            engine: OnceCell::new(),
            created: AtomicU64::new(0),
            released: AtomicU64::new(0),
        }
    }

    pub fn limits(&self) -> EngineLimits {
        self.limits
    }

    /// Whether the shared engine has been built yet
    pub fn is_initialized(&self) -> bool {
        self.engine.get().is_some()
    }

    fn engine(&self) -> &Engine {
        self.engine.get_or_init(|| build_engine(self.limits))
    }

    /// Acquire a fresh context. It is released when dropped.
    pub fn new_context(&self) -> ExecutionContext<'_> {
        let engine = self.engine();
        let id = self.created.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("Acquired execution context #{}", id);
        ExecutionContext {
            id,
            manager: self,
            engine,
            scope: Scope::new(),
        }
    }

    /// Number of contexts handed out so far
    pub fn contexts_created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// Number of contexts dropped so far
    pub fn contexts_released(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }

    /// Contexts currently alive
    pub fn live_contexts(&self) -> u64 {
        self.contexts_created()
            .saturating_sub(self.contexts_released())
    }
}

impl Default for EngineManager {
    fn default() -> Self {
        Self::new(EngineLimits::default())
    }
}

impl std::fmt::Debug for EngineManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineManager")
            .field("limits", &self.limits)
            .field("initialized", &self.is_initialized())
            .field("contexts_created", &self.contexts_created())
            .field("contexts_released", &self.contexts_released())
            .finish()
    }
}

fn build_engine(limits: EngineLimits) -> Engine {
    let mut engine = Engine::new();
    engine.set_max_operations(limits.max_operations);
    engine.set_max_call_levels(limits.max_call_levels);
    // Same nesting limits the artifact was compiled with
    engine.set_max_expr_depths(MAX_EXPR_DEPTH, MAX_FUNCTION_EXPR_DEPTH);

    // Route script output into tracing instead of stdout
    engine.on_print(|text| debug!("[filter script] {}", text));
    engine.on_debug(|text, source, pos| {
        debug!("[filter script] {} ({} @ {})", text, source.unwrap_or("-"), pos)
    });

    marshal::register_types(&mut engine);

    info!(
        "Built shared filter engine (max_operations={}, max_call_levels={})",
        limits.max_operations, limits.max_call_levels
    );
    engine
}

/// One isolated run of the shared engine, owned by a single invocation.
///
/// Not `Clone`; dropping it releases the context exactly once.
pub struct ExecutionContext<'m> {
    id: u64,
    manager: &'m EngineManager,
    engine: &'m Engine,
    scope: Scope<'static>,
}

impl ExecutionContext<'_> {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Evaluate the artifact in this context and call its entry point.
    pub fn invoke(
        &mut self,
        function: &FilterFunction,
        args: [Dynamic; ENTRY_POINT_ARITY],
    ) -> Result<Dynamic> {
        let options = CallFnOptions::new().eval_ast(true).rewind_scope(true);
        self.engine
            .call_fn_with_options::<Dynamic>(
                options,
                &mut self.scope,
                function.ast(),
                function.entry_point(),
                Vec::from(args),
            )
            .map_err(FilterError::from)
    }
}

impl Drop for ExecutionContext<'_> {
    fn drop(&mut self) {
        self.manager.released.fetch_add(1, Ordering::Relaxed);
        debug!("Released execution context #{}", self.id);
    }
}
