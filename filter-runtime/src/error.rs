//! Failure taxonomy of a filtering invocation

use thiserror::Error;

/// Errors a filtering invocation can run into.
///
/// Only [`FilterError::Configuration`] ever reaches the caller as an `Err`;
/// the other two are absorbed at the invocation boundary and turned into an
/// empty result (see [`crate::task::FilterOutcome`]).
#[derive(Debug, Clone, Error)]
pub enum FilterError {
    /// The script artifact failed to load; nothing was executed.
    #[error("filter script unavailable: {0}")]
    Configuration(String),

    /// The script raised a runtime error.
    #[error("filter script execution failed: {0}")]
    Execution(String),

    /// The script returned a value without the expected shape, or an element
    /// that does not map back to an input entity.
    #[error("filter script returned a malformed result: {0}")]
    MalformedResult(String),
}

impl FilterError {
    /// Whether this failure degrades to an empty result instead of surfacing
    pub fn is_absorbed(&self) -> bool {
        !matches!(self, FilterError::Configuration(_))
    }
}

impl From<Box<rhai::EvalAltResult>> for FilterError {
    fn from(err: Box<rhai::EvalAltResult>) -> Self {
        FilterError::Execution(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FilterError>;
