//! Script-backed document and link filtering
//!
//! Takes an in-memory snapshot of documents, collections, link types and link
//! instances together with a query, permission maps and constraint data, and
//! returns the documents and links the bundled filter script selects. The
//! filter logic itself lives in a versioned Rhai artifact with a fixed calling
//! convention:
//!
//! ```text
//! filterDocumentsAndLinksByQuery(
//!   documents, collections, linkTypes, linkInstances,
//!   query,
//!   collectionPermissions, linkTypePermissions,
//!   constraintData,
//!   includeChildren, includeNonLinkedDocuments,
//!   languageTag
//! ) -> #{ documents: [...], linkInstances: [...] }
//! ```

pub mod artifact;
pub mod config;
pub mod engine;
pub mod error;
pub mod marshal;
pub mod runtime;
pub mod task;

pub use artifact::{ArtifactState, FilterFunction, ScriptArtifact, ScriptSource};
pub use config::RuntimeConfig;
pub use engine::{EngineLimits, EngineManager, ExecutionContext};
pub use error::{FilterError, Result};
pub use runtime::FilterRuntime;
pub use task::{DataFilterTask, FilterOutcome, FilterRequest, FilteredData, PermissionsMap};
