//! Shared types and utilities for docfilter
//!
//! This crate contains the record snapshot model (documents, collections,
//! link types, link instances), the query and permission inputs handed to
//! the filter script, and the locale-aware value formatting used when a
//! script reads rendered attribute values.

pub mod types;
pub mod utils;

// Re-export commonly used types
pub use types::{data::*, language::*, permissions::*, query::*, resource::*};

/// Version of the host/script calling convention. Bumped together with the
/// bundled script artifact whenever argument order or result shape changes.
pub const FILTER_API_VERSION: u32 = 1;
