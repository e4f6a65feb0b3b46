//! Record snapshot model passed to the filter script

pub mod data;
pub mod language;
pub mod permissions;
pub mod query;
pub mod resource;
