//! Query criteria passed through to the filter script

use super::resource::{AttributeId, ResourceId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Attribute-level condition evaluated by the filter script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeFilter {
    /// Collection or link type owning the attribute
    pub resource_id: ResourceId,
    pub attribute_id: AttributeId,

    /// One of `eq`, `neq`, `contains`, `gt`, `lt`, `empty`, `notEmpty`
    pub condition: String,

    #[serde(default)]
    pub value: serde_json::Value,
}

/// Filter/search criteria. Opaque to the host beyond being handed to the script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    #[serde(default)]
    pub collection_ids: BTreeSet<ResourceId>,

    #[serde(default)]
    pub link_type_ids: BTreeSet<ResourceId>,

    #[serde(default)]
    pub document_ids: BTreeSet<ResourceId>,

    #[serde(default)]
    pub filters: Vec<AttributeFilter>,

    #[serde(default)]
    pub fulltext: Option<String>,

    #[serde(default)]
    pub page: Option<u32>,

    #[serde(default)]
    pub page_size: Option<u32>,
}

impl Query {
    /// Query scoped to the given collections with no further criteria
    pub fn for_collections<I, S>(collection_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            collection_ids: collection_ids.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// True when the query carries no scope, filters, fulltext or paging
    pub fn is_empty(&self) -> bool {
        self.collection_ids.is_empty()
            && self.link_type_ids.is_empty()
            && self.document_ids.is_empty()
            && self.filters.is_empty()
            && self.fulltext.as_deref().map_or(true, str::is_empty)
            && self.page_size.is_none()
    }

    /// Whether every result of `self` would also be a result of `other`.
    ///
    /// Each non-empty scope of `other` must be contained in the same scope of
    /// `self`, and `self.fulltext` must extend `other.fulltext`.
    pub fn is_more_specific_than(&self, other: &Query) -> bool {
        if !other.collection_ids.is_subset(&self.collection_ids) {
            return false;
        }
        if !other.document_ids.is_subset(&self.document_ids) {
            return false;
        }
        if !other.link_type_ids.is_subset(&self.link_type_ids) {
            return false;
        }
        if !other.filters.iter().all(|f| self.filters.contains(f)) {
            return false;
        }
        match (&self.fulltext, &other.fulltext) {
            (_, None) => true,
            (Some(mine), Some(theirs)) => mine.starts_with(theirs.as_str()),
            (None, Some(_)) => false,
        }
    }
}
