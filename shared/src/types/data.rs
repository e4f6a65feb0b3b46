//! Documents and link instances

use super::resource::{ResourceId, SchemaKind};
use serde::{Deserialize, Serialize};

/// Attribute values keyed by attribute id
pub type DataMap = serde_json::Map<String, serde_json::Value>;

/// Structured record belonging to a collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: ResourceId,
    pub collection_id: ResourceId,

    /// Parent document in the same collection (hierarchies)
    #[serde(default)]
    pub parent_id: Option<ResourceId>,

    /// Id of the user that created the document
    #[serde(default)]
    pub created_by: Option<String>,

    #[serde(default)]
    pub data: DataMap,
}

/// Concrete relation between two documents, typed by a link type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkInstance {
    pub id: ResourceId,
    pub link_type_id: ResourceId,

    /// The two connected documents
    pub document_ids: (ResourceId, ResourceId),

    #[serde(default)]
    pub created_by: Option<String>,

    #[serde(default)]
    pub data: DataMap,
}

/// Anything carrying attribute values described by a schema
pub trait AttributeValues {
    fn schema_kind(&self) -> SchemaKind;
    /// Id of the collection or link type whose schema applies
    fn schema_id(&self) -> &str;
    fn data(&self) -> &DataMap;

    fn value(&self, attribute_id: &str) -> Option<&serde_json::Value> {
        self.data().get(attribute_id)
    }
}

impl AttributeValues for Document {
    fn schema_kind(&self) -> SchemaKind {
        SchemaKind::Collection
    }

    fn schema_id(&self) -> &str {
        &self.collection_id
    }

    fn data(&self) -> &DataMap {
        &self.data
    }
}

impl AttributeValues for LinkInstance {
    fn schema_kind(&self) -> SchemaKind {
        SchemaKind::LinkType
    }

    fn schema_id(&self) -> &str {
        &self.link_type_id
    }

    fn data(&self) -> &DataMap {
        &self.data
    }
}

impl Document {
    /// Create a document with no attribute values
    pub fn new(id: impl Into<String>, collection_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            collection_id: collection_id.into(),
            parent_id: None,
            created_by: None,
            data: DataMap::new(),
        }
    }

    /// Builder-style attribute setter
    pub fn with_value(mut self, attribute_id: &str, value: serde_json::Value) -> Self {
        self.data.insert(attribute_id.to_string(), value);
        self
    }
}

impl LinkInstance {
    pub fn new(
        id: impl Into<String>,
        link_type_id: impl Into<String>,
        documents: (impl Into<String>, impl Into<String>),
    ) -> Self {
        Self {
            id: id.into(),
            link_type_id: link_type_id.into(),
            document_ids: (documents.0.into(), documents.1.into()),
            created_by: None,
            data: DataMap::new(),
        }
    }

    /// Whether this link touches `document_id` on either side
    pub fn touches(&self, document_id: &str) -> bool {
        self.document_ids.0 == document_id || self.document_ids.1 == document_id
    }
}
