//! Collections, link types and their attribute schema

use serde::{Deserialize, Serialize};

/// Resource identifier (collection, link type, document, link instance)
pub type ResourceId = String;

/// Attribute identifier, unique within its collection or link type
pub type AttributeId = String;

/// One option of a select constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectOption {
    pub value: String,

    /// Human readable label; falls back to `value` when absent
    #[serde(default)]
    pub display_value: Option<String>,
}

/// Value constraint attached to an attribute.
///
/// Constraints never change which records exist, only how values are
/// rendered to the filter script through `formattedData`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Constraint {
    Text,
    Number {
        #[serde(default)]
        decimals: Option<u32>,
    },
    Percentage {
        #[serde(default)]
        decimals: Option<u32>,
    },
    Boolean,
    DateTime,
    Select {
        #[serde(default)]
        options: Vec<SelectOption>,
    },
    User,
}

/// Attribute definition of a collection or link type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub id: AttributeId,
    pub name: String,

    #[serde(default)]
    pub constraint: Option<Constraint>,
}

/// Schema/grouping container for documents
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: ResourceId,
    pub name: String,

    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

/// Named relation type connecting two collections
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkType {
    pub id: ResourceId,
    pub name: String,

    /// The pair of collections this link type connects
    pub collection_ids: (ResourceId, ResourceId),

    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl LinkType {
    /// Whether either side of this link type is `collection_id`
    pub fn connects(&self, collection_id: &str) -> bool {
        self.collection_ids.0 == collection_id || self.collection_ids.1 == collection_id
    }
}

/// Kind of resource an attribute schema belongs to.
///
/// Collection and link type ids live in separate namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaKind {
    Collection,
    LinkType,
}

/// Anything carrying an attribute schema
pub trait AttributeSchema {
    fn kind(&self) -> SchemaKind;
    fn resource_id(&self) -> &str;
    fn attributes(&self) -> &[Attribute];
}

impl AttributeSchema for Collection {
    fn kind(&self) -> SchemaKind {
        SchemaKind::Collection
    }

    fn resource_id(&self) -> &str {
        &self.id
    }

    fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }
}

impl AttributeSchema for LinkType {
    fn kind(&self) -> SchemaKind {
        SchemaKind::LinkType
    }

    fn resource_id(&self) -> &str {
        &self.id
    }

    fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }
}
