//! JSON snapshot files consumed by `docfilter filter`

use anyhow::{Context, Result};
use docfilter_runtime::{FilterRequest, FilteredData, PermissionsMap};
use docfilter_shared::{
    AllowedPermissions, Collection, ConstraintData, Document, Language, LinkInstance, LinkType,
    Query,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Everything one filtering call needs except the flags and the language
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapshotFile {
    pub documents: Vec<Document>,
    pub collections: Vec<Collection>,
    pub link_types: Vec<LinkType>,
    pub link_instances: Vec<LinkInstance>,
    pub query: Query,
    pub collection_permissions: HashMap<String, AllowedPermissions>,
    pub link_type_permissions: HashMap<String, AllowedPermissions>,
    pub constraint_data: ConstraintData,
}

impl SnapshotFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse snapshot {}", path.display()))
    }

    pub fn into_request(
        self,
        language: Language,
        include_children: bool,
        include_non_linked_documents: bool,
    ) -> FilterRequest {
        FilterRequest {
            documents: shared(self.documents),
            collections: shared(self.collections),
            link_types: shared(self.link_types),
            link_instances: shared(self.link_instances),
            query: Arc::new(self.query),
            collection_permissions: shared_map(self.collection_permissions),
            link_type_permissions: shared_map(self.link_type_permissions),
            constraint_data: Arc::new(self.constraint_data),
            include_children,
            include_non_linked_documents,
            language,
        }
    }
}

fn shared<T>(items: Vec<T>) -> Vec<Arc<T>> {
    items.into_iter().map(Arc::new).collect()
}

fn shared_map(permissions: HashMap<String, AllowedPermissions>) -> PermissionsMap {
    permissions
        .into_iter()
        .map(|(id, p)| (id, Arc::new(p)))
        .collect()
}

/// Ids selected by one call, as written by `--json`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionReport<'a> {
    pub language: &'a str,
    pub fallback: bool,
    pub documents: Vec<&'a str>,
    pub link_instances: Vec<&'a str>,
}

impl<'a> SelectionReport<'a> {
    pub fn new(language: Language, fallback: bool, data: &'a FilteredData) -> Self {
        Self {
            language: language.to_language_tag(),
            fallback,
            documents: data.document_ids(),
            link_instances: data.link_instance_ids(),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}
