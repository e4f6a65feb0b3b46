//! Filter invocation task.
//!
//! One [`DataFilterTask`] runs one filtering call end to end: it checks the
//! artifact, acquires an execution context, marshals the eleven arguments of
//! the calling convention, invokes the entry point and unmarshals the
//! `{ documents, linkInstances }` result. Script failures and malformed
//! results degrade to an empty result; only a missing artifact surfaces as an
//! error.

use crate::artifact::FilterFunction;
use crate::engine::ExecutionContext;
use crate::error::{FilterError, Result};
use crate::marshal::{Marshaler, ProxyContext};
use crate::runtime::FilterRuntime;
use docfilter_shared::{
    AllowedPermissions, Collection, ConstraintData, Document, Language, LinkInstance, LinkType,
    Query,
};
use rhai::Dynamic;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Permission map keyed by collection or link type id
pub type PermissionsMap = HashMap<String, Arc<AllowedPermissions>>;

/// Inputs of one filtering call. Every sequence is a read-only snapshot.
#[derive(Debug, Clone, Default)]
pub struct FilterRequest {
    pub documents: Vec<Arc<Document>>,
    pub collections: Vec<Arc<Collection>>,
    pub link_types: Vec<Arc<LinkType>>,
    pub link_instances: Vec<Arc<LinkInstance>>,
    pub query: Arc<Query>,
    pub collection_permissions: PermissionsMap,
    pub link_type_permissions: PermissionsMap,
    pub constraint_data: Arc<ConstraintData>,
    pub include_children: bool,
    pub include_non_linked_documents: bool,
    pub language: Language,
}

/// Documents and link instances selected by the script.
///
/// Every element is one of the `Arc`s of the request, never a copy.
#[derive(Debug, Clone, Default)]
pub struct FilteredData {
    pub documents: Vec<Arc<Document>>,
    pub link_instances: Vec<Arc<LinkInstance>>,
}

impl FilteredData {
    /// The fallback pair `([], [])`
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty() && self.link_instances.is_empty()
    }

    pub fn document_ids(&self) -> Vec<&str> {
        self.documents.iter().map(|d| d.id.as_str()).collect()
    }

    pub fn link_instance_ids(&self) -> Vec<&str> {
        self.link_instances.iter().map(|l| l.id.as_str()).collect()
    }
}

/// Terminal state of an invocation that did not hit a configuration error
#[derive(Debug, Clone)]
pub enum FilterOutcome {
    /// The script returned a well-formed result
    Filtered(FilteredData),
    /// The script failed or returned a malformed result; callers see `([], [])`
    Fallback(FilterError),
}

impl FilterOutcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self, FilterOutcome::Fallback(_))
    }

    pub fn error(&self) -> Option<&FilterError> {
        match self {
            FilterOutcome::Filtered(_) => None,
            FilterOutcome::Fallback(err) => Some(err),
        }
    }

    pub fn into_data(self) -> FilteredData {
        match self {
            FilterOutcome::Filtered(data) => data,
            FilterOutcome::Fallback(_) => FilteredData::empty(),
        }
    }
}

/// A self-contained filtering call, submittable to a worker pool
#[derive(Debug, Clone)]
pub struct DataFilterTask {
    request: FilterRequest,
    runtime: FilterRuntime,
}

impl DataFilterTask {
    /// Task bound to the process-wide runtime
    pub fn new(request: FilterRequest) -> Self {
        Self::with_runtime(request, FilterRuntime::global().clone())
    }

    pub fn with_runtime(request: FilterRequest, runtime: FilterRuntime) -> Self {
        Self { request, runtime }
    }

    pub fn request(&self) -> &FilterRequest {
        &self.request
    }

    /// Run the call and report how it ended.
    ///
    /// `Err` only carries [`FilterError::Configuration`]; in that case no
    /// execution context is acquired.
    pub fn outcome(self) -> Result<FilterOutcome> {
        let Self { request, runtime } = self;

        let function = runtime.artifact().function()?;

        let result = {
            let mut context = runtime.engine().new_context();
            execute(&mut context, function, request)
            // context released here on every path
        };

        match result {
            Ok(data) => {
                debug!(
                    "Filter selected {} documents and {} link instances",
                    data.documents.len(),
                    data.link_instances.len()
                );
                Ok(FilterOutcome::Filtered(data))
            }
            Err(err) if err.is_absorbed() => {
                error!("Error filtering data: {}", err);
                Ok(FilterOutcome::Fallback(err))
            }
            Err(err) => Err(err),
        }
    }

    /// Run the call; script faults yield the empty pair
    pub fn call(self) -> Result<FilteredData> {
        self.outcome().map(FilterOutcome::into_data)
    }

    /// Submit the call to tokio's blocking pool.
    ///
    /// The script call cannot be interrupted; a caller that needs a deadline
    /// wraps the handle in `tokio::time::timeout` and abandons it on expiry.
    pub fn spawn(self) -> JoinHandle<Result<FilterOutcome>> {
        tokio::task::spawn_blocking(move || self.outcome())
    }
}

fn execute(
    context: &mut ExecutionContext<'_>,
    function: &FilterFunction,
    request: FilterRequest,
) -> Result<FilteredData> {
    let FilterRequest {
        documents,
        collections,
        link_types,
        link_instances,
        query,
        collection_permissions,
        link_type_permissions,
        constraint_data,
        include_children,
        include_non_linked_documents,
        language,
    } = request;

    debug!(
        "Filtering {} documents and {} link instances in context #{} ({})",
        documents.len(),
        link_instances.len(),
        context.id(),
        language
    );

    let marshaler = Marshaler::new(ProxyContext::new(
        language,
        Arc::clone(&constraint_data),
        &collections,
        &link_types,
    ));

    // Order and count are fixed by the calling convention.
    let args = [
        marshaler.list(documents),
        marshaler.list(collections),
        marshaler.list(link_types),
        marshaler.list(link_instances),
        marshaler.object(query),
        marshaler.map(collection_permissions),
        marshaler.map(link_type_permissions),
        marshaler.object(constraint_data),
        Dynamic::from(include_children),
        Dynamic::from(include_non_linked_documents),
        Dynamic::from(language.to_language_tag().to_string()),
    ];

    let value = context.invoke(function, args)?;
    let (documents, link_instances) = marshaler.unmarshal_result(value)?;

    Ok(FilteredData {
        documents,
        link_instances,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ScriptArtifact;
    use crate::engine::EngineManager;

    fn runtime(code: &str) -> FilterRuntime {
        FilterRuntime::new(
            ScriptArtifact::from_source("test", code),
            EngineManager::default(),
        )
    }

    const ARGUMENT_ECHO_SCRIPT: &str = r#"
        fn filter_documents_and_links_by_query(documents, collections, link_types, link_instances,
            query, collection_permissions, link_type_permissions, constraint_data,
            include_children, include_non_linked, language) {
            if type_of(include_children) != "bool" || type_of(include_non_linked) != "bool" {
                throw "flags are not booleans";
            }
            if include_children || !include_non_linked || language != "de" {
                throw "flags or language out of order";
            }
            if collections.len() != 1 || link_types.len() != 0 || link_instances.len() != 0 {
                throw "sequences out of order";
            }
            if !("c1" in collection_permissions) || link_type_permissions.len() != 0 {
                throw "permission maps out of order";
            }
            if !("c1" in query.collectionIds) || constraint_data.language != "de" {
                throw "query or constraint data out of order";
            }
            #{ documents: documents, linkInstances: [] }
        }
    "#;

    #[test]
    fn test_arguments_arrive_in_order() {
        let mut permissions = PermissionsMap::new();
        permissions.insert("c1".to_string(), Arc::new(AllowedPermissions::all()));
        let request = FilterRequest {
            documents: vec![Arc::new(Document::new("d1", "c1"))],
            collections: vec![Arc::new(Collection {
                id: "c1".to_string(),
                name: "Tasks".to_string(),
                attributes: vec![],
            })],
            query: Arc::new(Query::for_collections(["c1"])),
            collection_permissions: permissions,
            include_non_linked_documents: true,
            language: Language::De,
            ..Default::default()
        };

        let outcome = DataFilterTask::with_runtime(request, runtime(ARGUMENT_ECHO_SCRIPT))
            .outcome()
            .unwrap();
        assert!(!outcome.is_fallback(), "{:?}", outcome.error());
        assert_eq!(outcome.into_data().document_ids(), vec!["d1"]);
    }

    #[test]
    fn test_unavailable_artifact_skips_engine() {
        let runtime = FilterRuntime::new(
            ScriptArtifact::unavailable("not packaged"),
            EngineManager::default(),
        );
        let result = DataFilterTask::with_runtime(FilterRequest::default(), runtime.clone()).call();
        assert!(matches!(result, Err(FilterError::Configuration(_))));
        assert_eq!(runtime.engine().contexts_created(), 0);
        assert!(!runtime.engine().is_initialized());
    }

    #[test]
    fn test_fallback_releases_context() {
        let runtime = runtime(
            r#"fn filter_documents_and_links_by_query(a, b, c, d, e, f, g, h, i, j, k) { throw "boom"; }"#,
        );
        let outcome = DataFilterTask::with_runtime(FilterRequest::default(), runtime.clone())
            .outcome()
            .unwrap();
        assert!(matches!(outcome.error(), Some(FilterError::Execution(_))));
        assert!(outcome.into_data().is_empty());
        assert_eq!(runtime.engine().contexts_created(), 1);
        assert_eq!(runtime.engine().live_contexts(), 0);
    }

    #[test]
    fn test_filtered_data_empty() {
        let data = FilteredData::empty();
        assert!(data.is_empty());
        assert!(data.document_ids().is_empty());
    }
}
