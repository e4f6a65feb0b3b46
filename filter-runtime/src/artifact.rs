//! Script artifact loader.
//!
//! The filter logic lives in a separately maintained Rhai script. It is read
//! once, wrapped with the fixed entry point of the calling convention, and
//! compiled. The result is an immutable [`ScriptArtifact`] whose availability
//! is decided at load time and never changes afterwards: a missing or broken
//! artifact is not retried.

use crate::error::{FilterError, Result};
use docfilter_shared::FILTER_API_VERSION;
use rhai::{Engine, AST};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Entry point the host calls, part of the versioned calling convention
pub const ENTRY_POINT: &str = "filterDocumentsAndLinksByQuery";

/// Function the artifact must define; the entry point forwards to it
pub const DELEGATE: &str = "filter_documents_and_links_by_query";

/// Number of arguments of the entry point
pub const ENTRY_POINT_ARITY: usize = 11;

/// Expression nesting limit for top-level code
pub const MAX_EXPR_DEPTH: usize = 128;

/// Expression nesting limit inside script functions
pub const MAX_FUNCTION_EXPR_DEPTH: usize = 128;

/// Artifact shipped with the runtime
pub const BUNDLED_SCRIPT: &str = include_str!("../assets/data-filters.rhai");

/// Name reported for the bundled artifact
pub const BUNDLED_NAME: &str = "data-filters.rhai";

/// Where the script text comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    /// The artifact compiled into the binary
    Bundled,
    /// A script file on disk
    File(PathBuf),
    /// Script text supplied directly
    Inline { name: String, code: String },
}

impl ScriptSource {
    /// `File` when a path is given, otherwise the bundled artifact
    pub fn from_path(path: Option<PathBuf>) -> Self {
        path.map(ScriptSource::File).unwrap_or(ScriptSource::Bundled)
    }
}

/// Compiled, wrapped script ready to be evaluated in an execution context
#[derive(Debug, Clone)]
pub struct FilterFunction {
    name: Arc<str>,
    ast: Arc<AST>,
}

impl FilterFunction {
    /// Name of the artifact this function was built from
    pub fn source_name(&self) -> &str {
        &self.name
    }

    pub fn ast(&self) -> &AST {
        &self.ast
    }

    pub fn entry_point(&self) -> &'static str {
        ENTRY_POINT
    }
}

/// Availability of the artifact, fixed at load time
#[derive(Debug, Clone)]
pub enum ArtifactState {
    Available(FilterFunction),
    Unavailable { reason: String },
}

/// Loaded script artifact
#[derive(Debug, Clone)]
pub struct ScriptArtifact {
    state: ArtifactState,
}

impl ScriptArtifact {
    /// Read, wrap and compile the artifact.
    ///
    /// Never fails: any problem is recorded as [`ArtifactState::Unavailable`].
    pub fn load(source: &ScriptSource) -> Self {
        let loaded = match source {
            ScriptSource::Bundled => Ok((BUNDLED_NAME.to_string(), BUNDLED_SCRIPT.to_string())),
            ScriptSource::File(path) => std::fs::read_to_string(path)
                .map(|code| (path.display().to_string(), code))
                .map_err(|e| format!("cannot read {}: {}", path.display(), e)),
            ScriptSource::Inline { name, code } => Ok((name.clone(), code.clone())),
        };

        let state = match loaded.and_then(|(name, code)| compile(&name, &code)) {
            Ok(function) => {
                info!(
                    "Loaded filter script artifact {} (calling convention v{})",
                    function.source_name(),
                    FILTER_API_VERSION
                );
                ArtifactState::Available(function)
            }
            Err(reason) => {
                warn!("Filter script artifact unavailable: {}", reason);
                ArtifactState::Unavailable { reason }
            }
        };

        Self { state }
    }

    /// Shorthand for loading inline script text
    pub fn from_source(name: &str, code: &str) -> Self {
        Self::load(&ScriptSource::Inline {
            name: name.to_string(),
            code: code.to_string(),
        })
    }

    /// Artifact that is permanently unavailable
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            state: ArtifactState::Unavailable {
                reason: reason.into(),
            },
        }
    }

    pub fn state(&self) -> &ArtifactState {
        &self.state
    }

    pub fn is_available(&self) -> bool {
        matches!(self.state, ArtifactState::Available(_))
    }

    /// The wrapped entry point, or a configuration error when unavailable
    pub fn function(&self) -> Result<&FilterFunction> {
        match &self.state {
            ArtifactState::Available(function) => Ok(function),
            ArtifactState::Unavailable { reason } => {
                Err(FilterError::Configuration(reason.clone()))
            }
        }
    }
}

/// Append the fixed entry point to the artifact text.
fn wrap(code: &str) -> String {
    format!(
        "{code}\n;\n\
         fn {ENTRY_POINT}(documents, collections, linkTypes, linkInstances, query, \
         collectionPermissions, linkTypePermissions, constraintData, \
         includeChildren, includeNonLinkedDocuments, language) {{\n    \
         {DELEGATE}(documents, collections, linkTypes, linkInstances, query, \
         collectionPermissions, linkTypePermissions, constraintData, \
         includeChildren, includeNonLinkedDocuments, language)\n}}\n"
    )
}

fn compile(name: &str, code: &str) -> std::result::Result<FilterFunction, String> {
    // Parsing needs no registered host types, only the grammar.
    let mut parser = Engine::new_raw();
    parser.set_max_expr_depths(MAX_EXPR_DEPTH, MAX_FUNCTION_EXPR_DEPTH);
    let ast = parser
        .compile(wrap(code))
        .map_err(|e| format!("{} does not compile: {}", name, e))?;

    let has_delegate = ast
        .iter_functions()
        .any(|f| f.name == DELEGATE && f.params.len() == ENTRY_POINT_ARITY);
    if !has_delegate {
        return Err(format!(
            "{} does not define {}/{}",
            name, DELEGATE, ENTRY_POINT_ARITY
        ));
    }

    Ok(FilterFunction {
        name: Arc::from(name),
        ast: Arc::new(ast),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PASS_THROUGH: &str = r#"
        fn filter_documents_and_links_by_query(documents, collections, link_types, link_instances,
            query, collection_permissions, link_type_permissions, constraint_data,
            include_children, include_non_linked, language) {
            #{ documents: documents, linkInstances: link_instances }
        }
    "#;

    #[test]
    fn test_bundled_artifact_is_available() {
        let artifact = ScriptArtifact::load(&ScriptSource::Bundled);
        assert!(artifact.is_available());
        let function = artifact.function().unwrap();
        assert_eq!(function.source_name(), BUNDLED_NAME);
        assert!(function
            .ast()
            .iter_functions()
            .any(|f| f.name == ENTRY_POINT && f.params.len() == ENTRY_POINT_ARITY));
    }

    #[test]
    fn test_bundled_artifact_defines_helpers() {
        let function = ScriptArtifact::load(&ScriptSource::Bundled)
            .function()
            .cloned()
            .unwrap();
        for helper in ["is_selected", "descendants", "links_between", "page_of"] {
            assert!(
                function.ast().iter_functions().any(|f| f.name == helper),
                "missing {}",
                helper
            );
        }
    }

    #[test]
    fn test_nested_loops_within_depth_limit() {
        let nested = r#"
            fn filter_documents_and_links_by_query(documents, b, c, d, e, f, g, h, include_children, j, k) {
                let out = [];
                if include_children {
                    let changed = true;
                    while changed {
                        changed = false;
                        for document in documents {
                            if document.id != "" {
                                if !(document.parentId in out) {
                                    if type_of(document) != "()" {
                                        out.push(document);
                                    }
                                }
                            }
                        }
                    }
                }
                #{ documents: out, linkInstances: [] }
            }
        "#;
        assert!(ScriptArtifact::from_source("nested", nested).is_available());
    }

    #[test]
    fn test_inline_artifact_is_wrapped() {
        let artifact = ScriptArtifact::from_source("pass", PASS_THROUGH);
        let function = artifact.function().unwrap();
        assert_eq!(function.entry_point(), ENTRY_POINT);
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let artifact =
            ScriptArtifact::load(&ScriptSource::File(PathBuf::from("/nonexistent/filters.rhai")));
        assert!(!artifact.is_available());
        assert!(matches!(
            artifact.function(),
            Err(FilterError::Configuration(ref reason)) if reason.contains("cannot read")
        ));
    }

    #[test]
    fn test_file_artifact_loads() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PASS_THROUGH.as_bytes()).unwrap();
        let artifact = ScriptArtifact::load(&ScriptSource::File(file.path().to_path_buf()));
        assert!(artifact.is_available());
    }

    #[test]
    fn test_syntax_error_is_unavailable() {
        let artifact = ScriptArtifact::from_source("broken", "fn oops( {");
        assert!(matches!(
            artifact.function(),
            Err(FilterError::Configuration(ref reason)) if reason.contains("does not compile")
        ));
    }

    #[test]
    fn test_missing_delegate_is_unavailable() {
        let artifact = ScriptArtifact::from_source("empty", "let x = 1;");
        assert!(matches!(
            artifact.state(),
            ArtifactState::Unavailable { reason } if reason.contains(DELEGATE)
        ));
    }

    #[test]
    fn test_source_from_path() {
        assert_eq!(ScriptSource::from_path(None), ScriptSource::Bundled);
        assert_eq!(
            ScriptSource::from_path(Some(PathBuf::from("a.rhai"))),
            ScriptSource::File(PathBuf::from("a.rhai"))
        );
    }
}
