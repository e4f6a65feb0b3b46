//! Object marshaler between native snapshots and the script engine.
//!
//! Native entities are never copied into the engine. Each value handed to the
//! script is a thin proxy holding an `Arc` to the native object:
//!
//!   - [`ListProxy`]: length, integer indexing and iteration over a sequence,
//!     each element wrapped lazily on access
//!   - [`MapProxy`]: string-keyed lookup over a permission map
//!   - [`ObjectProxy`]: named members read straight from the native fields
//!
//! Attribute values go through [`DataProxy`], which renders constraint-aware,
//! locale-specific text only when the script reads `formattedData[...]`.
//!
//! Unmarshaling recovers the original `Arc`s from the proxies the script
//! returns, so results are identity-equal to the inputs.

use crate::error::{FilterError, Result};
use docfilter_shared::utils::format::format_value;
use docfilter_shared::{
    AllowedPermissions, AttributeSchema, AttributeValues, Collection, Constraint, ConstraintData,
    Document, Language, LinkInstance, LinkType, Locale, Query, SchemaKind,
};
use rhai::{Array, Dynamic, Engine, EvalAltResult, ImmutableString, Map, Position, INT};
use std::collections::HashMap;
use std::sync::Arc;

type ScriptResult<T> = std::result::Result<T, Box<EvalAltResult>>;

/// Per-invocation state shared by every proxy of one call
#[derive(Debug)]
pub struct ProxyContext {
    language: Language,
    locale: Locale,
    constraint_data: Arc<ConstraintData>,
    /// schema kind -> collection or link type id -> attribute id -> constraint
    constraints: HashMap<SchemaKind, HashMap<String, HashMap<String, Constraint>>>,
}

impl ProxyContext {
    pub fn new(
        language: Language,
        constraint_data: Arc<ConstraintData>,
        collections: &[Arc<Collection>],
        link_types: &[Arc<LinkType>],
    ) -> Self {
        let mut constraints: HashMap<SchemaKind, HashMap<String, HashMap<String, Constraint>>> =
            HashMap::new();
        let schemas = collections
            .iter()
            .map(|c| c.as_ref() as &dyn AttributeSchema)
            .chain(link_types.iter().map(|l| l.as_ref() as &dyn AttributeSchema));
        for schema in schemas {
            let attributes: HashMap<String, Constraint> = schema
                .attributes()
                .iter()
                .filter_map(|a| a.constraint.clone().map(|c| (a.id.clone(), c)))
                .collect();
            constraints
                .entry(schema.kind())
                .or_default()
                .insert(schema.resource_id().to_string(), attributes);
        }

        Self {
            language,
            locale: language.to_locale(),
            constraint_data,
            constraints,
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    pub fn constraint(
        &self,
        kind: SchemaKind,
        schema_id: &str,
        attribute_id: &str,
    ) -> Option<&Constraint> {
        self.constraints.get(&kind)?.get(schema_id)?.get(attribute_id)
    }

    /// Render one attribute value for the active locale
    pub fn format(
        &self,
        kind: SchemaKind,
        schema_id: &str,
        attribute_id: &str,
        value: &serde_json::Value,
    ) -> String {
        format_value(
            value,
            self.constraint(kind, schema_id, attribute_id),
            &self.locale,
            &self.constraint_data,
        )
    }
}

/// Scalar proxy: named member access on one native object
pub struct ObjectProxy<T> {
    object: Arc<T>,
    ctx: Arc<ProxyContext>,
}

impl<T> Clone for ObjectProxy<T> {
    fn clone(&self) -> Self {
        Self {
            object: Arc::clone(&self.object),
            ctx: Arc::clone(&self.ctx),
        }
    }
}

impl<T> ObjectProxy<T> {
    pub fn object(&self) -> &Arc<T> {
        &self.object
    }

    pub fn into_inner(self) -> Arc<T> {
        self.object
    }
}

/// Sequence proxy over a read-only snapshot
pub struct ListProxy<T> {
    items: Arc<[Arc<T>]>,
    ctx: Arc<ProxyContext>,
}

impl<T> Clone for ListProxy<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            ctx: Arc::clone(&self.ctx),
        }
    }
}

impl<T> ListProxy<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Element proxy at `index`; negative indices count from the end
    pub fn get(&self, index: INT) -> ScriptResult<ObjectProxy<T>> {
        let len = self.items.len();
        let resolved = if index < 0 {
            usize::try_from(index.unsigned_abs())
                .ok()
                .and_then(|back| len.checked_sub(back))
        } else {
            usize::try_from(index).ok().filter(|i| *i < len)
        };
        match resolved {
            Some(i) => Ok(self.wrap(i)),
            None => Err(EvalAltResult::ErrorArrayBounds(len, index, Position::NONE).into()),
        }
    }

    fn wrap(&self, index: usize) -> ObjectProxy<T> {
        ObjectProxy {
            object: Arc::clone(&self.items[index]),
            ctx: Arc::clone(&self.ctx),
        }
    }
}

/// Lazy iterator handed to `for` loops in the script
pub struct ListIter<T> {
    list: ListProxy<T>,
    next: usize,
}

impl<T> Iterator for ListIter<T> {
    type Item = ObjectProxy<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.list.len() {
            return None;
        }
        let item = self.list.wrap(self.next);
        self.next += 1;
        Some(item)
    }
}

impl<T> IntoIterator for ListProxy<T> {
    type Item = ObjectProxy<T>;
    type IntoIter = ListIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        ListIter { list: self, next: 0 }
    }
}

/// Mapping proxy: string-keyed lookup over a native map
pub struct MapProxy<T> {
    entries: Arc<HashMap<String, Arc<T>>>,
    ctx: Arc<ProxyContext>,
}

impl<T> Clone for MapProxy<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            ctx: Arc::clone(&self.ctx),
        }
    }
}

impl<T: Send + Sync + 'static> MapProxy<T> {
    /// Proxy of the value under `key`, or `()` when absent
    pub fn get(&self, key: &str) -> Dynamic {
        match self.entries.get(key) {
            Some(value) => Dynamic::from(ObjectProxy {
                object: Arc::clone(value),
                ctx: Arc::clone(&self.ctx),
            }),
            None => Dynamic::UNIT,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> Array {
        let mut keys: Vec<&String> = self.entries.keys().collect();
        keys.sort();
        keys.into_iter().map(|k| Dynamic::from(k.clone())).collect()
    }
}

/// Attribute values of a document or link instance.
///
/// In raw mode values are converted from JSON on access; in formatted mode
/// they are rendered with the attribute's constraint and the active locale.
pub struct DataProxy<T> {
    owner: Arc<T>,
    ctx: Arc<ProxyContext>,
    formatted: bool,
}

impl<T> Clone for DataProxy<T> {
    fn clone(&self) -> Self {
        Self {
            owner: Arc::clone(&self.owner),
            ctx: Arc::clone(&self.ctx),
            formatted: self.formatted,
        }
    }
}

impl<T: AttributeValues> DataProxy<T> {
    pub fn get(&self, attribute_id: &str) -> ScriptResult<Dynamic> {
        let Some(value) = self.owner.value(attribute_id) else {
            return Ok(Dynamic::UNIT);
        };
        if self.formatted {
            let text = self.ctx.format(
                self.owner.schema_kind(),
                self.owner.schema_id(),
                attribute_id,
                value,
            );
            Ok(Dynamic::from(text))
        } else {
            rhai::serde::to_dynamic(value)
        }
    }

    pub fn contains(&self, attribute_id: &str) -> bool {
        self.owner.data().contains_key(attribute_id)
    }

    pub fn keys(&self) -> Array {
        self.owner
            .data()
            .keys()
            .map(|k| Dynamic::from(k.clone()))
            .collect()
    }
}

fn data_of<T>(proxy: &ObjectProxy<T>, formatted: bool) -> DataProxy<T> {
    DataProxy {
        owner: Arc::clone(&proxy.object),
        ctx: Arc::clone(&proxy.ctx),
        formatted,
    }
}

fn optional_string(value: &Option<String>) -> Dynamic {
    value.clone().map_or(Dynamic::UNIT, Dynamic::from)
}

fn optional_int(value: Option<u32>) -> Dynamic {
    value.map_or(Dynamic::UNIT, |v| Dynamic::from(v as INT))
}

fn string_array<'a>(values: impl IntoIterator<Item = &'a String>) -> Array {
    values.into_iter().map(|v| Dynamic::from(v.clone())).collect()
}

/// Register every proxy type and its documented members with `engine`.
///
/// Members not registered here do not exist for the script; reading one is
/// a runtime error.
pub fn register_types(engine: &mut Engine) {
    register_list::<Document>(engine, "DocumentList");
    register_list::<Collection>(engine, "CollectionList");
    register_list::<LinkType>(engine, "LinkTypeList");
    register_list::<LinkInstance>(engine, "LinkInstanceList");
    register_map::<AllowedPermissions>(engine, "PermissionsMap");
    register_data::<Document>(engine, "DocumentData");
    register_data::<LinkInstance>(engine, "LinkInstanceData");

    engine
        .register_type_with_name::<ObjectProxy<Document>>("Document")
        .register_get("id", |p: &mut ObjectProxy<Document>| p.object.id.clone())
        .register_get("collectionId", |p: &mut ObjectProxy<Document>| {
            p.object.collection_id.clone()
        })
        .register_get("parentId", |p: &mut ObjectProxy<Document>| {
            optional_string(&p.object.parent_id)
        })
        .register_get("createdBy", |p: &mut ObjectProxy<Document>| {
            optional_string(&p.object.created_by)
        })
        .register_get("data", |p: &mut ObjectProxy<Document>| data_of(p, false))
        .register_get("formattedData", |p: &mut ObjectProxy<Document>| data_of(p, true));

    engine
        .register_type_with_name::<ObjectProxy<LinkInstance>>("LinkInstance")
        .register_get("id", |p: &mut ObjectProxy<LinkInstance>| p.object.id.clone())
        .register_get("linkTypeId", |p: &mut ObjectProxy<LinkInstance>| {
            p.object.link_type_id.clone()
        })
        .register_get("documentIds", |p: &mut ObjectProxy<LinkInstance>| {
            let (a, b) = &p.object.document_ids;
            string_array([a, b])
        })
        .register_get("createdBy", |p: &mut ObjectProxy<LinkInstance>| {
            optional_string(&p.object.created_by)
        })
        .register_get("data", |p: &mut ObjectProxy<LinkInstance>| data_of(p, false))
        .register_get("formattedData", |p: &mut ObjectProxy<LinkInstance>| {
            data_of(p, true)
        });

    engine
        .register_type_with_name::<ObjectProxy<Collection>>("Collection")
        .register_get("id", |p: &mut ObjectProxy<Collection>| p.object.id.clone())
        .register_get("name", |p: &mut ObjectProxy<Collection>| p.object.name.clone())
        .register_get("attributes", |p: &mut ObjectProxy<Collection>| {
            rhai::serde::to_dynamic(&p.object.attributes)
        });

    engine
        .register_type_with_name::<ObjectProxy<LinkType>>("LinkType")
        .register_get("id", |p: &mut ObjectProxy<LinkType>| p.object.id.clone())
        .register_get("name", |p: &mut ObjectProxy<LinkType>| p.object.name.clone())
        .register_get("collectionIds", |p: &mut ObjectProxy<LinkType>| {
            let (a, b) = &p.object.collection_ids;
            string_array([a, b])
        })
        .register_get("attributes", |p: &mut ObjectProxy<LinkType>| {
            rhai::serde::to_dynamic(&p.object.attributes)
        });

    engine
        .register_type_with_name::<ObjectProxy<Query>>("Query")
        .register_get("collectionIds", |p: &mut ObjectProxy<Query>| {
            string_array(&p.object.collection_ids)
        })
        .register_get("linkTypeIds", |p: &mut ObjectProxy<Query>| {
            string_array(&p.object.link_type_ids)
        })
        .register_get("documentIds", |p: &mut ObjectProxy<Query>| {
            string_array(&p.object.document_ids)
        })
        .register_get("filters", |p: &mut ObjectProxy<Query>| {
            rhai::serde::to_dynamic(&p.object.filters)
        })
        .register_get("fulltext", |p: &mut ObjectProxy<Query>| {
            optional_string(&p.object.fulltext)
        })
        .register_get("page", |p: &mut ObjectProxy<Query>| optional_int(p.object.page))
        .register_get("pageSize", |p: &mut ObjectProxy<Query>| {
            optional_int(p.object.page_size)
        });

    engine
        .register_type_with_name::<ObjectProxy<AllowedPermissions>>("AllowedPermissions")
        .register_get("read", |p: &mut ObjectProxy<AllowedPermissions>| p.object.read)
        .register_get("write", |p: &mut ObjectProxy<AllowedPermissions>| p.object.write)
        .register_get("manage", |p: &mut ObjectProxy<AllowedPermissions>| p.object.manage)
        .register_get("readAll", |p: &mut ObjectProxy<AllowedPermissions>| p.object.read_all)
        .register_get("writeAll", |p: &mut ObjectProxy<AllowedPermissions>| {
            p.object.write_all
        });

    engine
        .register_type_with_name::<ObjectProxy<ConstraintData>>("ConstraintData")
        .register_get("currentUser", |p: &mut ObjectProxy<ConstraintData>| {
            match &p.object.current_user {
                Some(user) => rhai::serde::to_dynamic(user),
                None => Ok(Dynamic::UNIT),
            }
        })
        .register_get("users", |p: &mut ObjectProxy<ConstraintData>| {
            rhai::serde::to_dynamic(&p.object.users)
        })
        .register_get("teams", |p: &mut ObjectProxy<ConstraintData>| {
            rhai::serde::to_dynamic(&p.object.teams)
        })
        .register_get("timezone", |p: &mut ObjectProxy<ConstraintData>| {
            optional_string(&p.object.timezone)
        })
        .register_get("durationUnits", |p: &mut ObjectProxy<ConstraintData>| {
            rhai::serde::to_dynamic(&p.object.duration_units)
        })
        .register_get("language", |p: &mut ObjectProxy<ConstraintData>| {
            p.ctx.language().to_language_tag().to_string()
        });
}

fn register_list<T: Send + Sync + 'static>(engine: &mut Engine, name: &str) {
    engine
        .register_type_with_name::<ListProxy<T>>(name)
        .register_fn("len", |l: &mut ListProxy<T>| l.len() as INT)
        .register_get("length", |l: &mut ListProxy<T>| l.len() as INT)
        .register_fn("is_empty", |l: &mut ListProxy<T>| l.is_empty())
        .register_indexer_get(|l: &mut ListProxy<T>, index: INT| l.get(index))
        .register_iterator::<ListProxy<T>>();
}

fn register_map<T: Send + Sync + 'static>(engine: &mut Engine, name: &str) {
    engine
        .register_type_with_name::<MapProxy<T>>(name)
        .register_fn("len", |m: &mut MapProxy<T>| m.entries.len() as INT)
        .register_fn("contains", |m: &mut MapProxy<T>, key: ImmutableString| {
            m.contains(key.as_str())
        })
        .register_fn("keys", |m: &mut MapProxy<T>| m.keys())
        .register_indexer_get(|m: &mut MapProxy<T>, key: ImmutableString| m.get(key.as_str()));
}

fn register_data<T: AttributeValues + Send + Sync + 'static>(engine: &mut Engine, name: &str) {
    engine
        .register_type_with_name::<DataProxy<T>>(name)
        .register_fn("contains", |d: &mut DataProxy<T>, key: ImmutableString| {
            d.contains(key.as_str())
        })
        .register_fn("keys", |d: &mut DataProxy<T>| d.keys())
        .register_indexer_get(|d: &mut DataProxy<T>, key: ImmutableString| d.get(key.as_str()));
}

/// Wraps native inputs into proxies and unwraps script results.
#[derive(Debug, Clone)]
pub struct Marshaler {
    ctx: Arc<ProxyContext>,
}

impl Marshaler {
    pub fn new(ctx: ProxyContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    pub fn context(&self) -> &ProxyContext {
        &self.ctx
    }

    /// Sequence proxy; shares the `Arc`s, never the entities themselves
    pub fn list<T: Send + Sync + 'static>(&self, items: Vec<Arc<T>>) -> Dynamic {
        Dynamic::from(ListProxy {
            items: Arc::from(items),
            ctx: Arc::clone(&self.ctx),
        })
    }

    pub fn map<T: Send + Sync + 'static>(&self, entries: HashMap<String, Arc<T>>) -> Dynamic {
        Dynamic::from(MapProxy {
            entries: Arc::new(entries),
            ctx: Arc::clone(&self.ctx),
        })
    }

    pub fn object<T: Send + Sync + 'static>(&self, object: Arc<T>) -> Dynamic {
        Dynamic::from(ObjectProxy {
            object,
            ctx: Arc::clone(&self.ctx),
        })
    }

    /// Recover the native entities of a script sequence.
    ///
    /// Accepts a script array of element proxies or an input sequence proxy
    /// returned unchanged.
    pub fn unmarshal_list<T: Send + Sync + 'static>(
        &self,
        value: Dynamic,
        member: &str,
    ) -> Result<Vec<Arc<T>>> {
        if value.is::<ListProxy<T>>() {
            return value
                .try_cast::<ListProxy<T>>()
                .map(|list| list.items.to_vec())
                .ok_or_else(|| FilterError::MalformedResult(format!("{} is not readable", member)));
        }

        let array = value.into_array().map_err(|type_name| {
            FilterError::MalformedResult(format!("{} is {}, expected an array", member, type_name))
        })?;

        array
            .into_iter()
            .enumerate()
            .map(|(i, element)| {
                let type_name = element.type_name();
                element
                    .try_cast::<ObjectProxy<T>>()
                    .map(ObjectProxy::into_inner)
                    .ok_or_else(|| {
                        FilterError::MalformedResult(format!(
                            "{}[{}] is {}, not an input {}",
                            member,
                            i,
                            type_name,
                            short_type_name::<T>()
                        ))
                    })
            })
            .collect()
    }

    /// Unwrap the `{ documents, linkInstances }` value returned by the script
    pub fn unmarshal_result(
        &self,
        value: Dynamic,
    ) -> Result<(Vec<Arc<Document>>, Vec<Arc<LinkInstance>>)> {
        let type_name = value.type_name();
        let mut map = value.try_cast::<Map>().ok_or_else(|| {
            FilterError::MalformedResult(format!("result is {}, expected an object map", type_name))
        })?;

        let documents = map
            .remove("documents")
            .ok_or_else(|| FilterError::MalformedResult("result lacks `documents`".to_string()))?;
        let links = map.remove("linkInstances").ok_or_else(|| {
            FilterError::MalformedResult("result lacks `linkInstances`".to_string())
        })?;

        Ok((
            self.unmarshal_list::<Document>(documents, "documents")?,
            self.unmarshal_list::<LinkInstance>(links, "linkInstances")?,
        ))
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docfilter_shared::Attribute;
    use rhai::Scope;
    use serde_json::json;

    fn collection() -> Arc<Collection> {
        Arc::new(Collection {
            id: "c1".to_string(),
            name: "Tasks".to_string(),
            attributes: vec![Attribute {
                id: "a1".to_string(),
                name: "Estimate".to_string(),
                constraint: Some(Constraint::Number { decimals: None }),
            }],
        })
    }

    fn marshaler(language: Language) -> Marshaler {
        Marshaler::new(ProxyContext::new(
            language,
            Arc::new(ConstraintData::default()),
            &[collection()],
            &[],
        ))
    }

    fn engine() -> Engine {
        let mut engine = Engine::new();
        register_types(&mut engine);
        engine
    }

    fn documents() -> Vec<Arc<Document>> {
        vec![
            Arc::new(Document::new("d1", "c1").with_value("a1", json!(1234.5))),
            Arc::new(Document::new("d2", "c1").with_value("a1", json!(7))),
        ]
    }

    #[test]
    fn test_list_proxy_len_and_index() {
        let engine = engine();
        let marshaler = marshaler(Language::En);
        let mut scope = Scope::new();
        scope.push("docs", marshaler.list(documents()));

        let len: INT = engine.eval_with_scope(&mut scope, "docs.len()").unwrap();
        assert_eq!(len, 2);
        let id: String = engine.eval_with_scope(&mut scope, "docs[1].id").unwrap();
        assert_eq!(id, "d2");
        let last: String = engine.eval_with_scope(&mut scope, "docs[-1].id").unwrap();
        assert_eq!(last, "d2");
        assert!(engine
            .eval_with_scope::<Dynamic>(&mut scope, "docs[5]")
            .is_err());
    }

    #[test]
    fn test_list_proxy_index_out_of_range() {
        let marshaler = marshaler(Language::En);
        let list = ListProxy {
            items: Arc::from(documents()),
            ctx: Arc::clone(&marshaler.ctx),
        };

        assert_eq!(list.get(-2).unwrap().object().id, "d1");
        for index in [2, -3, 1 << 32, (1 << 32) + 1, INT::MAX, INT::MIN] {
            assert!(list.get(index).is_err(), "index {}", index);
        }
    }

    #[test]
    fn test_list_proxy_iteration() {
        let engine = engine();
        let marshaler = marshaler(Language::En);
        let mut scope = Scope::new();
        scope.push("docs", marshaler.list(documents()));

        let ids: String = engine
            .eval_with_scope(
                &mut scope,
                r#"let out = ""; for d in docs { out += d.id; } out"#,
            )
            .unwrap();
        assert_eq!(ids, "d1d2");
    }

    #[test]
    fn test_unregistered_member_is_error() {
        let engine = engine();
        let marshaler = marshaler(Language::En);
        let mut scope = Scope::new();
        scope.push("docs", marshaler.list(documents()));

        assert!(engine
            .eval_with_scope::<Dynamic>(&mut scope, "docs[0].secret")
            .is_err());
    }

    #[test]
    fn test_map_proxy_lookup() {
        let engine = engine();
        let marshaler = marshaler(Language::En);
        let mut permissions = HashMap::new();
        permissions.insert("c1".to_string(), Arc::new(AllowedPermissions::read_own()));
        let mut scope = Scope::new();
        scope.push("perms", marshaler.map(permissions));

        assert!(engine
            .eval_with_scope::<bool>(&mut scope, r#"perms["c1"].read"#)
            .unwrap());
        assert!(!engine
            .eval_with_scope::<bool>(&mut scope, r#"perms["c1"].readAll"#)
            .unwrap());
        assert!(engine
            .eval_with_scope::<bool>(&mut scope, r#"perms["c2"] == ()"#)
            .unwrap());
        assert!(engine
            .eval_with_scope::<bool>(&mut scope, r#""c1" in perms"#)
            .unwrap());
    }

    #[test]
    fn test_data_proxy_raw_and_formatted() {
        let engine = engine();
        let mut scope = Scope::new();
        scope.push("en", marshaler(Language::En).list(documents()));
        scope.push("cs", marshaler(Language::Cs).list(documents()));

        let raw: f64 = engine
            .eval_with_scope(&mut scope, r#"en[0].data["a1"]"#)
            .unwrap();
        assert_eq!(raw, 1234.5);

        let en: String = engine
            .eval_with_scope(&mut scope, r#"en[0].formattedData["a1"]"#)
            .unwrap();
        let cs: String = engine
            .eval_with_scope(&mut scope, r#"cs[0].formattedData["a1"]"#)
            .unwrap();
        assert_eq!(en, "1,234.5");
        assert_eq!(cs, "1\u{a0}234,5");

        assert!(engine
            .eval_with_scope::<bool>(&mut scope, r#"en[0].data["zz"] == ()"#)
            .unwrap());
    }

    #[test]
    fn test_constraints_separate_collections_and_link_types() {
        let link_type = Arc::new(LinkType {
            id: "c1".to_string(),
            name: "Shares an id with the collection".to_string(),
            collection_ids: ("c1".to_string(), "c1".to_string()),
            attributes: vec![Attribute {
                id: "a1".to_string(),
                name: "Weight".to_string(),
                constraint: Some(Constraint::Percentage { decimals: None }),
            }],
        });
        let ctx = ProxyContext::new(
            Language::En,
            Arc::new(ConstraintData::default()),
            &[collection()],
            &[link_type],
        );

        assert_eq!(
            ctx.constraint(SchemaKind::Collection, "c1", "a1"),
            Some(&Constraint::Number { decimals: None })
        );
        assert_eq!(
            ctx.constraint(SchemaKind::LinkType, "c1", "a1"),
            Some(&Constraint::Percentage { decimals: None })
        );

        let engine = engine();
        let marshaler = Marshaler { ctx: Arc::new(ctx) };
        let mut link = LinkInstance::new("l1", "c1", ("d1", "d2"));
        link.data.insert("a1".to_string(), json!(0.5));
        let mut scope = Scope::new();
        scope.push("docs", marshaler.list(documents()));
        scope.push("links", marshaler.list(vec![Arc::new(link)]));

        let document: String = engine
            .eval_with_scope(&mut scope, r#"docs[0].formattedData["a1"]"#)
            .unwrap();
        let link: String = engine
            .eval_with_scope(&mut scope, r#"links[0].formattedData["a1"]"#)
            .unwrap();
        assert_eq!(document, "1,234.5");
        assert_eq!(link, "50%");
    }

    #[test]
    fn test_query_members() {
        let engine = engine();
        let marshaler = marshaler(Language::En);
        let mut query = Query::for_collections(["c1"]);
        query.page_size = Some(20);
        let mut scope = Scope::new();
        scope.push("query", marshaler.object(Arc::new(query)));

        assert!(engine
            .eval_with_scope::<bool>(&mut scope, r#""c1" in query.collectionIds"#)
            .unwrap());
        let page_size: INT = engine.eval_with_scope(&mut scope, "query.pageSize").unwrap();
        assert_eq!(page_size, 20);
        assert!(engine
            .eval_with_scope::<bool>(&mut scope, "query.fulltext == ()")
            .unwrap());
    }

    #[test]
    fn test_unmarshal_preserves_identity() {
        let engine = engine();
        let marshaler = marshaler(Language::En);
        let docs = documents();
        let mut scope = Scope::new();
        scope.push("docs", marshaler.list(docs.clone()));

        let result: Dynamic = engine
            .eval_with_scope(&mut scope, "#{ documents: [docs[1]], linkInstances: [] }")
            .unwrap();
        let (out_docs, out_links) = marshaler.unmarshal_result(result).unwrap();
        assert_eq!(out_docs.len(), 1);
        assert!(Arc::ptr_eq(&out_docs[0], &docs[1]));
        assert!(out_links.is_empty());
    }

    #[test]
    fn test_unmarshal_list_proxy_returned_unchanged() {
        let marshaler = marshaler(Language::En);
        let docs = documents();
        let value = marshaler.list(docs.clone());
        let out = marshaler.unmarshal_list::<Document>(value, "documents").unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().zip(&docs).all(|(a, b)| Arc::ptr_eq(a, b)));
    }

    #[test]
    fn test_unmarshal_rejects_foreign_elements() {
        let marshaler = marshaler(Language::En);
        let value = Dynamic::from_array(vec![Dynamic::from(1 as INT)]);
        assert!(matches!(
            marshaler.unmarshal_list::<Document>(value, "documents"),
            Err(FilterError::MalformedResult(_))
        ));

        let link_as_doc = marshaler.object(Arc::new(LinkInstance::new("l1", "lt1", ("d1", "d2"))));
        let value = Dynamic::from_array(vec![link_as_doc]);
        assert!(matches!(
            marshaler.unmarshal_list::<Document>(value, "documents"),
            Err(FilterError::MalformedResult(_))
        ));
    }

    #[test]
    fn test_unmarshal_rejects_missing_members() {
        let marshaler = marshaler(Language::En);
        let mut map = Map::new();
        map.insert("documents".into(), Dynamic::from_array(vec![]));
        assert!(matches!(
            marshaler.unmarshal_result(Dynamic::from_map(map)),
            Err(FilterError::MalformedResult(ref msg)) if msg.contains("linkInstances")
        ));
        assert!(matches!(
            marshaler.unmarshal_result(Dynamic::UNIT),
            Err(FilterError::MalformedResult(_))
        ));
    }
}
