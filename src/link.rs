//! Link assembly.
//!
//! Every link entry serializes as:
//!
//! ```text
//! { "rel": "self", "system": "", "type": "GET", "href": "/movies/m1" }
//! ```
//!
//! Href resolution failures come in two kinds (see [`HrefError`]). A link
//! marked tolerant drops itself on `Missing` and emits the
//! [`UNRESOLVABLE`] sentinel on `NoContext`; any other link propagates the
//! failure as a fatal error.

use crate::attribute::Condition;
use crate::error::{HrefError, Result, SerializeError};
use crate::resource::{interpolate, Params, Resource};
use crate::transform::{Inflector, KeyTransform};
use heck::ToSnakeCase;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Relation label of the canonical resource-identity link.
pub const SELF_REL: &str = "self";

/// Href emitted by a tolerant link when no resolution context exists.
pub const UNRESOLVABLE: &str = "unresolvable";

/// Default verb label.
pub const DEFAULT_LINK_TYPE: &str = "GET";

/// Callback producing an href from `(record, params)`.
pub type HrefFn = Arc<dyn Fn(&dyn Resource, &Params) -> std::result::Result<String, HrefError> + Send + Sync>;

/// Resolves paths for concrete records.
pub trait RouteResolver: Send + Sync {
    /// Path for `record` under the given api namespace segments.
    fn path_for(
        &self,
        api_namespace: &[String],
        record: &dyn Resource,
    ) -> std::result::Result<String, HrefError>;
}

/// Conventional `/<namespace>/<plural snake type>/<id>` routes.
#[derive(Debug, Clone, Default)]
pub struct ConventionalRoutes {
    inflector: Inflector,
}

impl ConventionalRoutes {
    /// Routes using the given inflection rules.
    pub fn new(inflector: Inflector) -> Self {
        Self { inflector }
    }
}

impl RouteResolver for ConventionalRoutes {
    fn path_for(
        &self,
        api_namespace: &[String],
        record: &dyn Resource,
    ) -> std::result::Result<String, HrefError> {
        let id = record
            .id()
            .filter(|id| !id.is_null())
            .ok_or_else(|| HrefError::Missing("id".to_string()))?;
        let collection = (self.inflector.pluralize)(&record.type_name().to_snake_case());
        Ok(format!(
            "{}/{}/{}",
            namespace_prefix(api_namespace),
            collection,
            interpolate(&id)
        ))
    }
}

/// One serialized link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEntry {
    /// Relation label.
    pub rel: String,
    /// System label.
    pub system: String,
    /// Verb label.
    #[serde(rename = "type")]
    pub method: String,
    /// Resolved href.
    pub href: String,
}

/// How a link finds its href.
#[derive(Clone)]
pub enum HrefSource {
    /// Read through a named record accessor.
    Accessor(String),
    /// Computed by a callback.
    Callback(HrefFn),
    /// Ask the registry's [`RouteResolver`] for the record's own path.
    Route,
}

impl fmt::Debug for HrefSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accessor(name) => write!(f, "HrefSource::Accessor({name})"),
            Self::Callback(_) => write!(f, "HrefSource::Callback"),
            Self::Route => write!(f, "HrefSource::Route"),
        }
    }
}

/// What a link needs from its surroundings at call time.
pub(crate) struct LinkScope<'a> {
    pub serializer: &'a str,
    pub api_namespace: &'a [String],
    pub routes: Option<&'a dyn RouteResolver>,
    pub params: &'a Params,
}

/// A declared link.
#[derive(Clone)]
pub struct Link {
    pub(crate) rel: String,
    pub(crate) system: Option<String>,
    pub(crate) method: String,
    pub(crate) href: HrefSource,
    pub(crate) tolerant: bool,
    pub(crate) condition: Option<Condition>,
}

impl Link {
    /// Link whose href is read from a record accessor.
    pub fn new(rel: impl Into<String>, accessor: impl Into<String>) -> Self {
        Self::with_source(rel, HrefSource::Accessor(accessor.into()))
    }

    /// Link whose href is computed by a callback.
    pub fn computed<F>(rel: impl Into<String>, f: F) -> Self
    where
        F: Fn(&dyn Resource, &Params) -> std::result::Result<String, HrefError>
            + Send
            + Sync
            + 'static,
    {
        Self::with_source(rel, HrefSource::Callback(Arc::new(f)))
    }

    /// Link with an explicit href source.
    pub fn with_source(rel: impl Into<String>, href: HrefSource) -> Self {
        Self {
            rel: rel.into(),
            system: None,
            method: DEFAULT_LINK_TYPE.to_string(),
            href,
            tolerant: false,
            condition: None,
        }
    }

    /// The self link every descriptor starts with: routed, and tolerant of
    /// resolution failures.
    pub fn auto_self() -> Self {
        Self::with_source(SELF_REL, HrefSource::Route).tolerant()
    }

    /// System label.
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Verb label.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Suppress or substitute on resolution failure. Only honoured on the
    /// `self` relation.
    pub fn tolerant(mut self) -> Self {
        self.tolerant = self.rel == SELF_REL;
        self
    }

    /// Emit only when the predicate holds.
    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&dyn Resource, &Params) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(predicate));
        self
    }

    /// Relation label.
    pub fn rel(&self) -> &str {
        &self.rel
    }

    /// True for the canonical self relation.
    pub fn is_self(&self) -> bool {
        self.rel == SELF_REL
    }

    /// True if resolution failures are absorbed.
    pub fn is_tolerant(&self) -> bool {
        self.tolerant
    }

    pub(crate) fn transform_rel(&mut self, transform: KeyTransform) {
        if !self.is_self() {
            self.rel = transform.apply(&self.rel);
        }
    }

    /// Resolve into an entry. `Ok(None)` means the link is skipped.
    pub(crate) fn serialize(
        &self,
        record: &dyn Resource,
        scope: &LinkScope<'_>,
    ) -> Result<Option<LinkEntry>> {
        if let Some(condition) = &self.condition {
            if !condition(record, scope.params) {
                return Ok(None);
            }
        }

        let href = match self.resolve_href(record, scope) {
            Ok(href) => href,
            Err(HrefError::Missing(_)) if self.tolerant => return Ok(None),
            Err(HrefError::NoContext(_)) if self.tolerant => UNRESOLVABLE.to_string(),
            Err(source) => {
                return Err(SerializeError::LinkResolution {
                    serializer: scope.serializer.to_string(),
                    rel: self.rel.clone(),
                    source,
                })
            }
        };

        Ok(Some(LinkEntry {
            rel: self.rel.clone(),
            system: self
                .system
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| system_type(scope.params)),
            method: self.method.clone(),
            href,
        }))
    }

    fn resolve_href(
        &self,
        record: &dyn Resource,
        scope: &LinkScope<'_>,
    ) -> std::result::Result<String, HrefError> {
        match &self.href {
            HrefSource::Accessor(name) => record
                .attribute(name)
                .map(|value| interpolate(&value))
                .ok_or_else(|| HrefError::Missing(name.clone())),
            HrefSource::Callback(f) => f(record, scope.params),
            HrefSource::Route => match scope.routes {
                Some(routes) => routes.path_for(scope.api_namespace, record),
                None => Err(HrefError::NoContext("no route resolver configured".to_string())),
            },
        }
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("rel", &self.rel)
            .field("system", &self.system)
            .field("method", &self.method)
            .field("href", &self.href)
            .field("tolerant", &self.tolerant)
            .finish()
    }
}

/// Synthesize a self link from an id and type alone, without the related
/// record.
pub fn stub_self(
    id: &str,
    record_type: &str,
    api_namespace: &[String],
    params: &Params,
    inflector: &Inflector,
) -> LinkEntry {
    LinkEntry {
        rel: SELF_REL.to_string(),
        system: system_type(params),
        method: DEFAULT_LINK_TYPE.to_string(),
        href: format!(
            "{}/{}/{}",
            namespace_prefix(api_namespace),
            (inflector.pluralize)(record_type),
            id
        ),
    }
}

/// Self link for a related record that is actually in hand. Falls back to
/// [`UNRESOLVABLE`] when the route cannot be resolved.
pub fn route_self(
    record: &dyn Resource,
    record_type: &str,
    api_namespace: &[String],
    routes: Option<&dyn RouteResolver>,
) -> LinkEntry {
    let href = routes
        .and_then(|routes| routes.path_for(api_namespace, record).ok())
        .unwrap_or_else(|| UNRESOLVABLE.to_string());
    LinkEntry {
        rel: SELF_REL.to_string(),
        system: record_type.to_string(),
        method: DEFAULT_LINK_TYPE.to_string(),
        href,
    }
}

fn namespace_prefix(api_namespace: &[String]) -> String {
    api_namespace.iter().map(|segment| format!("/{segment}")).collect()
}

fn system_type(params: &Params) -> String {
    params
        .get("system_type")
        .map(interpolate)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Related;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    struct Actor;

    impl Resource for Actor {
        fn type_name(&self) -> &str {
            "Actor"
        }
        fn attribute(&self, name: &str) -> Option<Value> {
            match name {
                "id" => Some(json!("a1")),
                "bio_link" => Some(json!("https://www.imdb.com/name/nm0000098/")),
                _ => None,
            }
        }
        fn relation(&self, _name: &str) -> Option<Related> {
            None
        }
    }

    fn scope<'a>(params: &'a Params, routes: Option<&'a dyn RouteResolver>) -> LinkScope<'a> {
        LinkScope {
            serializer: "actor",
            api_namespace: &[],
            routes,
            params,
        }
    }

    #[test]
    fn test_accessor_link() {
        let params = Params::new();
        let entry = Link::new("bio", "bio_link")
            .system("IMDB")
            .serialize(&Actor, &scope(&params, None))
            .unwrap()
            .unwrap();
        assert_eq!(
            entry,
            LinkEntry {
                rel: "bio".into(),
                system: "IMDB".into(),
                method: "GET".into(),
                href: "https://www.imdb.com/name/nm0000098/".into(),
            }
        );
    }

    #[test]
    fn test_system_falls_back_to_params() {
        let mut params = Params::new();
        params.insert("system_type".into(), json!("catalog"));
        let entry = Link::new("bio", "bio_link")
            .serialize(&Actor, &scope(&params, None))
            .unwrap()
            .unwrap();
        assert_eq!(entry.system, "catalog");
    }

    #[test]
    fn test_strict_missing_capability_is_fatal() {
        let params = Params::new();
        let err = Link::new(SELF_REL, "some_bad_method")
            .serialize(&Actor, &scope(&params, None))
            .unwrap_err();
        assert!(matches!(
            err,
            SerializeError::LinkResolution {
                source: HrefError::Missing(_),
                ..
            }
        ));
    }

    #[test]
    fn test_tolerant_missing_capability_drops_link() {
        let params = Params::new();
        let entry = Link::new(SELF_REL, "some_bad_method")
            .tolerant()
            .serialize(&Actor, &scope(&params, None))
            .unwrap();
        assert!(entry.is_none());
    }

    #[test]
    fn test_tolerant_without_context_is_unresolvable() {
        let params = Params::new();
        let entry = Link::auto_self()
            .serialize(&Actor, &scope(&params, None))
            .unwrap()
            .unwrap();
        assert_eq!(entry.href, UNRESOLVABLE);
    }

    #[test]
    fn test_tolerance_only_applies_to_self() {
        assert!(!Link::new("bio", "bio_link").tolerant().is_tolerant());
        assert!(Link::auto_self().is_tolerant());
    }

    #[test]
    fn test_routed_self_link() {
        let params = Params::new();
        let routes = ConventionalRoutes::default();
        let entry = Link::auto_self()
            .serialize(&Actor, &scope(&params, Some(&routes)))
            .unwrap()
            .unwrap();
        assert_eq!(entry.href, "/actors/a1");
    }

    #[test]
    fn test_callback_link() {
        let params = Params::new();
        let entry = Link::computed("hair_salon_discount", |record, _| {
            Ok(format!(
                "www.somesalon.com/{}",
                interpolate(&record.id().unwrap_or(Value::Null))
            ))
        })
        .serialize(&Actor, &scope(&params, None))
        .unwrap()
        .unwrap();
        assert_eq!(entry.href, "www.somesalon.com/a1");
    }

    #[test]
    fn test_stub_self_with_namespace() {
        let entry = stub_self(
            "u1",
            "user",
            &["api".to_string()],
            &Params::new(),
            &Inflector::default(),
        );
        assert_eq!(entry.href, "/api/users/u1");
        assert_eq!(entry.rel, "self");
        assert_eq!(entry.method, "GET");
    }

    #[test]
    fn test_route_self_without_resolver() {
        let entry = route_self(&Actor, "Actor", &[], None);
        assert_eq!(entry.href, UNRESOLVABLE);
        assert_eq!(entry.system, "Actor");
    }

    #[test]
    fn test_link_entry_wire_shape() {
        let entry = stub_self("1", "movie", &[], &Params::new(), &Inflector::default());
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({"rel": "self", "system": "", "type": "GET", "href": "/movies/1"})
        );
    }
}
