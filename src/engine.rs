//! Record hash assembly and the collection entry point.
//!
//! One record is assembled in a fixed order:
//!
//! ```text
//! id -> attributes (fieldset) -> relationships (fieldset, recursive) -> _links
//! ```
//!
//! When the descriptor carries a cache, everything is wrapped in a single
//! read-through fetch keyed by `"<serializer>:<id>"` with the fieldset, nest
//! level and link flags folded into the namespace.

use crate::attribute::Attribute;
use crate::cache::CacheVariant;
use crate::descriptor::SerializerDescriptor;
use crate::error::{Result, SerializeError};
use crate::fieldset::{self, Fieldset};
use crate::link::LinkScope;
use crate::options::SerializeOptions;
use crate::registry::SerializerRegistry;
use crate::resource::{Params, Resource, Subject};
use serde_json::{Map, Value};
use std::borrow::Cow;
use tracing::debug_span;

/// State threaded through one serialization call.
pub(crate) struct SerializationContext<'a> {
    pub registry: &'a SerializerRegistry,
    pub params: Cow<'a, Params>,
    /// 1 for the records handed to the entry point, +1 per relationship hop.
    pub nest_level: u32,
    pub no_links: bool,
    pub no_auto_links: bool,
}

impl<'a> SerializationContext<'a> {
    pub fn new(registry: &'a SerializerRegistry, options: &'a SerializeOptions) -> Self {
        Self {
            registry,
            params: Cow::Borrowed(&options.params),
            nest_level: options.nest_level.unwrap_or(1).max(1),
            no_links: options.no_links,
            no_auto_links: options.no_auto_links,
        }
    }

    pub fn max_nest_level(&self) -> u32 {
        self.registry.config().max_nest_level
    }

    /// Context for the records one relationship hop below.
    pub fn descend(&self) -> SerializationContext<'_> {
        SerializationContext {
            registry: self.registry,
            params: Cow::Borrowed(self.params.as_ref()),
            nest_level: self.nest_level + 1,
            no_links: self.no_links,
            no_auto_links: self.no_auto_links,
        }
    }

    /// Same level, with `system_type` forced in the params.
    fn with_system_type(&self, system_type: &str) -> SerializationContext<'_> {
        let mut params = self.params.as_ref().clone();
        params.insert("system_type".to_string(), Value::String(system_type.to_string()));
        SerializationContext {
            registry: self.registry,
            params: Cow::Owned(params),
            nest_level: self.nest_level,
            no_links: self.no_links,
            no_auto_links: self.no_auto_links,
        }
    }
}

impl SerializerDescriptor {
    /// Hash for one record, through the cache when one is configured.
    pub(crate) fn record_hash(
        &self,
        record: &dyn Resource,
        fields: Option<&Fieldset>,
        ctx: &SerializationContext<'_>,
    ) -> Result<Value> {
        let scoped;
        let ctx = match &self.system_type {
            Some(system_type) => {
                scoped = ctx.with_system_type(system_type);
                &scoped
            }
            None => ctx,
        };

        let variant = CacheVariant::at_level(ctx.nest_level)
            .no_links(ctx.no_links)
            .no_auto_links(ctx.no_auto_links);
        let (Some(cache), Some(options)) = (
            &self.cache,
            self.record_cache_options(fields, &variant, ctx.registry.config()),
        ) else {
            return self.build_record_hash(record, fields, ctx);
        };

        let key = self.record_cache_key(record, &ctx.params)?;
        cache
            .store
            .fetch(&key, &options, &mut || self.build_record_hash(record, fields, ctx))
    }

    fn build_record_hash(
        &self,
        record: &dyn Resource,
        fields: Option<&Fieldset>,
        ctx: &SerializationContext<'_>,
    ) -> Result<Value> {
        let mut hash = Map::new();
        hash.insert("id".to_string(), self.id_from_record(record, &ctx.params)?);

        for attribute in fieldset::select(&self.attributes, fields, Attribute::key) {
            attribute.serialize(&self.name, record, &ctx.params, &mut hash)?;
        }

        for relationship in fieldset::trim_relationships(&self.relationships, fields) {
            relationship.serialize(&self.name, record, fields, ctx, &mut hash)?;
        }

        if !self.links.is_empty() && !ctx.no_links {
            hash.insert("_links".to_string(), self.links_value(record, ctx)?);
        }

        Ok(Value::Object(hash))
    }

    fn links_value(&self, record: &dyn Resource, ctx: &SerializationContext<'_>) -> Result<Value> {
        let scope = LinkScope {
            serializer: &self.name,
            api_namespace: &self.api_namespace,
            routes: ctx.registry.routes(),
            params: &ctx.params,
        };

        let mut entries = Vec::with_capacity(self.links.len());
        for link in &self.links {
            // Tolerant links are the automatic ones.
            if ctx.no_auto_links && link.is_tolerant() {
                continue;
            }
            if let Some(entry) = link.serialize(record, &scope)? {
                entries.push(serde_json::to_value(entry)?);
            }
        }
        Ok(Value::Array(entries))
    }
}

/// Serialize a subject: a mapping for one record, a list for a collection,
/// `{}` for nothing.
pub(crate) fn serializable_hash(
    registry: &SerializerRegistry,
    descriptor: &SerializerDescriptor,
    subject: &Subject,
    options: &SerializeOptions,
) -> Result<Value> {
    let span = debug_span!("serializable_hash", serializer = %descriptor.name());
    let _enter = span.enter();

    let ctx = SerializationContext::new(registry, options);
    let fields = options.fields.as_ref();
    let is_collection = subject.is_collection(options.is_collection);

    match subject {
        Subject::Empty => Ok(Value::Object(Map::new())),
        Subject::Many(_) if !is_collection => Err(SerializeError::InvalidConfiguration(
            "is_collection is false but a collection was given".to_string(),
        )),
        Subject::Many(records) => records
            .iter()
            .map(|record| descriptor.record_hash(record.as_ref(), fields, &ctx))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Subject::One(record) if is_collection => Ok(Value::Array(vec![
            descriptor.record_hash(record.as_ref(), fields, &ctx)?,
        ])),
        Subject::One(record) => descriptor.record_hash(record.as_ref(), fields, &ctx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DescriptorBuilder;
    use crate::link::Link;
    use crate::resource::{Related, ResourceRef};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    struct Movie;

    impl Resource for Movie {
        fn type_name(&self) -> &str {
            "Movie"
        }
        fn attribute(&self, name: &str) -> Option<Value> {
            match name {
                "id" => Some(json!("m1")),
                "name" => Some(json!("Inception")),
                "year" => Some(json!(2010)),
                "url" => Some(json!("http://movies.com/m1")),
                _ => None,
            }
        }
        fn relation(&self, _name: &str) -> Option<Related> {
            None
        }
    }

    fn movie_descriptor() -> SerializerDescriptor {
        DescriptorBuilder::new("movie")
            .attributes(["name", "year"])
            .link(Link::new("self", "url"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_fixed_key_order() {
        let registry = SerializerRegistry::new();
        let subject = Subject::One(Arc::new(Movie));
        let hash = serializable_hash(
            &registry,
            &movie_descriptor(),
            &subject,
            &SerializeOptions::default(),
        )
        .unwrap();

        let keys: Vec<_> = hash.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["id", "name", "year", "_links"]);
    }

    #[test]
    fn test_empty_subject_is_empty_mapping() {
        let registry = SerializerRegistry::new();
        let hash = serializable_hash(
            &registry,
            &movie_descriptor(),
            &Subject::Empty,
            &SerializeOptions::default(),
        )
        .unwrap();
        assert_eq!(hash, json!({}));
    }

    #[test]
    fn test_forced_collection_wraps_single_record() {
        let registry = SerializerRegistry::new();
        let options = SerializeOptions::default().collection(true).no_links();
        let hash = serializable_hash(
            &registry,
            &movie_descriptor(),
            &Subject::One(Arc::new(Movie)),
            &options,
        )
        .unwrap();
        assert_eq!(hash, json!([{"id": "m1", "name": "Inception", "year": 2010}]));
    }

    #[test]
    fn test_forced_single_on_collection_is_rejected() {
        let registry = SerializerRegistry::new();
        let records: Vec<ResourceRef> = vec![Arc::new(Movie)];
        let err = serializable_hash(
            &registry,
            &movie_descriptor(),
            &Subject::Many(records),
            &SerializeOptions::default().collection(false),
        )
        .unwrap_err();
        assert_eq!(err.code(), "INVALID_CONFIGURATION");
    }

    #[test]
    fn test_system_type_overlays_params() {
        let registry = SerializerRegistry::new();
        let descriptor = DescriptorBuilder::new("movie")
            .system_type("catalog")
            .build()
            .unwrap();
        let options = SerializeOptions::default().param("system_type", json!("other"));
        let hash = serializable_hash(
            &registry,
            &descriptor,
            &Subject::One(Arc::new(Movie)),
            &options,
        )
        .unwrap();
        assert_eq!(hash["_links"][0]["system"], json!("catalog"));
    }

    #[test]
    fn test_descend_increments_level() {
        let registry = SerializerRegistry::new();
        let options = SerializeOptions::default();
        let ctx = SerializationContext::new(&registry, &options);
        assert_eq!(ctx.nest_level, 1);
        assert_eq!(ctx.descend().descend().nest_level, 3);
    }
}
