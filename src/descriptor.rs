//! Per-type schema descriptors and their builder.
//!
//! A [`SerializerDescriptor`] is immutable once built and is shared across
//! concurrent serialization calls. All key transforms are applied by
//! [`DescriptorBuilder::build`]; nothing is re-cased per call.

use crate::attribute::{Accessor, Attribute};
use crate::cache::{self, CacheOptions, CacheStore, CacheVariant};
use crate::config::EngineConfig;
use crate::error::{Result, SerializeError};
use crate::fieldset::{self, Fieldset};
use crate::link::Link;
use crate::relationship::{Relationship, Target};
use crate::resource::{stringify_id, Params, Resource};
use crate::transform::KeyTransform;
use heck::ToSnakeCase;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Cache collaborator attached to a descriptor.
#[derive(Clone)]
pub struct DescriptorCache {
    pub(crate) store: Arc<dyn CacheStore>,
    pub(crate) options: CacheOptions,
}

impl DescriptorCache {
    /// Store handle.
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Base options, before fieldset augmentation.
    pub fn options(&self) -> &CacheOptions {
        &self.options
    }
}

impl fmt::Debug for DescriptorCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorCache")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Immutable per-type schema.
#[derive(Clone, Debug)]
pub struct SerializerDescriptor {
    pub(crate) name: String,
    pub(crate) record_type: String,
    pub(crate) id: Option<Accessor>,
    pub(crate) attributes: Vec<Attribute>,
    pub(crate) relationships: Vec<Relationship>,
    pub(crate) links: Vec<Link>,
    pub(crate) cache: Option<DescriptorCache>,
    pub(crate) transform: KeyTransform,
    pub(crate) system_type: Option<String>,
    pub(crate) api_namespace: Vec<String>,
}

impl SerializerDescriptor {
    /// Start building a descriptor.
    pub fn builder(name: impl Into<String>) -> DescriptorBuilder {
        DescriptorBuilder::new(name)
    }

    /// Registered name; also the cache key prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Output type name (key-transformed).
    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    /// Declared attributes, in declaration order.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Declared relationships, in declaration order.
    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    /// Declared links; at most one has rel `self`.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn key_transform(&self) -> KeyTransform {
        self.transform
    }

    pub fn system_type(&self) -> Option<&str> {
        self.system_type.as_deref()
    }

    pub fn api_namespace(&self) -> &[String] {
        &self.api_namespace
    }

    pub fn cache(&self) -> Option<&DescriptorCache> {
        self.cache.as_ref()
    }

    /// Cache key for `record`: `"<name>:<id>"`.
    pub fn record_cache_key(&self, record: &dyn Resource, params: &Params) -> Result<String> {
        let id = self.id_from_record(record, params)?;
        Ok(cache::record_cache_key(&self.name, &id))
    }

    /// Cache options for a record rendered with `fields` under `variant`, or
    /// `None` when the descriptor is not cached.
    ///
    /// The nest level is ignored when `fields` leaves no relationship to
    /// render.
    pub fn record_cache_options(
        &self,
        fields: Option<&Fieldset>,
        variant: &CacheVariant,
        config: &EngineConfig,
    ) -> Option<CacheOptions> {
        let mut variant = *variant;
        if fieldset::trim_relationships(&self.relationships, fields).is_empty() {
            variant.nest_level = 1;
        }
        self.cache.as_ref().map(|cache| {
            cache::record_cache_options(
                &cache.options,
                fields,
                &variant,
                &config.default_cache_namespace,
            )
        })
    }

    /// Resolve and stringify the record id.
    pub(crate) fn id_from_record(&self, record: &dyn Resource, params: &Params) -> Result<Value> {
        let id = match &self.id {
            Some(accessor) => accessor.resolve(record, params),
            None => record.id(),
        };
        id.map(stringify_id)
            .ok_or_else(|| SerializeError::MandatoryField {
                serializer: self.name.clone(),
                record_type: record.type_name().to_string(),
            })
    }
}

/// Builder for [`SerializerDescriptor`].
#[derive(Clone, Debug)]
pub struct DescriptorBuilder {
    descriptor: SerializerDescriptor,
}

impl DescriptorBuilder {
    /// New descriptor with an automatic tolerant `self` link.
    ///
    /// The record type defaults to the snake-cased name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            descriptor: SerializerDescriptor {
                record_type: name.to_snake_case(),
                name,
                id: None,
                attributes: Vec::new(),
                relationships: Vec::new(),
                links: vec![Link::auto_self()],
                cache: None,
                transform: KeyTransform::None,
                system_type: None,
                api_namespace: Vec::new(),
            },
        }
    }

    /// Derive from `parent`: every table is copied and independent afterwards.
    ///
    /// The record type is derived from the new name, as for [`Self::new`].
    pub fn extend(parent: &SerializerDescriptor, name: impl Into<String>) -> Self {
        let mut descriptor = parent.clone();
        descriptor.name = name.into();
        descriptor.record_type = descriptor.name.to_snake_case();
        Self { descriptor }
    }

    pub fn record_type(mut self, record_type: impl Into<String>) -> Self {
        self.descriptor.record_type = record_type.into();
        self
    }

    pub fn key_transform(mut self, transform: KeyTransform) -> Self {
        self.descriptor.transform = transform;
        self
    }

    /// Read the id through a differently named accessor.
    pub fn id(mut self, accessor: impl Into<String>) -> Self {
        self.descriptor.id = Some(Accessor::Named(accessor.into()));
        self
    }

    /// Compute the id with a callback.
    pub fn id_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&dyn Resource, &Params) -> Value + Send + Sync + 'static,
    {
        self.descriptor.id = Some(Accessor::callback(f));
        self
    }

    pub fn system_type(mut self, system_type: impl Into<String>) -> Self {
        self.descriptor.system_type = Some(system_type.into());
        self
    }

    pub fn api_namespace<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.descriptor.api_namespace = segments.into_iter().map(Into::into).collect();
        self
    }

    /// Declare plain attributes read from same-named accessors.
    pub fn attributes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self = self.attribute(Attribute::new(name));
        }
        self
    }

    /// Declare an attribute. A later declaration with the same key replaces
    /// the earlier one in place.
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        let attributes = &mut self.descriptor.attributes;
        match attributes.iter_mut().find(|a| a.key == attribute.key) {
            Some(existing) => *existing = attribute,
            None => attributes.push(attribute),
        }
        self
    }

    /// Declare a relationship. Same-name redeclarations replace in place.
    pub fn relationship(mut self, relationship: Relationship) -> Self {
        let relationships = &mut self.descriptor.relationships;
        match relationships.iter_mut().find(|r| r.name == relationship.name) {
            Some(existing) => *existing = relationship,
            None => relationships.push(relationship),
        }
        self
    }

    /// Declare a link. A `self` link replaces any existing one in place.
    pub fn link(mut self, link: Link) -> Self {
        let links = &mut self.descriptor.links;
        match links.iter_mut().find(|l| link.is_self() && l.is_self()) {
            Some(existing) => *existing = link,
            None => links.push(link),
        }
        self
    }

    /// Drop the automatic `self` link (and any `self` link declared so far).
    pub fn without_auto_self_link(mut self) -> Self {
        self.descriptor.links.retain(|l| !l.is_self());
        self
    }

    /// Wrap every record hash in a read-through cache.
    pub fn cache(mut self, store: Arc<dyn CacheStore>, options: CacheOptions) -> Self {
        self.descriptor.cache = Some(DescriptorCache { store, options });
        self
    }

    /// Validate and finalize.
    pub fn build(self) -> Result<SerializerDescriptor> {
        let mut descriptor = self.descriptor;
        let transform = descriptor.transform;

        if descriptor.name.trim().is_empty() {
            return Err(SerializeError::InvalidConfiguration(
                "serializer name must not be empty".to_string(),
            ));
        }
        if let Some(link) = descriptor.links.iter().find(|l| l.rel.is_empty()) {
            return Err(SerializeError::InvalidConfiguration(format!(
                "serializer '{}' declares a link without a rel: {link:?}",
                descriptor.name
            )));
        }
        for relationship in &descriptor.relationships {
            if let Target::Named(name) = &relationship.target {
                if name.is_empty() {
                    return Err(SerializeError::InvalidConfiguration(format!(
                        "serializer '{}' names an empty serializer for '{}'",
                        descriptor.name, relationship.name
                    )));
                }
            }
        }

        descriptor.record_type = transform.apply(&descriptor.record_type);
        for attribute in &mut descriptor.attributes {
            attribute.key = transform.apply(&attribute.key);
        }
        for relationship in &mut descriptor.relationships {
            relationship.finalize(transform);
        }
        for link in &mut descriptor.links {
            link.transform_rel(transform);
        }

        Ok(descriptor)
    }
}
