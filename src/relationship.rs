//! Relationship resolution.
//!
//! A relationship is rendered in one of three tiers depending on how deep the
//! owning record sits (N = `EngineConfig::max_nest_level`):
//!
//! ```text
//! nest level <= N      full embed when a serializer resolves, else id-stubs
//! nest level == N + 1  id-stubs only
//! nest level >  N + 1  key present, [] (many) or null (one)
//! ```
//!
//! Id-stub shapes:
//!
//! ```text
//! {id}                              no type determinable, or links suppressed
//! {id, _links: [self]}              self link synthesized from id + type
//! {id, type, _links: [self]}        polymorphic: related record in hand
//! ```

use crate::attribute::Condition;
use crate::descriptor::SerializerDescriptor;
use crate::engine::SerializationContext;
use crate::error::{Result, SerializeError};
use crate::fieldset::{self, Fieldset};
use crate::link::{route_self, stub_self};
use crate::resource::{stringify_id, Params, Related, Resource};
use crate::transform::KeyTransform;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Accessor used when no custom id accessor is configured.
pub const DEFAULT_ID_ACCESSOR: &str = "id";

/// Callback producing the related record(s) from `(record, params)`.
pub type RelatedFn = Arc<dyn Fn(&dyn Resource, &Params) -> Related + Send + Sync>;

/// Callback choosing a serializer for one related record.
pub type SerializerFn =
    Arc<dyn Fn(&dyn Resource, &Params) -> Option<Arc<SerializerDescriptor>> + Send + Sync>;

/// How many records a relationship yields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// `has_one` / `belongs_to`
    One,
    /// `has_many`
    Many,
}

/// How the serializer of related records is found.
#[derive(Clone)]
pub enum Target {
    /// Registry lookup by relation name (singularized for `Many`); falls back
    /// to id-stubs when nothing is registered under that name.
    Inferred,
    /// Registry lookup by explicit name; unresolvable names are fatal.
    Named(String),
    /// A descriptor fixed at build time.
    Descriptor(Arc<SerializerDescriptor>),
    /// Chosen per related record.
    Dynamic(SerializerFn),
    /// Never embed, always id-stubs.
    IdOnly,
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inferred => write!(f, "Target::Inferred"),
            Self::Named(name) => write!(f, "Target::Named({name})"),
            Self::Descriptor(d) => write!(f, "Target::Descriptor({})", d.name()),
            Self::Dynamic(_) => write!(f, "Target::Dynamic"),
            Self::IdOnly => write!(f, "Target::IdOnly"),
        }
    }
}

/// Where related records come from.
#[derive(Clone)]
pub enum ObjectSource {
    /// Read through [`Resource::relation`].
    Relation(String),
    /// Produced by a callback.
    Callback(RelatedFn),
}

/// A declared relationship.
#[derive(Clone)]
pub struct Relationship {
    pub(crate) key: String,
    explicit_key: bool,
    pub(crate) name: String,
    pub(crate) cardinality: Cardinality,
    pub(crate) target: Target,
    explicit_target: bool,
    pub(crate) polymorphic: bool,
    pub(crate) id_accessor: String,
    pub(crate) object: ObjectSource,
    pub(crate) condition: Option<Condition>,
    pub(crate) record_type: Option<String>,
    pub(crate) api_namespace: Vec<String>,
}

impl Relationship {
    fn new(name: impl Into<String>, cardinality: Cardinality) -> Self {
        let name = name.into();
        Self {
            key: name.clone(),
            explicit_key: false,
            object: ObjectSource::Relation(name.clone()),
            name,
            cardinality,
            target: Target::Inferred,
            explicit_target: false,
            polymorphic: false,
            id_accessor: DEFAULT_ID_ACCESSOR.to_string(),
            condition: None,
            record_type: None,
            api_namespace: Vec::new(),
        }
    }

    /// A to-many relationship.
    pub fn has_many(name: impl Into<String>) -> Self {
        Self::new(name, Cardinality::Many)
    }

    /// A to-one relationship.
    pub fn has_one(name: impl Into<String>) -> Self {
        Self::new(name, Cardinality::One)
    }

    /// A to-one relationship held by the owner.
    pub fn belongs_to(name: impl Into<String>) -> Self {
        Self::new(name, Cardinality::One)
    }

    /// Explicit output key (not key-transformed).
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Override the output key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self.explicit_key = true;
        self
    }

    /// Relation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cardinality.
    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// True for polymorphic relationships.
    pub fn is_polymorphic(&self) -> bool {
        self.polymorphic
    }

    /// Serializer resolution mode.
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Look the serializer up by name in the registry.
    pub fn serializer(self, name: impl Into<String>) -> Self {
        self.with_target(Target::Named(name.into()))
    }

    /// Use a fixed descriptor.
    pub fn serializer_descriptor(self, descriptor: Arc<SerializerDescriptor>) -> Self {
        self.with_target(Target::Descriptor(descriptor))
    }

    /// Choose the serializer per related record.
    pub fn serializer_with<F>(self, choose: F) -> Self
    where
        F: Fn(&dyn Resource, &Params) -> Option<Arc<SerializerDescriptor>> + Send + Sync + 'static,
    {
        self.with_target(Target::Dynamic(Arc::new(choose)))
    }

    /// Never embed related records.
    pub fn id_only(self) -> Self {
        self.with_target(Target::IdOnly)
    }

    fn with_target(mut self, target: Target) -> Self {
        self.target = target;
        self.explicit_target = true;
        self
    }

    /// Related records have no fixed type.
    pub fn polymorphic(mut self) -> Self {
        self.polymorphic = true;
        self
    }

    /// Accessor read on related records for their id.
    pub fn id_accessor(mut self, accessor: impl Into<String>) -> Self {
        self.id_accessor = accessor.into();
        self
    }

    /// Read related records through a differently named relation.
    pub fn object_accessor(mut self, relation: impl Into<String>) -> Self {
        self.object = ObjectSource::Relation(relation.into());
        self
    }

    /// Produce related records with a callback.
    pub fn objects_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&dyn Resource, &Params) -> Related + Send + Sync + 'static,
    {
        self.object = ObjectSource::Callback(Arc::new(f));
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

    /// Type used for synthesized stub links.
    pub fn record_type(mut self, record_type: impl Into<String>) -> Self {
        self.record_type = Some(record_type.into());
        self
    }

    /// Path segments prefixed to synthesized stub links.
    pub fn api_namespace<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.api_namespace = segments.into_iter().map(Into::into).collect();
        self
    }

    /// Settle build-time defaults: key casing and the implicit target.
    pub(crate) fn finalize(&mut self, transform: KeyTransform) {
        if !self.explicit_key {
            self.key = transform.apply(&self.name);
        }
        if let Some(record_type) = &self.record_type {
            self.record_type = Some(transform.apply(record_type));
        }
        if !self.explicit_target && matches!(self.object, ObjectSource::Callback(_)) {
            // Records from a callback may be of any type.
            self.target = Target::IdOnly;
        }
    }

    /// Write this relationship into `out`.
    pub(crate) fn serialize(
        &self,
        owner: &str,
        record: &dyn Resource,
        fields: Option<&Fieldset>,
        ctx: &SerializationContext<'_>,
        out: &mut Map<String, Value>,
    ) -> Result<()> {
        if let Some(condition) = &self.condition {
            if !condition(record, &ctx.params) {
                return Ok(());
            }
        }

        // Resolved at every depth so a bad target fails on first use.
        let static_serializer = self.static_serializer(owner, ctx)?;

        let max = ctx.max_nest_level();
        let data = if ctx.nest_level <= max {
            self.embed(owner, record, static_serializer, fields, ctx)?
        } else if ctx.nest_level <= max + 1 {
            trace!(relation = %self.name, nest_level = ctx.nest_level, "depth cap: id-stubs only");
            self.id_stubs(owner, record, ctx)?
        } else {
            trace!(relation = %self.name, nest_level = ctx.nest_level, "depth cap: traversal stops");
            self.empty()
        };

        out.insert(self.key.clone(), data);
        Ok(())
    }

    fn empty(&self) -> Value {
        match self.cardinality {
            Cardinality::Many => Value::Array(Vec::new()),
            Cardinality::One => Value::Null,
        }
    }

    fn embed(
        &self,
        owner: &str,
        record: &dyn Resource,
        static_serializer: Option<Arc<SerializerDescriptor>>,
        fields: Option<&Fieldset>,
        ctx: &SerializationContext<'_>,
    ) -> Result<Value> {
        match self.cardinality {
            Cardinality::Many => {
                if let Some(serializer) = static_serializer {
                    let items = self.fetch(owner, record, ctx)?.into_vec();
                    let data = items
                        .iter()
                        .map(|item| self.serialize_deep(item.as_ref(), &serializer, fields, ctx))
                        .collect::<Result<Vec<_>>>()?;
                    return Ok(Value::Array(data));
                }

                if let Target::Dynamic(choose) = &self.target {
                    let items = self.fetch(owner, record, ctx)?.into_vec();
                    let mut data = Vec::with_capacity(items.len());
                    for item in &items {
                        let entry = match choose(item.as_ref(), &ctx.params) {
                            Some(serializer) => {
                                self.serialize_deep(item.as_ref(), &serializer, fields, ctx)?
                            }
                            None => self.stub_for(owner, item.as_ref(), ctx)?,
                        };
                        data.push(entry);
                    }
                    return Ok(Value::Array(data));
                }

                self.id_stubs(owner, record, ctx)
            }
            Cardinality::One => {
                let related = self.fetch(owner, record, ctx)?;
                let Some(item) = related.first() else {
                    return Ok(Value::Null);
                };

                let serializer = match &self.target {
                    Target::Dynamic(choose) => choose(item.as_ref(), &ctx.params),
                    _ => static_serializer,
                };
                match serializer {
                    Some(serializer) => self.serialize_deep(item.as_ref(), &serializer, fields, ctx),
                    None => self.id_stubs(owner, record, ctx),
                }
            }
        }
    }

    fn serialize_deep(
        &self,
        item: &dyn Resource,
        serializer: &SerializerDescriptor,
        fields: Option<&Fieldset>,
        ctx: &SerializationContext<'_>,
    ) -> Result<Value> {
        let nested = fieldset::subtree(fields, &self.key).as_fields();
        serializer.record_hash(item, nested, &ctx.descend())
    }

    /// Serializer fixed for every record of this relationship, if any.
    fn static_serializer(
        &self,
        owner: &str,
        ctx: &SerializationContext<'_>,
    ) -> Result<Option<Arc<SerializerDescriptor>>> {
        if self.polymorphic {
            return Ok(None);
        }

        match &self.target {
            Target::Descriptor(descriptor) => Ok(Some(descriptor.clone())),
            Target::Named(name) => ctx.registry.get(name).map(Some).ok_or_else(|| {
                SerializeError::UnknownSerializer {
                    owner: owner.to_string(),
                    relation: self.name.clone(),
                    attempted: name.clone(),
                }
            }),
            Target::Inferred => {
                let name = match self.cardinality {
                    Cardinality::Many => (ctx.registry.inflector().singularize)(&self.name),
                    Cardinality::One => self.name.clone(),
                };
                let found = ctx.registry.get(&name);
                if found.is_none() {
                    debug!(owner, relation = %self.name, attempted = %name, "no serializer inferred, using id-stubs");
                }
                Ok(found)
            }
            Target::Dynamic(_) | Target::IdOnly => Ok(None),
        }
    }

    fn fetch(&self, owner: &str, record: &dyn Resource, ctx: &SerializationContext<'_>) -> Result<Related> {
        match &self.object {
            ObjectSource::Callback(f) => Ok(f(record, &ctx.params)),
            ObjectSource::Relation(name) => {
                record
                    .relation(name)
                    .ok_or_else(|| SerializeError::MissingAccessor {
                        serializer: owner.to_string(),
                        record_type: record.type_name().to_string(),
                        accessor: name.clone(),
                    })
            }
        }
    }

    /// Id-only representation of the relationship.
    fn id_stubs(&self, owner: &str, record: &dyn Resource, ctx: &SerializationContext<'_>) -> Result<Value> {
        if self.id_accessor != DEFAULT_ID_ACCESSOR || self.polymorphic {
            // Custom ids and runtime types need the related records.
            let related = self.fetch(owner, record, ctx)?;
            return match self.cardinality {
                Cardinality::Many => related
                    .into_vec()
                    .iter()
                    .map(|item| self.stub_for(owner, item.as_ref(), ctx))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::Array),
                Cardinality::One => match related.first() {
                    Some(item) => self.stub_for(owner, item.as_ref(), ctx),
                    None => Ok(Value::Null),
                },
            };
        }

        let record_type = self.stub_record_type(owner, ctx)?;
        let ids = self.related_ids(owner, record, ctx)?;
        match ids {
            Value::Array(ids) => ids
                .into_iter()
                .map(|id| self.id_hash(id, Some(&record_type), None, ctx))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::Null if self.cardinality == Cardinality::Many => Ok(Value::Array(Vec::new())),
            id if self.cardinality == Cardinality::Many => {
                Ok(Value::Array(vec![self.id_hash(id, Some(&record_type), None, ctx)?]))
            }
            id => self.id_hash(id, Some(&record_type), None, ctx),
        }
    }

    /// Ids read cheaply from the owner (`<name>_id` / `<singular>_ids`), or
    /// from the related records when the owner has no such accessor.
    fn related_ids(&self, owner: &str, record: &dyn Resource, ctx: &SerializationContext<'_>) -> Result<Value> {
        if let ObjectSource::Relation(_) = &self.object {
            let foreign_key = match self.cardinality {
                Cardinality::Many => {
                    format!("{}_ids", (ctx.registry.inflector().singularize)(&self.name))
                }
                Cardinality::One => format!("{}_id", self.name),
            };
            if let Some(ids) = record.attribute(&foreign_key) {
                return Ok(ids);
            }
            debug!(owner, relation = %self.name, foreign_key = %foreign_key, "no id accessor on owner, fetching related records");
        }

        let related = self.fetch(owner, record, ctx)?;
        let id_of = |item: &dyn Resource| item.attribute(&self.id_accessor).unwrap_or(Value::Null);
        Ok(match (self.cardinality, related) {
            (_, Related::Nil) => Value::Null,
            (Cardinality::Many, related) => {
                Value::Array(related.into_vec().iter().map(|item| id_of(item.as_ref())).collect())
            }
            (Cardinality::One, related) => related
                .first()
                .map_or(Value::Null, |item| id_of(item.as_ref())),
        })
    }

    /// Type named in synthesized stub links.
    fn stub_record_type(&self, owner: &str, ctx: &SerializationContext<'_>) -> Result<String> {
        if let Some(record_type) = &self.record_type {
            return Ok(record_type.clone());
        }
        Ok(self
            .static_serializer(owner, ctx)?
            .map_or_else(|| self.name.clone(), |s| s.record_type().to_string()))
    }

    /// Stub for a related record already in hand.
    fn stub_for(&self, owner: &str, item: &dyn Resource, ctx: &SerializationContext<'_>) -> Result<Value> {
        let id = item
            .attribute(&self.id_accessor)
            .ok_or_else(|| SerializeError::MissingAccessor {
                serializer: owner.to_string(),
                record_type: item.type_name().to_string(),
                accessor: self.id_accessor.clone(),
            })?;
        let actual = self.polymorphic.then_some(item);
        self.id_hash(id, Some(item.type_name()), actual, ctx)
    }

    fn id_hash(
        &self,
        id: Value,
        record_type: Option<&str>,
        actual: Option<&dyn Resource>,
        ctx: &SerializationContext<'_>,
    ) -> Result<Value> {
        let id = stringify_id(id);
        let mut stub = Map::new();
        let Value::String(id_str) = &id else {
            stub.insert("id".to_string(), Value::Null);
            return Ok(Value::Object(stub));
        };
        let id_str = id_str.clone();
        stub.insert("id".to_string(), id);

        match (record_type, actual) {
            (Some(record_type), Some(item)) => {
                // The record is in hand: link it accurately, whatever the
                // link options say.
                let link = route_self(item, record_type, &self.api_namespace, ctx.registry.routes());
                stub.insert("type".to_string(), Value::String(record_type.to_string()));
                stub.insert("_links".to_string(), Value::Array(vec![serde_json::to_value(link)?]));
            }
            (Some(record_type), None) if !ctx.no_links && !ctx.no_auto_links => {
                let link = stub_self(
                    &id_str,
                    record_type,
                    &self.api_namespace,
                    &ctx.params,
                    ctx.registry.inflector(),
                );
                stub.insert("_links".to_string(), Value::Array(vec![serde_json::to_value(link)?]));
            }
            _ => {}
        }

        Ok(Value::Object(stub))
    }
}

impl fmt::Debug for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relationship")
            .field("key", &self.key)
            .field("name", &self.name)
            .field("cardinality", &self.cardinality)
            .field("target", &self.target)
            .field("polymorphic", &self.polymorphic)
            .field("id_accessor", &self.id_accessor)
            .finish_non_exhaustive()
    }
}
