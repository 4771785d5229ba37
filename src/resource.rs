//! Domain record capability.
//!
//! The engine never inspects concrete record types. Everything it needs from a
//! record goes through [`Resource`]: a runtime type name, lookup of scalar
//! values by accessor name, lookup of related records by relation name, and an
//! identity value.

use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Opaque caller parameters forwarded to every callback and predicate.
pub type Params = Map<String, Value>;

/// Shared handle to a domain record.
pub type ResourceRef = Arc<dyn Resource>;

/// Capability a domain record exposes to serializers.
pub trait Resource: Send + Sync {
    /// Runtime type name of the record (emitted as `type` for polymorphic
    /// relationships).
    fn type_name(&self) -> &str;

    /// Read a scalar value by accessor name.
    ///
    /// `None` means the record has no such accessor at all; a present accessor
    /// holding nothing returns `Some(Value::Null)`.
    fn attribute(&self, name: &str) -> Option<Value>;

    /// Read related records by relation name. `None` means no such relation.
    fn relation(&self, name: &str) -> Option<Related>;

    /// Default identity accessor.
    fn id(&self) -> Option<Value> {
        self.attribute("id")
    }
}

/// Result of reading a relation.
#[derive(Clone, Default)]
pub enum Related {
    /// Nothing related.
    #[default]
    Nil,
    /// A single related record.
    One(ResourceRef),
    /// A list of related records.
    Many(Vec<ResourceRef>),
}

impl Related {
    /// True when there is at least one related record.
    pub fn is_present(&self) -> bool {
        match self {
            Self::Nil => false,
            Self::One(_) => true,
            Self::Many(items) => !items.is_empty(),
        }
    }

    /// First (or only) related record.
    pub fn first(&self) -> Option<&ResourceRef> {
        match self {
            Self::Nil => None,
            Self::One(item) => Some(item),
            Self::Many(items) => items.first(),
        }
    }

    /// Flatten into a list.
    pub fn into_vec(self) -> Vec<ResourceRef> {
        match self {
            Self::Nil => Vec::new(),
            Self::One(item) => vec![item],
            Self::Many(items) => items,
        }
    }
}

impl fmt::Debug for Related {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => write!(f, "Related::Nil"),
            Self::One(item) => write!(f, "Related::One({})", item.type_name()),
            Self::Many(items) => write!(f, "Related::Many(len={})", items.len()),
        }
    }
}

impl From<ResourceRef> for Related {
    fn from(item: ResourceRef) -> Self {
        Self::One(item)
    }
}

impl From<Option<ResourceRef>> for Related {
    fn from(item: Option<ResourceRef>) -> Self {
        item.map_or(Self::Nil, Self::One)
    }
}

impl From<Vec<ResourceRef>> for Related {
    fn from(items: Vec<ResourceRef>) -> Self {
        Self::Many(items)
    }
}

/// What a caller hands to an entry point.
#[derive(Clone, Default)]
pub enum Subject {
    /// Nothing to serialize.
    #[default]
    Empty,
    /// A single record.
    One(ResourceRef),
    /// A collection of records.
    Many(Vec<ResourceRef>),
}

impl Subject {
    /// Decide whether to emit a list, honouring an explicit override.
    pub fn is_collection(&self, force: Option<bool>) -> bool {
        force.unwrap_or(matches!(self, Self::Many(_)))
    }
}

impl From<ResourceRef> for Subject {
    fn from(item: ResourceRef) -> Self {
        Self::One(item)
    }
}

impl From<Option<ResourceRef>> for Subject {
    fn from(item: Option<ResourceRef>) -> Self {
        item.map_or(Self::Empty, Self::One)
    }
}

impl From<Vec<ResourceRef>> for Subject {
    fn from(items: Vec<ResourceRef>) -> Self {
        Self::Many(items)
    }
}

/// Stringify an id for output. Null and blank ids stay null.
pub(crate) fn stringify_id(id: Value) -> Value {
    match id {
        Value::Null => Value::Null,
        Value::String(s) if s.is_empty() => Value::Null,
        Value::String(s) => Value::String(s),
        other => Value::String(other.to_string()),
    }
}

/// Render a scalar the way it is interpolated into an href.
pub(crate) fn interpolate(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
