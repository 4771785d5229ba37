//! Scalar output fields.

use crate::error::{Result, SerializeError};
use crate::resource::{Params, Resource};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Callback computing a value from `(record, params)`.
pub type ValueFn = Arc<dyn Fn(&dyn Resource, &Params) -> Value + Send + Sync>;

/// Predicate over `(record, params)` deciding whether a field is emitted.
pub type Condition = Arc<dyn Fn(&dyn Resource, &Params) -> bool + Send + Sync>;

/// Where a value comes from.
#[derive(Clone)]
pub enum Accessor {
    /// Read through [`Resource::attribute`].
    Named(String),
    /// Computed by a callback.
    Callback(ValueFn),
}

impl Accessor {
    /// Callback accessor from a closure.
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&dyn Resource, &Params) -> Value + Send + Sync + 'static,
    {
        Self::Callback(Arc::new(f))
    }

    /// Resolve against a record. `None` only for a named accessor the record
    /// does not have.
    pub fn resolve(&self, record: &dyn Resource, params: &Params) -> Option<Value> {
        match self {
            Self::Named(name) => record.attribute(name),
            Self::Callback(f) => Some(f(record, params)),
        }
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => write!(f, "Accessor::Named({name})"),
            Self::Callback(_) => write!(f, "Accessor::Callback"),
        }
    }
}

impl From<&str> for Accessor {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

/// A declared scalar field.
#[derive(Clone)]
pub struct Attribute {
    pub(crate) key: String,
    pub(crate) source: Accessor,
    pub(crate) condition: Option<Condition>,
}

impl Attribute {
    /// Field read from the record accessor of the same name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            source: Accessor::Named(name.clone()),
            key: name,
            condition: None,
        }
    }

    /// Field computed by a callback.
    pub fn computed<F>(key: impl Into<String>, f: F) -> Self
    where
        F: Fn(&dyn Resource, &Params) -> Value + Send + Sync + 'static,
    {
        Self {
            key: key.into(),
            source: Accessor::callback(f),
            condition: None,
        }
    }

    /// Read from a differently named accessor.
    pub fn from_accessor(mut self, accessor: impl Into<String>) -> Self {
        self.source = Accessor::Named(accessor.into());
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

    /// Output key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Write the field into `out` unless its predicate rejects the record.
    pub(crate) fn serialize(
        &self,
        serializer: &str,
        record: &dyn Resource,
        params: &Params,
        out: &mut Map<String, Value>,
    ) -> Result<()> {
        if let Some(condition) = &self.condition {
            if !condition(record, params) {
                return Ok(());
            }
        }

        let value = self
            .source
            .resolve(record, params)
            .ok_or_else(|| SerializeError::MissingAccessor {
                serializer: serializer.to_string(),
                record_type: record.type_name().to_string(),
                accessor: match &self.source {
                    Accessor::Named(name) => name.clone(),
                    Accessor::Callback(_) => self.key.clone(),
                },
            })?;
        out.insert(self.key.clone(), value);
        Ok(())
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("key", &self.key)
            .field("source", &self.source)
            .field("conditional", &self.condition.is_some())
            .finish()
    }
}
