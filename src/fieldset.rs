//! Tree-shaped field selection.
//!
//! A fieldset is an ordered list of entries, each either a bare field name or
//! a `(name -> nested fieldset)` pair. The distinction between "no fieldset"
//! and "empty fieldset" matters at every level:
//!
//! ```text
//! None                 -> no restriction, every declared field
//! Some([])             -> suppress every optional field (id only)
//! Some([name, {actors: [email]}])
//!                      -> name, actors; actors restricted to email
//! ```
//!
//! On the wire a fieldset is its JSON tree: `["name", {"actors": ["email"]}]`.

use crate::error::{json_kind, Result, SerializeError};
use crate::relationship::Relationship;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

static EMPTY: Fieldset = Fieldset {
    entries: Vec::new(),
};

/// One entry of a fieldset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldEntry {
    /// Include the field with all of its own descendants.
    Name(String),
    /// Include the field, restricting its descendants.
    Nested(String, Fieldset),
}

impl FieldEntry {
    /// Field name of the entry.
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Nested(name, _) => name,
        }
    }
}

/// Caller-supplied field selection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Fieldset {
    entries: Vec<FieldEntry>,
}

/// Outcome of descending a fieldset into one field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selection<'a> {
    /// No restriction below this field.
    All,
    /// Nothing optional below this field.
    Nothing,
    /// Restricted to the given subtree.
    Subset(&'a Fieldset),
}

impl<'a> Selection<'a> {
    /// Convert back into the "absent / present" form used by the engine.
    pub fn as_fields(self) -> Option<&'a Fieldset> {
        match self {
            Self::All => None,
            Self::Nothing => Some(&EMPTY),
            Self::Subset(fields) => Some(fields),
        }
    }
}

impl Fieldset {
    /// Create an empty (present-but-empty) fieldset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a flat fieldset from field names.
    pub fn of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: names.into_iter().map(|n| FieldEntry::Name(n.into())).collect(),
        }
    }

    /// Append a bare field.
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.entries.push(FieldEntry::Name(name.into()));
        self
    }

    /// Append a field with a nested selection.
    pub fn nested(mut self, name: impl Into<String>, subtree: Fieldset) -> Self {
        self.entries.push(FieldEntry::Nested(name.into(), subtree));
        self
    }

    /// Parse the JSON tree form.
    ///
    /// # Errors
    /// Returns `InvalidFieldset` if the value is not an array of names and
    /// `{name: [...]}` objects.
    pub fn parse(value: &Value) -> Result<Self> {
        let Value::Array(items) = value else {
            return Err(invalid(format!(
                "expected an array of field names, got {}",
                json_kind(value)
            )));
        };

        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::String(name) => entries.push(FieldEntry::Name(checked_name(name)?)),
                Value::Object(pairs) => {
                    for (name, subtree) in pairs {
                        entries.push(FieldEntry::Nested(checked_name(name)?, Self::parse(subtree)?));
                    }
                }
                other => {
                    return Err(invalid(format!(
                        "entries must be names or {{name: [...]}} objects, got {}",
                        json_kind(other)
                    )))
                }
            }
        }
        Ok(Self { entries })
    }

    /// Entries in declaration order.
    pub fn entries(&self) -> &[FieldEntry] {
        &self.entries
    }

    /// True for a present-but-empty fieldset.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top-level names, pair keys included.
    pub fn expanded_keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(FieldEntry::name)
    }

    /// True if `key` is selected at this level (bare or as a pair key).
    pub fn is_included(&self, key: &str) -> bool {
        self.expanded_keys().any(|k| k == key)
    }

    /// Selection that applies below `key`.
    pub fn subtree(&self, key: &str) -> Selection<'_> {
        match self.entries.iter().find(|entry| entry.name() == key) {
            Some(FieldEntry::Name(_)) => Selection::All,
            Some(FieldEntry::Nested(_, subtree)) => Selection::Subset(subtree),
            None => Selection::Nothing,
        }
    }

    /// JSON tree form.
    pub fn to_value(&self) -> Value {
        Value::Array(
            self.entries
                .iter()
                .map(|entry| match entry {
                    FieldEntry::Name(name) => Value::String(name.clone()),
                    FieldEntry::Nested(name, subtree) => {
                        let mut pair = Map::new();
                        pair.insert(name.clone(), subtree.to_value());
                        Value::Object(pair)
                    }
                })
                .collect(),
        )
    }

    /// Literal string used to vary cache namespaces. Empty for an empty
    /// fieldset.
    pub fn cache_string(&self) -> String {
        if self.is_empty() {
            String::new()
        } else {
            self.to_value().to_string()
        }
    }
}

impl fmt::Display for Fieldset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

impl TryFrom<Value> for Fieldset {
    type Error = SerializeError;

    fn try_from(value: Value) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Fieldset> for Value {
    fn from(fields: Fieldset) -> Self {
        fields.to_value()
    }
}

fn checked_name(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(invalid("field names must not be empty".to_string()));
    }
    Ok(name.to_string())
}

fn invalid(reason: String) -> SerializeError {
    SerializeError::InvalidFieldset { reason }
}

/// True if `key` is selected, treating an absent fieldset as "everything".
pub fn is_included(fields: Option<&Fieldset>, key: &str) -> bool {
    fields.map_or(true, |f| f.is_included(key))
}

/// Selection below `key`, treating an absent fieldset as "everything".
pub fn subtree<'a>(fields: Option<&'a Fieldset>, key: &str) -> Selection<'a> {
    match fields {
        None => Selection::All,
        Some(f) => f.subtree(key),
    }
}

/// Keep the items whose key is selected by `fields`, in declaration order.
pub fn select<'a, T>(
    available: &'a [T],
    fields: Option<&Fieldset>,
    key_of: impl Fn(&T) -> &str,
) -> Vec<&'a T> {
    match fields {
        None => available.iter().collect(),
        Some(f) if f.is_empty() => Vec::new(),
        Some(f) => available.iter().filter(|item| f.is_included(key_of(item))).collect(),
    }
}

/// Relationships selected by `fields`, matched on their output key.
pub fn trim_relationships<'a>(
    available: &'a [Relationship],
    fields: Option<&Fieldset>,
) -> Vec<&'a Relationship> {
    select(available, fields, Relationship::key)
}
