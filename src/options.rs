//! Per-call options.

use crate::error::{json_kind, Result, SerializeError};
use crate::fieldset::Fieldset;
use crate::resource::Params;
use serde::Serialize;
use serde_json::Value;

/// Options for one entry-point call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SerializeOptions {
    /// Force list (`true`) or mapping (`false`) output; detected when unset.
    pub is_collection: Option<bool>,
    /// Field selection; `None` emits everything.
    pub fields: Option<Fieldset>,
    /// Forwarded to every callback and predicate.
    pub params: Params,
    /// Suppress all `_links`.
    pub no_links: bool,
    /// Suppress only the automatic self links.
    pub no_auto_links: bool,
    /// Starting nest level; 1 when unset.
    pub nest_level: Option<u32>,
}

impl SerializeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection(mut self, is_collection: bool) -> Self {
        self.is_collection = Some(is_collection);
        self
    }

    pub fn fields(mut self, fields: Fieldset) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Add one param.
    pub fn param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn no_links(mut self) -> Self {
        self.no_links = true;
        self
    }

    pub fn no_auto_links(mut self) -> Self {
        self.no_auto_links = true;
        self
    }

    /// Start at a deeper nest level, as if the records were already embedded.
    pub fn starting_nest_level(mut self, level: u32) -> Self {
        self.nest_level = Some(level);
        self
    }

    /// Parse options from a JSON mapping, validating `params` and `fields`
    /// before any record is touched.
    ///
    /// ```text
    /// { "fields": ["name", {"actors": ["name"]}],
    ///   "params": {"system_type": "catalog"},
    ///   "no_links": true, "is_collection": false, "nest_level": 1 }
    /// ```
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            other => {
                return Err(SerializeError::InvalidConfiguration(format!(
                    "options must be a mapping, got {}",
                    json_kind(other)
                )))
            }
        };

        let mut options = Self::default();

        match map.get("params") {
            None | Some(Value::Null) => {}
            Some(Value::Object(params)) => options.params = params.clone(),
            Some(other) => {
                return Err(SerializeError::InvalidParams {
                    found: json_kind(other).to_string(),
                })
            }
        }

        match map.get("fields") {
            None | Some(Value::Null) => {}
            Some(fields) => options.fields = Some(Fieldset::parse(fields)?),
        }

        options.is_collection = match map.get("is_collection") {
            None | Some(Value::Null) => None,
            Some(flag) => Some(is_truthy(flag)),
        };
        options.no_links = map.get("no_links").is_some_and(is_truthy);
        options.no_auto_links = map.get("no_auto_links").is_some_and(is_truthy);

        options.nest_level = match map.get("nest_level") {
            None | Some(Value::Null) => None,
            Some(level) => Some(
                level
                    .as_u64()
                    .and_then(|level| u32::try_from(level).ok())
                    .filter(|level| *level >= 1)
                    .ok_or_else(|| {
                        SerializeError::InvalidConfiguration(format!(
                            "nest_level must be a positive integer, got {level}"
                        ))
                    })?,
            ),
        };

        Ok(options)
    }

    /// Parse options from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }
}

/// Anything but null, false and blank values counts as set.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Number(_) => true,
    }
}
