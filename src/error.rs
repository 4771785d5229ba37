//! Error types for serialization.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SerializeError>;

/// Why an href could not be produced for a link.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HrefError {
    /// The record has no such capability (unknown accessor, no route for it).
    #[error("record has no '{0}' capability")]
    Missing(String),

    /// The capability exists but there is no environment to resolve it in.
    #[error("no resolution context available: {0}")]
    NoContext(String),
}

/// Errors raised while building descriptors or serializing records.
#[derive(Debug, Error)]
pub enum SerializeError {
    /// No id could be resolved for a record.
    #[error("id is a mandatory field: serializer '{serializer}' cannot resolve an id for a '{record_type}' record")]
    MandatoryField {
        /// Descriptor that was serializing.
        serializer: String,
        /// Runtime type of the record.
        record_type: String,
    },

    /// A strict link failed to resolve its href.
    #[error("serializer '{serializer}' cannot resolve link '{rel}': {source}")]
    LinkResolution {
        /// Descriptor owning the link.
        serializer: String,
        /// Link relation label.
        rel: String,
        /// Underlying failure.
        #[source]
        source: HrefError,
    },

    /// A relationship named a serializer that is not registered.
    #[error(
        "{owner} cannot resolve a serializer for '{relation}'. Attempted to find '{attempted}'. \
         Consider specifying the serializer directly."
    )]
    UnknownSerializer {
        /// Descriptor declaring the relationship.
        owner: String,
        /// Relation name.
        relation: String,
        /// Serializer name that was looked up.
        attempted: String,
    },

    /// An entry point was called with a name the registry does not know.
    #[error("no serializer registered under '{name}'")]
    UnregisteredSerializer {
        /// Requested name.
        name: String,
    },

    /// A named accessor does not exist on the record.
    #[error("serializer '{serializer}' reads '{accessor}' but a '{record_type}' record has no such accessor")]
    MissingAccessor {
        /// Descriptor that was serializing.
        serializer: String,
        /// Runtime type of the record.
        record_type: String,
        /// Accessor name.
        accessor: String,
    },

    /// `params` was supplied but is not a mapping.
    #[error("`params` passed within options to serializer must be a mapping, got {found}")]
    InvalidParams {
        /// JSON kind that was found instead.
        found: String,
    },

    /// `fields` is not a well-formed fieldset tree.
    #[error("invalid fieldset: {reason}")]
    InvalidFieldset {
        /// What was wrong.
        reason: String,
    },

    /// A descriptor or call option is inconsistent.
    #[error("invalid serializer configuration: {0}")]
    InvalidConfiguration(String),

    /// The cache collaborator failed.
    #[error("cache store failure: {0}")]
    Cache(String),

    /// JSON conversion failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SerializeError {
    /// Get an error code for this error type.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MandatoryField { .. } => "MANDATORY_FIELD",
            Self::LinkResolution { .. } => "LINK_RESOLUTION",
            Self::UnknownSerializer { .. } => "UNKNOWN_SERIALIZER",
            Self::UnregisteredSerializer { .. } => "UNREGISTERED_SERIALIZER",
            Self::MissingAccessor { .. } => "MISSING_ACCESSOR",
            Self::InvalidParams { .. } => "INVALID_PARAMS",
            Self::InvalidFieldset { .. } => "INVALID_FIELDSET",
            Self::InvalidConfiguration(_) => "INVALID_CONFIGURATION",
            Self::Cache(_) => "CACHE",
            Self::Json(_) => "JSON",
        }
    }

    /// Check if this error points at a serializer-authoring mistake rather
    /// than at the input of a single call.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::LinkResolution { .. }
                | Self::UnknownSerializer { .. }
                | Self::MissingAccessor { .. }
                | Self::InvalidConfiguration(_)
        )
    }
}

/// Name the JSON kind of a value for diagnostics.
pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = SerializeError::MandatoryField {
            serializer: "movie".into(),
            record_type: "Movie".into(),
        };
        assert_eq!(err.code(), "MANDATORY_FIELD");
        assert!(!err.is_configuration_error());

        let err = SerializeError::UnknownSerializer {
            owner: "actor".into(),
            relation: "played_movies".into(),
            attempted: "bad".into(),
        };
        assert_eq!(err.code(), "UNKNOWN_SERIALIZER");
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_unknown_serializer_message_names_attempt() {
        let err = SerializeError::UnknownSerializer {
            owner: "actor".into(),
            relation: "played_movies".into(),
            attempted: "bad".into(),
        };
        let message = err.to_string();
        assert!(message.contains("cannot resolve a serializer for 'played_movies'"));
        assert!(message.contains("Attempted to find 'bad'"));
    }

    #[test]
    fn test_link_resolution_keeps_source() {
        use std::error::Error as _;

        let err = SerializeError::LinkResolution {
            serializer: "movie".into(),
            rel: "self".into(),
            source: HrefError::Missing("some_bad_method".into()),
        };
        let source = err.source().expect("source attached");
        assert_eq!(source.to_string(), "record has no 'some_bad_method' capability");
    }
}
