//! Fatal errors and eager option validation.

mod helpers;

use helpers::{catalogue, registry};
use jsonapi_projection::{
    DescriptorBuilder, EngineConfig, Relationship, SerializeError, SerializeOptions,
    SerializerRegistry,
};
use serde_json::json;

#[test]
fn test_unknown_named_serializer() {
    let catalogue = catalogue();
    let mut registry = SerializerRegistry::new();
    registry.register(
        DescriptorBuilder::new("movie")
            .relationship(Relationship::has_many("actors").serializer("performer"))
            .build()
            .unwrap(),
    );

    let err = registry
        .serializable_hash("movie", catalogue.get("m1"), &SerializeOptions::new())
        .unwrap_err();
    match &err {
        SerializeError::UnknownSerializer {
            owner,
            relation,
            attempted,
        } => {
            assert_eq!(owner, "movie");
            assert_eq!(relation, "actors");
            assert_eq!(attempted, "performer");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("Attempted to find 'performer'"));
}

#[test]
fn test_unknown_named_serializer_past_the_depth_cap() {
    let catalogue = catalogue();
    let mut registry = SerializerRegistry::with_config(EngineConfig::default().with_max_nest_level(1));
    registry.register(
        DescriptorBuilder::new("actor")
            .relationship(Relationship::has_many("played_movies").serializer("film"))
            .build()
            .unwrap(),
    );

    // Level 3 renders the relationship as `[]`, but the target still resolves.
    let err = registry
        .serializable_hash(
            "actor",
            catalogue.get("a1"),
            &SerializeOptions::new().starting_nest_level(3),
        )
        .unwrap_err();
    assert!(matches!(err, SerializeError::UnknownSerializer { ref attempted, .. } if attempted == "film"));
}

#[test]
fn test_mandatory_id() {
    let catalogue = catalogue();
    let mut registry = SerializerRegistry::new();
    registry.register(DescriptorBuilder::new("user").id("uuid").build().unwrap());

    let err = registry
        .serializable_hash("user", catalogue.get("u1"), &SerializeOptions::new())
        .unwrap_err();
    assert!(matches!(err, SerializeError::MandatoryField { .. }));
}

#[test]
fn test_missing_attribute_accessor() {
    let catalogue = catalogue();
    let mut registry = SerializerRegistry::new();
    registry.register(
        DescriptorBuilder::new("user")
            .attributes(["name", "nickname"])
            .build()
            .unwrap(),
    );

    let err = registry
        .serializable_hash("user", catalogue.get("u1"), &SerializeOptions::new())
        .unwrap_err();
    assert_eq!(err.code(), "MISSING_ACCESSOR");
}

#[test]
fn test_unregistered_entry_point() {
    let catalogue = catalogue();
    let err = registry()
        .serializable_hash("director", catalogue.get("m1"), &SerializeOptions::new())
        .unwrap_err();
    assert!(matches!(err, SerializeError::UnregisteredSerializer { ref name } if name == "director"));
}

#[test]
fn test_invalid_options_are_rejected_before_serializing() {
    let params = SerializeOptions::from_value(&json!({"params": "system_type=x"})).unwrap_err();
    assert_eq!(params.code(), "INVALID_PARAMS");
    assert!(!params.is_configuration_error());

    let fields = SerializeOptions::from_value(&json!({"fields": "name"})).unwrap_err();
    assert_eq!(fields.code(), "INVALID_FIELDSET");

    let fields = SerializeOptions::from_value(&json!({"fields": [{"actors": "name"}]})).unwrap_err();
    assert_eq!(fields.code(), "INVALID_FIELDSET");
}

#[test]
fn test_options_from_json_drive_serialization() {
    let catalogue = catalogue();
    let options =
        SerializeOptions::from_json_str(r#"{"fields": ["name"], "no_links": "true"}"#).unwrap();
    let hash = registry()
        .serializable_hash("movie", catalogue.get("m1"), &options)
        .unwrap();
    assert_eq!(hash, json!({"id": "m1", "name": "Inception"}));
}
