//! JSON:API Projection - depth-bounded serialization of domain record graphs.
//!
//! This crate turns records reachable through the [`Resource`] capability into
//! JSON:API-shaped mappings:
//! - `SerializerDescriptor` - immutable per-type schema built by `DescriptorBuilder`
//! - `Attribute` / `Relationship` / `Link` - the declared output fields
//! - `Fieldset` - tree-shaped field selection ("absent" vs "present but empty")
//! - `CacheStore` - read-through record cache with fieldset-aware namespaces
//! - `SerializerRegistry` - named descriptors plus shared collaborators
//!
//! # Architecture
//!
//! ```text
//! SerializerRegistry::serializable_hash(name, subject, options)
//! └── per record: record_hash (through the cache when configured)
//!     ├── id
//!     ├── attributes            (fieldset)
//!     ├── relationships         (fieldset, recursive, depth-capped)
//!     │   └── record_hash of related records at nest level + 1
//!     └── _links                (unless no_links)
//! ```
//!
//! Relationships embed fully while the nest level is at most
//! `EngineConfig::max_nest_level`, degrade to id-stubs one level beyond and
//! stop (empty list / null) after that.
//!
//! # Example
//!
//! ```
//! use jsonapi_projection::{
//!     DescriptorBuilder, Fieldset, Related, Resource, SerializeOptions, SerializerRegistry,
//! };
//! use serde_json::{json, Value};
//! use std::sync::Arc;
//!
//! struct Movie;
//!
//! impl Resource for Movie {
//!     fn type_name(&self) -> &str {
//!         "Movie"
//!     }
//!     fn attribute(&self, name: &str) -> Option<Value> {
//!         match name {
//!             "id" => Some(json!("m1")),
//!             "name" => Some(json!("Inception")),
//!             "year" => Some(json!(2010)),
//!             _ => None,
//!         }
//!     }
//!     fn relation(&self, _name: &str) -> Option<Related> {
//!         None
//!     }
//! }
//!
//! let mut registry = SerializerRegistry::new();
//! registry.register(
//!     DescriptorBuilder::new("movie")
//!         .attributes(["name", "year"])
//!         .build()
//!         .unwrap(),
//! );
//!
//! let options = SerializeOptions::new()
//!     .fields(Fieldset::of(["name"]))
//!     .no_links();
//! let movie: Arc<dyn Resource> = Arc::new(Movie);
//! let hash = registry.serializable_hash("movie", movie, &options).unwrap();
//! assert_eq!(hash, json!({"id": "m1", "name": "Inception"}));
//! ```

pub mod attribute;
pub mod cache;
pub mod config;
pub mod descriptor;
mod engine;
mod error;
pub mod fieldset;
pub mod link;
mod options;
mod registry;
pub mod relationship;
mod resource;
pub mod transform;

// Re-exports
pub use attribute::{Accessor, Attribute, Condition, ValueFn};
pub use cache::{CacheOptions, CacheStore, CacheVariant, MemoryCacheStore};
pub use config::EngineConfig;
pub use descriptor::{DescriptorBuilder, DescriptorCache, SerializerDescriptor};
pub use error::{HrefError, Result, SerializeError};
pub use fieldset::{FieldEntry, Fieldset, Selection};
pub use link::{ConventionalRoutes, HrefSource, Link, LinkEntry, RouteResolver};
pub use options::SerializeOptions;
pub use registry::SerializerRegistry;
pub use relationship::{Cardinality, Relationship, Target};
pub use resource::{Params, Related, Resource, ResourceRef, Subject};
pub use transform::{Inflector, KeyTransform};
