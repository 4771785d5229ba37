//! Descriptor registry and entry points.

use crate::config::EngineConfig;
use crate::descriptor::SerializerDescriptor;
use crate::engine;
use crate::error::{Result, SerializeError};
use crate::link::{ConventionalRoutes, RouteResolver};
use crate::options::SerializeOptions;
use crate::resource::Subject;
use crate::transform::Inflector;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Owns descriptors by name plus the collaborators they share.
///
/// Relationships that name their serializer (or infer it from the relation
/// name) resolve it here at call time, so descriptors may refer to each other
/// in cycles.
pub struct SerializerRegistry {
    descriptors: HashMap<String, Arc<SerializerDescriptor>>,
    config: EngineConfig,
    routes: Option<Arc<dyn RouteResolver>>,
    inflector: Inflector,
}

impl SerializerRegistry {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        info!(max_nest_level = config.max_nest_level, "Creating serializer registry");
        Self {
            descriptors: HashMap::new(),
            config,
            routes: None,
            inflector: Inflector::default(),
        }
    }

    /// Resolve self links through `routes`.
    pub fn with_route_resolver(mut self, routes: Arc<dyn RouteResolver>) -> Self {
        self.routes = Some(routes);
        self
    }

    /// Resolve self links as `/<namespace>/<plural type>/<id>`.
    pub fn with_conventional_routes(self) -> Self {
        let routes = ConventionalRoutes::new(self.inflector);
        self.with_route_resolver(Arc::new(routes))
    }

    pub fn with_inflector(mut self, inflector: Inflector) -> Self {
        self.inflector = inflector;
        self
    }

    /// Register a descriptor under its name, replacing any previous one.
    pub fn register(&mut self, descriptor: SerializerDescriptor) -> Arc<SerializerDescriptor> {
        let descriptor = Arc::new(descriptor);
        if self
            .descriptors
            .insert(descriptor.name().to_string(), descriptor.clone())
            .is_some()
        {
            warn!(serializer = %descriptor.name(), "Replacing registered serializer");
        }
        descriptor
    }

    pub fn get(&self, name: &str) -> Option<Arc<SerializerDescriptor>> {
        self.descriptors.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.descriptors.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.descriptors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn routes(&self) -> Option<&dyn RouteResolver> {
        self.routes.as_deref()
    }

    pub fn inflector(&self) -> &Inflector {
        &self.inflector
    }

    /// Serialize with the descriptor registered under `name`.
    pub fn serializable_hash(
        &self,
        name: &str,
        subject: impl Into<Subject>,
        options: &SerializeOptions,
    ) -> Result<Value> {
        let descriptor = self
            .get(name)
            .ok_or_else(|| SerializeError::UnregisteredSerializer {
                name: name.to_string(),
            })?;
        self.serialize_with(&descriptor, subject, options)
    }

    /// Serialize with a descriptor that need not be registered. Its
    /// relationships still resolve names against this registry.
    pub fn serialize_with(
        &self,
        descriptor: &SerializerDescriptor,
        subject: impl Into<Subject>,
        options: &SerializeOptions,
    ) -> Result<Value> {
        engine::serializable_hash(self, descriptor, &subject.into(), options)
    }

    /// [`Self::serializable_hash`] rendered as a JSON string.
    pub fn serialized_json(
        &self,
        name: &str,
        subject: impl Into<Subject>,
        options: &SerializeOptions,
    ) -> Result<String> {
        let hash = self.serializable_hash(name, subject, options)?;
        Ok(serde_json::to_string(&hash)?)
    }
}

impl Default for SerializerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SerializerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializerRegistry")
            .field("descriptors", &self.names())
            .field("config", &self.config)
            .field("routes", &self.routes.is_some())
            .finish()
    }
}
