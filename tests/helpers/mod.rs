//! Shared fixtures: a small movie catalogue.
//!
//! ```text
//! m1 Inception  actors [a1, a2]  owner u1    movie_type mt1
//! m2 Heat       actors [a1]      owner none  movie_type mt1
//! a1 played_movies [m1, m2]
//! a2 played_movies [m1]
//! ```
//!
//! Relations are held as weak references; [`Catalogue`] owns every record so
//! the actor <-> movie cycle does not leak.

#![allow(dead_code)]

use jsonapi_projection::{
    DescriptorBuilder, EngineConfig, Related, Relationship, Resource, ResourceRef,
    SerializerRegistry,
};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

enum Slot {
    One(Option<Weak<Record>>),
    Many(Vec<Weak<Record>>),
}

/// Generic record backed by a JSON object.
pub struct Record {
    type_name: String,
    attributes: Map<String, Value>,
    relations: Mutex<HashMap<String, Slot>>,
}

impl Record {
    pub fn new(type_name: &str, attributes: Value) -> Arc<Self> {
        let Value::Object(attributes) = attributes else {
            panic!("record attributes must be an object");
        };
        Arc::new(Self {
            type_name: type_name.to_string(),
            attributes,
            relations: Mutex::new(HashMap::new()),
        })
    }

    pub fn relate_one(&self, name: &str, target: Option<&Arc<Record>>) {
        self.relations
            .lock()
            .unwrap()
            .insert(name.to_string(), Slot::One(target.map(Arc::downgrade)));
    }

    pub fn relate_many(&self, name: &str, targets: &[&Arc<Record>]) {
        self.relations.lock().unwrap().insert(
            name.to_string(),
            Slot::Many(targets.iter().map(|t| Arc::downgrade(t)).collect()),
        );
    }
}

impl Resource for Record {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        self.attributes.get(name).cloned()
    }

    fn relation(&self, name: &str) -> Option<Related> {
        let relations = self.relations.lock().unwrap();
        relations.get(name).map(|slot| match slot {
            Slot::One(item) => Related::from(
                item.as_ref()
                    .and_then(Weak::upgrade)
                    .map(|r| r as ResourceRef),
            ),
            Slot::Many(items) => Related::Many(
                items
                    .iter()
                    .filter_map(Weak::upgrade)
                    .map(|r| r as ResourceRef)
                    .collect(),
            ),
        })
    }
}

/// Owner of every fixture record.
pub struct Catalogue {
    records: HashMap<&'static str, Arc<Record>>,
}

impl Catalogue {
    /// Record by id as a shared handle.
    pub fn get(&self, id: &str) -> ResourceRef {
        self.records[id].clone()
    }

    pub fn record(&self, id: &str) -> &Arc<Record> {
        &self.records[id]
    }
}

pub fn catalogue() -> Catalogue {
    let m1 = Record::new(
        "Movie",
        json!({
            "id": "m1",
            "name": "Inception",
            "release_year": 2010,
            "actor_ids": ["a1", "a2"],
            "owner_id": "u1",
            "movie_type_id": "mt1",
            "url": "http://movies.com/m1"
        }),
    );
    let m2 = Record::new(
        "Movie",
        json!({
            "id": "m2",
            "name": "Heat",
            "release_year": 1995,
            "actor_ids": ["a1"],
            "owner_id": null,
            "movie_type_id": "mt1",
            "url": "http://movies.com/m2"
        }),
    );
    let a1 = Record::new(
        "Actor",
        json!({
            "id": "a1",
            "first_name": "Ada",
            "last_name": "Lane",
            "email": "ada@example.com",
            "played_movie_ids": ["m1", "m2"],
            "bio_link": "https://www.imdb.com/name/nm0000098/"
        }),
    );
    let a2 = Record::new(
        "Actor",
        json!({
            "id": "a2",
            "first_name": "Bo",
            "last_name": "Reyes",
            "email": "bo@example.com",
            "played_movie_ids": ["m1"],
            "bio_link": "https://www.imdb.com/name/nm0000099/"
        }),
    );
    let u1 = Record::new("User", json!({"id": "u1", "name": "Ursula"}));
    let mt1 = Record::new("MovieType", json!({"id": "mt1", "name": "Feature"}));

    m1.relate_many("actors", &[&a1, &a2]);
    m1.relate_one("owner", Some(&u1));
    m1.relate_one("movie_type", Some(&mt1));
    m1.relate_many("polymorphs", &[&u1, &a1]);

    m2.relate_many("actors", &[&a1]);
    m2.relate_one("owner", None);
    m2.relate_one("movie_type", Some(&mt1));
    m2.relate_many("polymorphs", &[]);

    a1.relate_many("played_movies", &[&m1, &m2]);
    a2.relate_many("played_movies", &[&m1]);

    Catalogue {
        records: HashMap::from([
            ("m1", m1),
            ("m2", m2),
            ("a1", a1),
            ("a2", a2),
            ("u1", u1),
            ("mt1", mt1),
        ]),
    }
}

pub fn movie_builder() -> DescriptorBuilder {
    DescriptorBuilder::new("movie")
        .attributes(["name", "release_year"])
        .relationship(Relationship::has_many("actors"))
        .relationship(Relationship::belongs_to("owner").record_type("user"))
        .relationship(Relationship::belongs_to("movie_type"))
}

pub fn actor_builder() -> DescriptorBuilder {
    DescriptorBuilder::new("actor")
        .attributes(["first_name", "last_name", "email"])
        .relationship(Relationship::has_many("played_movies").serializer("movie"))
}

/// Registry holding `movie`, `actor`, `movie_type` and `user`.
pub fn registry_with(config: EngineConfig) -> SerializerRegistry {
    let mut registry = SerializerRegistry::with_config(config);
    registry.register(movie_builder().build().unwrap());
    registry.register(actor_builder().build().unwrap());
    registry.register(
        DescriptorBuilder::new("movie_type")
            .attributes(["name"])
            .build()
            .unwrap(),
    );
    registry.register(DescriptorBuilder::new("user").attributes(["name"]).build().unwrap());
    registry
}

pub fn registry() -> SerializerRegistry {
    registry_with(EngineConfig::default())
}

/// Sorted keys of a JSON object.
pub fn keys(value: &Value) -> Vec<String> {
    let mut keys: Vec<String> = value
        .as_object()
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default();
    keys.sort();
    keys
}

/// `{rel: self, system, type: GET, href}`
pub fn self_link(system: &str, href: &str) -> Value {
    json!({"rel": "self", "system": system, "type": "GET", "href": href})
}

/// Route log output to the test writer; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
