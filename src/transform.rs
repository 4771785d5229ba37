//! Key transforms and inflection.
//!
//! Both are pure functions applied while a descriptor is built, never per
//! call.

use heck::{ToKebabCase, ToLowerCamelCase, ToSnakeCase, ToUpperCamelCase};
use serde::{Deserialize, Serialize};

/// Output key casing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyTransform {
    /// `first_name` -> `FirstName`
    Camel,
    /// `first_name` -> `firstName`
    CamelLower,
    /// `first_name` -> `first-name`
    Dash,
    /// `FirstName` -> `first_name`
    Underscore,
    /// Keys are emitted as declared.
    #[default]
    None,
}

impl KeyTransform {
    /// Apply the transform to one key.
    pub fn apply(self, key: &str) -> String {
        match self {
            Self::Camel => key.to_upper_camel_case(),
            Self::CamelLower => key.to_lower_camel_case(),
            Self::Dash => key.to_kebab_case(),
            Self::Underscore => key.to_snake_case(),
            Self::None => key.to_string(),
        }
    }
}

/// Pluggable pluralize / singularize rules.
#[derive(Clone, Copy, Debug)]
pub struct Inflector {
    /// Plural form of a type name (`movie` -> `movies`).
    pub pluralize: fn(&str) -> String,
    /// Singular form of a relation name (`actors` -> `actor`).
    pub singularize: fn(&str) -> String,
}

impl Default for Inflector {
    fn default() -> Self {
        Self {
            pluralize: english_pluralize,
            singularize: english_singularize,
        }
    }
}

/// Minimal English pluralization.
pub fn english_pluralize(word: &str) -> String {
    if word.is_empty() || (word.ends_with('s') && !word.ends_with("ss")) {
        return word.to_string();
    }
    if let Some(stem) = word.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            return format!("{stem}ies");
        }
    }
    if word.ends_with("ss") || word.ends_with('x') || word.ends_with("ch") || word.ends_with("sh") {
        return format!("{word}es");
    }
    format!("{word}s")
}

/// Nouns whose singular ends in `ie` rather than `y`.
const IE_SINGULARS: &[&str] = &[
    "brownie", "calorie", "cookie", "die", "genie", "hippie", "lie", "movie", "pie",
    "prairie", "rookie", "selfie", "tie", "zombie",
];

/// Minimal English singularization.
///
/// Covers regular plurals and the `-ie` nouns in `IE_SINGULARS`. Anything
/// irregular beyond that needs a custom [`Inflector`].
pub fn english_singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        let singular = format!("{stem}ie");
        let last_word = singular.rsplit('_').next().unwrap_or(&singular);
        if IE_SINGULARS.contains(&last_word) {
            return singular;
        }
        return format!("{stem}y");
    }
    for suffix in ["sses", "xes", "ches", "shes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.ends_with("ss") {
        return word.to_string();
    }
    word.strip_suffix('s').unwrap_or(word).to_string()
}
