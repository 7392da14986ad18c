//! Flat, dotted-key property tables.
//!
//! Keys look like `index.<name>.<attribute>`. Index names may themselves
//! contain dots or dashes (`ki-wiki-relatives`), so per-index lookups always go
//! through [`IndexProperties::attribute`] rather than splitting keys.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Prefix shared by every per-index key.
pub const KEY_PREFIX: &str = "index.";

/// Well-known per-index attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Path,
    ConverterClass,
    CreatorClass,
    AnalyzerClass,
}

impl Attribute {
    pub const ALL: [Attribute; 4] = [
        Attribute::Path,
        Attribute::ConverterClass,
        Attribute::CreatorClass,
        Attribute::AnalyzerClass,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::ConverterClass => "converterClass",
            Self::CreatorClass => "creatorClass",
            Self::AnalyzerClass => "analyzerClass",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the dotted key for `attribute` of index `name`.
pub fn index_key(name: &str, attribute: &str) -> String {
    format!("{KEY_PREFIX}{name}.{attribute}")
}

/// A layered-ready key/value table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexProperties {
    entries: BTreeMap<String, String>,
}

impl IndexProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Parse `key=value` assignments, as passed on the command line.
    pub fn from_assignments<S: AsRef<str>>(assignments: &[S]) -> Result<Self, ConfigError> {
        let mut props = Self::new();
        for raw in assignments {
            let raw = raw.as_ref();
            let (key, value) = raw
                .split_once('=')
                .ok_or_else(|| ConfigError::InvalidAssignment(raw.to_string()))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(ConfigError::InvalidAssignment(raw.to_string()));
            }
            props.set(key, value.trim());
        }
        Ok(props)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    /// Look up `index.<name>.<attribute>`. Blank values count as unset.
    pub fn attribute(&self, name: &str, attribute: &str) -> Option<&str> {
        self.get(&index_key(name, attribute))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn well_known(&self, name: &str, attribute: Attribute) -> Option<&str> {
        self.attribute(name, attribute.as_str())
    }

    /// Overlay `upper` on top of `self`; keys present in `upper` win whole.
    pub fn layered(&self, upper: &IndexProperties) -> IndexProperties {
        let mut merged = self.clone();
        merged.entries.extend(
            upper
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        merged
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for IndexProperties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}
