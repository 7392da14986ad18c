//! Pluggable index components selected by string identifier.
//!
//! Three capability families are configurable per index:
//!
//! | Family | Config attribute | Role |
//! |--------|------------------|------|
//! | [`Converter`] | `converterClass` | domain value ⇄ engine document |
//! | [`IndexCreator`] | `creatorClass` | enumerates domain values into a fresh index |
//! | [`Analyzer`] | `analyzerClass` | tokenization of searchable text |
//!
//! [`ComponentLoader`] maps identifiers to factories. It is filled once at
//! startup ([`ComponentLoader::with_builtins`] plus any application
//! registrations) and then shared read-only by the registry.

pub mod analyzers;
pub mod converters;
pub mod creators;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::engine::IndexDocument;
use crate::index::lifecycle::FillContext;

/// Maps one domain value to an engine document and back.
pub trait Converter: Send + Sync {
    fn to_document(&self, value: &serde_json::Value) -> anyhow::Result<IndexDocument>;

    /// Recover the domain value from a stored document.
    fn from_document(&self, document: &IndexDocument) -> anyhow::Result<serde_json::Value>;
}

/// Populates a freshly opened index.
pub trait IndexCreator: Send {
    /// Feed every domain value for `ctx.handle()` through `ctx.add`.
    /// Runs to completion on the constructing thread.
    fn fill(&self, ctx: &mut FillContext<'_>) -> anyhow::Result<()>;
}

/// Tokenization policy bound to an engine connection.
pub trait Analyzer: Send + Sync {
    /// Name the tokenizer is registered under in the engine.
    fn name(&self) -> &str;

    fn text_analyzer(&self) -> tantivy::tokenizer::TextAnalyzer;
}

pub type Factory<T> = Arc<dyn Fn() -> anyhow::Result<Box<T>> + Send + Sync>;
pub type ConverterFactory = Factory<dyn Converter>;
pub type CreatorFactory = Factory<dyn IndexCreator>;
pub type AnalyzerFactory = Factory<dyn Analyzer>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Converter,
    Creator,
    Analyzer,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 3] = [
        ComponentKind::Converter,
        ComponentKind::Creator,
        ComponentKind::Analyzer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Converter => "converter",
            Self::Creator => "creator",
            Self::Analyzer => "analyzer",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure to turn an identifier into a live component.
#[derive(Debug, Error)]
pub enum ComponentError {
    #[error("no {kind} configured")]
    Missing { kind: ComponentKind },

    #[error("unknown {kind} '{id}'. Available: {available}")]
    Unknown {
        kind: ComponentKind,
        id: String,
        available: String,
    },

    #[error("'{id}' is registered as a {actual}, not a {expected}")]
    CapabilityMismatch {
        id: String,
        expected: ComponentKind,
        actual: ComponentKind,
    },

    #[error("failed to construct {kind} '{id}': {source:#}")]
    Construction {
        kind: ComponentKind,
        id: String,
        source: anyhow::Error,
    },
}

impl ComponentError {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Self::Missing { kind }
            | Self::Unknown { kind, .. }
            | Self::Construction { kind, .. } => *kind,
            Self::CapabilityMismatch { expected, .. } => *expected,
        }
    }
}

/// Typed registry of component factories keyed by identifier.
#[derive(Clone, Default)]
pub struct ComponentLoader {
    converters: HashMap<String, ConverterFactory>,
    creators: HashMap<String, CreatorFactory>,
    analyzers: HashMap<String, AnalyzerFactory>,
}

impl fmt::Debug for ComponentLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentLoader")
            .field("converters", &self.ids(ComponentKind::Converter))
            .field("creators", &self.ids(ComponentKind::Creator))
            .field("analyzers", &self.ids(ComponentKind::Analyzer))
            .finish()
    }
}

impl ComponentLoader {
    /// Loader with no registrations.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loader with every built-in converter, creator and analyzer.
    pub fn with_builtins() -> Self {
        let mut loader = Self::empty();
        converters::register_builtins(&mut loader);
        creators::register_builtins(&mut loader);
        analyzers::register_builtins(&mut loader);
        loader
    }

    pub fn register_converter<F>(&mut self, id: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> anyhow::Result<Box<dyn Converter>> + Send + Sync + 'static,
    {
        self.converters.insert(id.into(), Arc::new(factory));
        self
    }

    pub fn register_creator<F>(&mut self, id: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> anyhow::Result<Box<dyn IndexCreator>> + Send + Sync + 'static,
    {
        self.creators.insert(id.into(), Arc::new(factory));
        self
    }

    pub fn register_analyzer<F>(&mut self, id: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> anyhow::Result<Box<dyn Analyzer>> + Send + Sync + 'static,
    {
        self.analyzers.insert(id.into(), Arc::new(factory));
        self
    }

    /// Register a default-constructible converter type.
    pub fn register_default_converter<T>(&mut self, id: impl Into<String>) -> &mut Self
    where
        T: Converter + Default + 'static,
    {
        self.register_converter(id, || Ok(Box::new(T::default()) as Box<dyn Converter>))
    }

    /// Register a default-constructible creator type.
    pub fn register_default_creator<T>(&mut self, id: impl Into<String>) -> &mut Self
    where
        T: IndexCreator + Default + 'static,
    {
        self.register_creator(id, || Ok(Box::new(T::default()) as Box<dyn IndexCreator>))
    }

    /// Register a default-constructible analyzer type.
    pub fn register_default_analyzer<T>(&mut self, id: impl Into<String>) -> &mut Self
    where
        T: Analyzer + Default + 'static,
    {
        self.register_analyzer(id, || Ok(Box::new(T::default()) as Box<dyn Analyzer>))
    }

    pub fn converter(&self, id: Option<&str>) -> Result<Box<dyn Converter>, ComponentError> {
        self.instantiate(ComponentKind::Converter, &self.converters, id)
    }

    pub fn creator(&self, id: Option<&str>) -> Result<Box<dyn IndexCreator>, ComponentError> {
        self.instantiate(ComponentKind::Creator, &self.creators, id)
    }

    pub fn analyzer(&self, id: Option<&str>) -> Result<Box<dyn Analyzer>, ComponentError> {
        self.instantiate(ComponentKind::Analyzer, &self.analyzers, id)
    }

    pub fn contains(&self, kind: ComponentKind, id: &str) -> bool {
        match kind {
            ComponentKind::Converter => self.converters.contains_key(id),
            ComponentKind::Creator => self.creators.contains_key(id),
            ComponentKind::Analyzer => self.analyzers.contains_key(id),
        }
    }

    /// Registered identifiers for one family, sorted.
    pub fn ids(&self, kind: ComponentKind) -> Vec<&str> {
        let mut ids: Vec<&str> = match kind {
            ComponentKind::Converter => self.converters.keys().map(String::as_str).collect(),
            ComponentKind::Creator => self.creators.keys().map(String::as_str).collect(),
            ComponentKind::Analyzer => self.analyzers.keys().map(String::as_str).collect(),
        };
        ids.sort_unstable();
        ids
    }

    fn instantiate<T: ?Sized>(
        &self,
        kind: ComponentKind,
        table: &HashMap<String, Factory<T>>,
        id: Option<&str>,
    ) -> Result<Box<T>, ComponentError> {
        let id = id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(ComponentError::Missing { kind })?;

        let Some(factory) = table.get(id) else {
            if let Some(actual) = ComponentKind::ALL
                .into_iter()
                .find(|k| *k != kind && self.contains(*k, id))
            {
                return Err(ComponentError::CapabilityMismatch {
                    id: id.to_string(),
                    expected: kind,
                    actual,
                });
            }
            return Err(ComponentError::Unknown {
                kind,
                id: id.to_string(),
                available: self.ids(kind).join(", "),
            });
        };

        factory().map_err(|source| ComponentError::Construction {
            kind,
            id: id.to_string(),
            source,
        })
    }
}
