//! Layered index configuration.
//!
//! Effective configuration for one index name is built from three layers,
//! lowest first:
//!
//! 1. the built-in default table ([`defaults`]),
//! 2. an optional site file ([`file`]),
//! 3. caller-supplied overrides.
//!
//! Every key resolves independently: the highest layer that defines it wins.

pub mod defaults;
pub mod file;
pub mod properties;

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

pub use defaults::{DEFAULT_INDICES, DefaultIndex, default_properties};
pub use properties::{Attribute, IndexProperties, KEY_PREFIX, index_key};

/// Environment variable naming the directory used for derived index paths.
pub const TMP_ROOT_ENV: &str = "INDEX_REGISTRY_TMP_ROOT";
/// Environment variable naming a TOML site configuration file.
pub const CONFIG_FILE_ENV: &str = "INDEX_REGISTRY_CONFIG";
/// File name looked up in the platform config dir when no file is named.
pub const DEFAULT_CONFIG_FILE: &str = "indexes.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Unsupported {kind} value for key {key}")]
    UnsupportedValue { key: String, kind: &'static str },

    #[error("Expected key=value, got {0:?}")]
    InvalidAssignment(String),
}

/// Process-level settings for a registry.
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    /// Root for derived `index.<name>.index` paths.
    pub tmp_root: PathBuf,
    /// Optional TOML file layered over the built-in defaults.
    pub config_file: Option<PathBuf>,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            tmp_root: std::env::temp_dir(),
            config_file: None,
        }
    }
}

impl RegistrySettings {
    /// Load settings from environment variables.
    ///
    /// Falls back to `<platform config dir>/indexes.toml` when it exists and
    /// `INDEX_REGISTRY_CONFIG` is unset.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(root) = dotenvy::var(TMP_ROOT_ENV)
            && !root.trim().is_empty()
        {
            cfg.tmp_root = PathBuf::from(root);
        }

        cfg.config_file = match dotenvy::var(CONFIG_FILE_ENV) {
            Ok(path) if !path.trim().is_empty() => Some(PathBuf::from(path)),
            _ => default_config_path().filter(|p| p.is_file()),
        };

        cfg
    }

    pub fn with_tmp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.tmp_root = root.into();
        self
    }

    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "index-registry", "index-registry")
        .map(|dirs| dirs.config_dir().join(DEFAULT_CONFIG_FILE))
}

/// Derived location used when no `path` attribute is configured.
pub fn derived_index_path(tmp_root: &Path, name: &str) -> PathBuf {
    tmp_root.join(format!("{KEY_PREFIX}{name}.index"))
}

/// Per-index effective configuration.
///
/// Immutable once bound to a handle; a configuration change needs a new
/// handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexConfig {
    name: String,
    path: PathBuf,
    properties: IndexProperties,
    converter_type_id: Option<String>,
    analyzer_type_id: Option<String>,
    creator_type_id: Option<String>,
}

impl IndexConfig {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The full layered mapping, including entries for other names.
    pub fn properties(&self) -> &IndexProperties {
        &self.properties
    }

    /// Secondary lookup of `index.<name>.<attribute>` for this index.
    pub fn attribute(&self, attribute: &str) -> Option<&str> {
        self.properties.attribute(&self.name, attribute)
    }

    /// Converter identifier. Required, but validated by the component loader
    /// so that an absent value surfaces as a resolution error.
    pub fn converter_type_id(&self) -> Option<&str> {
        self.converter_type_id.as_deref()
    }

    pub fn analyzer_type_id(&self) -> Option<&str> {
        self.analyzer_type_id.as_deref()
    }

    pub fn creator_type_id(&self) -> Option<&str> {
        self.creator_type_id.as_deref()
    }
}

/// Merges built-in defaults, the site layer and caller overrides.
#[derive(Debug, Clone)]
pub struct ConfigurationResolver {
    base: IndexProperties,
    tmp_root: PathBuf,
}

impl ConfigurationResolver {
    /// Resolver over the built-in default table only.
    pub fn builtin(tmp_root: impl Into<PathBuf>) -> Self {
        Self {
            base: default_properties(),
            tmp_root: tmp_root.into(),
        }
    }

    /// Resolver for the given settings, reading the site file if one is set.
    pub fn from_settings(settings: &RegistrySettings) -> Result<Self, ConfigError> {
        let resolver = Self::builtin(&settings.tmp_root);
        match &settings.config_file {
            Some(path) => Ok(resolver.with_layer(&file::load_properties_file(path)?)),
            None => Ok(resolver),
        }
    }

    /// Add a layer between the current base and caller overrides.
    pub fn with_layer(mut self, layer: &IndexProperties) -> Self {
        self.base = self.base.layered(layer);
        self
    }

    pub fn base(&self) -> &IndexProperties {
        &self.base
    }

    pub fn tmp_root(&self) -> &Path {
        &self.tmp_root
    }

    /// Effective configuration for `name`. Pure: no I/O, no shared state.
    pub fn resolve(&self, name: &str, overrides: Option<&IndexProperties>) -> IndexConfig {
        let properties = match overrides {
            Some(o) => self.base.layered(o),
            None => self.base.clone(),
        };

        let path = properties
            .well_known(name, Attribute::Path)
            .map(PathBuf::from)
            .unwrap_or_else(|| derived_index_path(&self.tmp_root, name));
        let lookup = |attr| properties.well_known(name, attr).map(str::to_string);

        IndexConfig {
            name: name.to_string(),
            path,
            converter_type_id: lookup(Attribute::ConverterClass),
            analyzer_type_id: lookup(Attribute::AnalyzerClass),
            creator_type_id: lookup(Attribute::CreatorClass),
            properties,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn resolver() -> ConfigurationResolver {
        ConfigurationResolver::builtin("/tmp-root")
    }

    #[test]
    fn known_name_uses_default_table() {
        let cfg = resolver().resolve("orga", None);
        assert_eq!(cfg.converter_type_id(), Some("task"));
        assert_eq!(cfg.creator_type_id(), Some("task"));
        assert_eq!(cfg.analyzer_type_id(), None);
        assert_eq!(cfg.path(), Path::new("/tmp-root/index.orga.index"));
    }

    #[test]
    fn unknown_name_has_only_caller_keys() {
        let overrides = IndexProperties::from_pairs([("index.fresh.converterClass", "noop")]);
        let cfg = resolver().resolve("fresh", Some(&overrides));
        assert_eq!(cfg.converter_type_id(), Some("noop"));
        assert_eq!(cfg.creator_type_id(), None);
        assert_eq!(cfg.path(), Path::new("/tmp-root/index.fresh.index"));

        let bare = resolver().resolve("fresh", None);
        assert_eq!(bare.converter_type_id(), None);
    }

    #[test]
    fn overrides_win_per_key() {
        let overrides = IndexProperties::from_pairs([
            ("index.orga.creatorClass", "json-lines"),
            ("index.orga.path", "/data/orga"),
        ]);
        let cfg = resolver().resolve("orga", Some(&overrides));
        assert_eq!(cfg.creator_type_id(), Some("json-lines"));
        assert_eq!(cfg.converter_type_id(), Some("task"));
        assert_eq!(cfg.path(), Path::new("/data/orga"));
    }

    #[test]
    fn resolution_is_deterministic() {
        let overrides = IndexProperties::from_pairs([("index.x.path", "/x")]);
        let r = resolver();
        assert_eq!(r.resolve("x", Some(&overrides)), r.resolve("x", Some(&overrides)));
    }

    #[test]
    fn resolving_captured_properties_is_a_fixed_point() {
        let overrides = IndexProperties::from_pairs([("index.orga.analyzerClass", "english")]);
        let r = resolver();
        let first = r.resolve("orga", Some(&overrides));
        let second = r.resolve("orga", Some(first.properties()));
        assert_eq!(first, second);
    }

    #[test]
    fn site_layer_sits_between_defaults_and_overrides() {
        let site = IndexProperties::from_pairs([
            ("index.orga.path", "/site/orga"),
            ("index.orga.analyzerClass", "english"),
        ]);
        let r = resolver().with_layer(&site);
        let cfg = r.resolve("orga", None);
        assert_eq!(cfg.path(), Path::new("/site/orga"));
        assert_eq!(cfg.converter_type_id(), Some("task"));

        let overrides = IndexProperties::from_pairs([("index.orga.path", "/caller")]);
        let cfg = r.resolve("orga", Some(&overrides));
        assert_eq!(cfg.path(), Path::new("/caller"));
        assert_eq!(cfg.analyzer_type_id(), Some("english"));
    }

    #[test]
    fn secondary_attribute_lookup() {
        let overrides = IndexProperties::from_pairs([("index.feed.source", "/data/feed.jsonl")]);
        let cfg = resolver().resolve("feed", Some(&overrides));
        assert_eq!(cfg.attribute("source"), Some("/data/feed.jsonl"));
        assert_eq!(cfg.attribute("missing"), None);
    }

    #[test]
    #[serial]
    fn settings_from_env() {
        let tmp = tempfile::tempdir().unwrap();
        let site = tmp.path().join("site.toml");
        std::fs::write(&site, "[index.orga]\npath = \"/from/site\"\n").unwrap();

        unsafe {
            std::env::set_var(TMP_ROOT_ENV, tmp.path());
            std::env::set_var(CONFIG_FILE_ENV, &site);
        }
        let settings = RegistrySettings::from_env();
        unsafe {
            std::env::remove_var(TMP_ROOT_ENV);
            std::env::remove_var(CONFIG_FILE_ENV);
        }

        assert_eq!(settings.tmp_root, tmp.path());
        assert_eq!(settings.config_file.as_deref(), Some(site.as_path()));

        let r = ConfigurationResolver::from_settings(&settings).unwrap();
        assert_eq!(r.resolve("orga", None).path(), Path::new("/from/site"));
        assert_eq!(
            r.resolve("tag-names", None).path(),
            tmp.path().join("index.tag-names.index")
        );
    }

    #[test]
    fn missing_site_file_is_an_error() {
        let settings = RegistrySettings::default().with_config_file("/definitely/not/here.toml");
        assert!(matches!(
            ConfigurationResolver::from_settings(&settings),
            Err(ConfigError::ReadFile { .. })
        ));
    }
}
