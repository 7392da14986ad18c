//! Process-wide registry of named indexes.
//!
//! Lookups hit a read-locked table of published handles. A miss takes the
//! per-name construction claim, re-checks the table, and only then builds:
//! concurrent callers for the same name wait on the claim and observe the
//! winner's handle. Recreation and deletion run under the same claim, so a
//! name never has two live handles.
//!
//! Handles are published only after their lifecycle reached a terminal
//! state; [`IndexRegistry::list_indices`] never sees one mid-construction.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::components::{ComponentError, ComponentLoader};
use crate::config::{ConfigError, ConfigurationResolver, IndexProperties, RegistrySettings};
use crate::engine::{EngineConnection, EngineError};
use crate::index::{IndexHandle, lifecycle};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid index name {0:?}")]
    InvalidName(String),

    #[error("index '{name}': {source}")]
    ComponentResolution {
        name: String,
        #[source]
        source: ComponentError,
    },

    #[error("index '{name}': {source}")]
    Engine {
        name: String,
        #[source]
        source: EngineError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RegistryError {
    pub fn is_component_resolution(&self) -> bool {
        matches!(self, RegistryError::ComponentResolution { .. })
    }

    pub fn is_engine(&self) -> bool {
        matches!(self, RegistryError::Engine { .. })
    }
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

static GLOBAL: Lazy<IndexRegistry> = Lazy::new(|| {
    let settings = RegistrySettings::from_env();
    IndexRegistry::from_settings(&settings).unwrap_or_else(|e| {
        warn!(error = %e, "site configuration unusable, using built-in defaults");
        IndexRegistry::new(
            ConfigurationResolver::builtin(&settings.tmp_root),
            ComponentLoader::with_builtins(),
        )
    })
});

/// Map from index name to its handle, with at-most-one construction per name.
pub struct IndexRegistry {
    resolver: ConfigurationResolver,
    loader: ComponentLoader,
    published: RwLock<HashMap<String, Arc<IndexHandle>>>,
    claims: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl std::fmt::Debug for IndexRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<String> = self.published.read().keys().cloned().collect();
        names.sort_unstable();
        f.debug_struct("IndexRegistry")
            .field("indices", &names)
            .field("loader", &self.loader)
            .finish()
    }
}

impl IndexRegistry {
    /// Empty registry.
    pub fn new(resolver: ConfigurationResolver, loader: ComponentLoader) -> Self {
        Self {
            resolver,
            loader,
            published: RwLock::new(HashMap::new()),
            claims: Mutex::new(HashMap::new()),
        }
    }

    /// Registry with built-in defaults and components, deriving paths under `tmp_root`.
    pub fn with_builtins(tmp_root: impl Into<std::path::PathBuf>) -> Self {
        Self::new(
            ConfigurationResolver::builtin(tmp_root),
            ComponentLoader::with_builtins(),
        )
    }

    pub fn from_settings(settings: &RegistrySettings) -> RegistryResult<Self> {
        Ok(Self::new(
            ConfigurationResolver::from_settings(settings)?,
            ComponentLoader::with_builtins(),
        ))
    }

    /// Shared registry configured from the environment on first use.
    pub fn global() -> &'static IndexRegistry {
        &GLOBAL
    }

    pub fn resolver(&self) -> &ConfigurationResolver {
        &self.resolver
    }

    pub fn components(&self) -> &ComponentLoader {
        &self.loader
    }

    /// Existing handle for `name`, or build one from defaults.
    pub fn get_index(&self, name: &str) -> RegistryResult<Arc<IndexHandle>> {
        self.get_or_build(name, None)
    }

    /// Like [`get_index`](Self::get_index); `overrides` only apply when the
    /// index is built by this call.
    pub fn get_index_with(
        &self,
        name: &str,
        overrides: &IndexProperties,
    ) -> RegistryResult<Arc<IndexHandle>> {
        self.get_or_build(name, Some(overrides))
    }

    /// Drop any existing index for `name` (connection and data) and rebuild
    /// it with the configuration it had.
    pub fn get_new_index(&self, name: &str) -> RegistryResult<Arc<IndexHandle>> {
        validate_name(name)?;
        let claim = self.claim(name);
        let _guard = claim.lock();

        let previous = self.published.write().remove(name);
        let overrides = match previous {
            Some(old) => {
                info!(index = %name, connection = old.connection().id(), "recreating index");
                let captured = old.config().properties().clone();
                if let Err(source) = old.delete() {
                    self.release_claim(name, &claim);
                    return Err(RegistryError::Engine {
                        name: name.to_string(),
                        source,
                    });
                }
                Some(captured)
            }
            None => None,
        };

        let built = self.build_and_publish(name, overrides.as_ref());
        if built.is_err() {
            self.release_claim(name, &claim);
        }
        built
    }

    /// Remove `name`, release its connection and delete its data.
    /// Returns whether an entry existed.
    pub fn delete_index(&self, name: &str) -> RegistryResult<bool> {
        validate_name(name)?;
        let claim = self.claim(name);
        let _guard = claim.lock();

        let removed = self.published.write().remove(name);
        let outcome = match removed {
            Some(old) => {
                info!(index = %name, path = %old.path().display(), "deleting index");
                old.delete().map(|()| true).map_err(|source| RegistryError::Engine {
                    name: name.to_string(),
                    source,
                })
            }
            None => Ok(false),
        };
        self.release_claim(name, &claim);
        outcome
    }

    /// Point-in-time snapshot of published handles, sorted by name.
    pub fn list_indices(&self) -> Vec<Arc<IndexHandle>> {
        let mut handles: Vec<Arc<IndexHandle>> = self.published.read().values().cloned().collect();
        handles.sort_by(|a, b| a.name().cmp(b.name()));
        handles
    }

    /// Published handle for `name`, without building.
    pub fn lookup(&self, name: &str) -> Option<Arc<IndexHandle>> {
        self.published.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.published.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.published.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.published.read().is_empty()
    }

    fn get_or_build(
        &self,
        name: &str,
        overrides: Option<&IndexProperties>,
    ) -> RegistryResult<Arc<IndexHandle>> {
        if let Some(handle) = self.lookup(name) {
            return Ok(handle);
        }
        validate_name(name)?;

        let claim = self.claim(name);
        let _guard = claim.lock();
        if let Some(handle) = self.lookup(name) {
            debug!(index = %name, "index published while waiting for claim");
            return Ok(handle);
        }
        let built = self.build_and_publish(name, overrides);
        if built.is_err() {
            self.release_claim(name, &claim);
        }
        built
    }

    fn claim(&self, name: &str) -> Arc<Mutex<()>> {
        self.claims.lock().entry(name.to_string()).or_default().clone()
    }

    /// Forget the claim for a name left without a published handle.
    ///
    /// Caller must hold `claim` locked. The entry stays while another caller
    /// holds a clone; new clones are only handed out under the map lock.
    fn release_claim(&self, name: &str, claim: &Arc<Mutex<()>>) {
        let mut claims = self.claims.lock();
        let ours = claims.get(name).is_some_and(|c| Arc::ptr_eq(c, claim));
        if ours && Arc::strong_count(claim) == 2 {
            claims.remove(name);
        }
    }

    /// Caller must hold the claim for `name`.
    fn build_and_publish(
        &self,
        name: &str,
        overrides: Option<&IndexProperties>,
    ) -> RegistryResult<Arc<IndexHandle>> {
        let handle = Arc::new(self.build(name, overrides)?);
        self.published
            .write()
            .insert(name.to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    fn build(
        &self,
        name: &str,
        overrides: Option<&IndexProperties>,
    ) -> RegistryResult<IndexHandle> {
        let config = self.resolver.resolve(name, overrides);
        info!(index = %name, path = %config.path().display(), "creating index");

        let resolution = |source| RegistryError::ComponentResolution {
            name: name.to_string(),
            source,
        };
        let converter = self
            .loader
            .converter(config.converter_type_id())
            .map_err(resolution)?;
        let analyzer = config
            .analyzer_type_id()
            .map(|id| self.loader.analyzer(Some(id)))
            .transpose()
            .map_err(resolution)?;

        let connection =
            EngineConnection::open(config.path(), analyzer.as_deref()).map_err(|source| {
                RegistryError::Engine {
                    name: name.to_string(),
                    source,
                }
            })?;

        let handle = IndexHandle::new(config, connection);
        lifecycle::populate(&handle, &*converter, &self.loader);
        Ok(handle)
    }
}

fn validate_name(name: &str) -> RegistryResult<()> {
    let bad = name.trim().is_empty()
        || name.contains(['/', '\\'])
        || name == "."
        || name == "..";
    if bad {
        return Err(RegistryError::InvalidName(name.to_string()));
    }
    Ok(())
}
