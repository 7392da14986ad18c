//! Per-name index handles and their readiness state.
//!
//! ```text
//! Created ──► Filling ──► Ready
//!    │   └───────────────► Ready     (no creator configured)
//!    └──────────┴────────► Failed
//! ```
//!
//! `Ready` and `Failed` are terminal. Leaving them takes a full delete and
//! rebuild through the registry.

pub mod lifecycle;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;

use crate::config::IndexConfig;
use crate::engine::{EngineConnection, EngineError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IndexState {
    /// Engine connection open, population not attempted yet.
    Created,
    /// Creator is running.
    Filling,
    /// Population finished, or no creator configured.
    Ready,
    /// Creator could not be loaded or failed while filling.
    Failed { reason: String },
}

impl IndexState {
    pub fn is_ready(&self) -> bool {
        matches!(self, IndexState::Ready)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, IndexState::Failed { .. })
    }

    pub fn is_terminal(&self) -> bool {
        self.is_ready() || self.is_failed()
    }

    pub fn label(&self) -> &'static str {
        match self {
            IndexState::Created => "created",
            IndexState::Filling => "filling",
            IndexState::Ready => "ready",
            IndexState::Failed { .. } => "failed",
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            IndexState::Failed { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: &IndexState) -> bool {
        use IndexState::*;
        matches!(
            (self, next),
            (Created, Filling) | (Created, Ready) | (Filling, Ready) | (Created, Failed { .. })
                | (Filling, Failed { .. })
        )
    }
}

impl fmt::Display for IndexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexState::Failed { reason } => write!(f, "failed: {reason}"),
            other => f.write_str(other.label()),
        }
    }
}

#[derive(Debug, Error)]
#[error("invalid index state transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: &'static str,
    pub to: &'static str,
}

/// One registry entry: configuration, engine connection, lifecycle state.
#[derive(Debug)]
pub struct IndexHandle {
    config: IndexConfig,
    connection: EngineConnection,
    state: RwLock<IndexState>,
    documents_added: AtomicU64,
}

impl IndexHandle {
    pub(crate) fn new(config: IndexConfig, connection: EngineConnection) -> Self {
        Self {
            config,
            connection,
            state: RwLock::new(IndexState::Created),
            documents_added: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        self.config.name()
    }

    pub fn path(&self) -> &Path {
        self.config.path()
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn connection(&self) -> &EngineConnection {
        &self.connection
    }

    pub fn state(&self) -> IndexState {
        self.state.read().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.state.read().is_ready()
    }

    /// Documents added by the creator during population.
    pub fn documents_added(&self) -> u64 {
        self.documents_added.load(Ordering::Relaxed)
    }

    pub(crate) fn record_documents(&self, count: u64) {
        self.documents_added.store(count, Ordering::Relaxed);
    }

    pub(crate) fn transition(&self, next: IndexState) -> Result<(), InvalidTransition> {
        let mut state = self.state.write();
        if !state.can_transition_to(&next) {
            return Err(InvalidTransition {
                from: state.label(),
                to: next.label(),
            });
        }
        *state = next;
        Ok(())
    }

    /// Release the engine connection, then remove persisted data.
    pub(crate) fn delete(&self) -> Result<(), EngineError> {
        self.connection.destroy()
    }

    pub fn status(&self) -> IndexStatus {
        IndexStatus {
            name: self.name().to_string(),
            path: self.path().to_path_buf(),
            state: self.state(),
            converter: self.config.converter_type_id().map(str::to_string),
            creator: self.config.creator_type_id().map(str::to_string),
            analyzer: self.config.analyzer_type_id().map(str::to_string),
            documents_added: self.documents_added(),
            connection_id: self.connection.id(),
        }
    }
}

/// Serializable point-in-time view of a handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStatus {
    pub name: String,
    pub path: PathBuf,
    #[serde(flatten)]
    pub state: IndexState,
    pub converter: Option<String>,
    pub creator: Option<String>,
    pub analyzer: Option<String>,
    pub documents_added: u64,
    pub connection_id: u64,
}
