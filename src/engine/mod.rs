//! Text-indexing engine binding.
//!
//! The registry only opens, writes to, closes and destroys engine
//! connections. Querying is left to callers holding a handle.

pub mod tantivy;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use self::tantivy::EngineConnection;

/// Engine-level document produced by a converter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    /// Stable identifier, stored untokenized.
    pub id: String,
    /// Searchable text, tokenized with the index analyzer.
    pub body: String,
    /// Stored source value for rebuilds.
    pub payload: serde_json::Value,
}

impl IndexDocument {
    pub fn new(id: impl Into<String>, body: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
            payload,
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to prepare index directory {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to open index at {path}: {source}")]
    Open {
        path: PathBuf,
        source: ::tantivy::TantivyError,
    },

    #[error("Index at {path} was built with tokenizer '{stored}', not '{configured}'")]
    AnalyzerMismatch {
        path: PathBuf,
        stored: String,
        configured: String,
    },

    #[error("Index operation failed: {0}")]
    Index(#[from] ::tantivy::TantivyError),

    #[error("Failed to encode document payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Engine connection {0} is closed")]
    Closed(u64),

    #[error("Failed to remove index data at {path}: {source}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },
}
