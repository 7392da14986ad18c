use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tantivy::schema::*;
use tantivy::{Index, IndexWriter, TantivyError, doc};
use tracing::debug;

use super::{EngineError, IndexDocument};
use crate::components::Analyzer;

/// Tokenizer used for `body` when no analyzer is configured.
const DEFAULT_TOKENIZER: &str = "default";

/// Writer heap; one indexing thread per connection keeps many open indexes cheap.
const WRITER_HEAP_BYTES: usize = 20_000_000;
const WRITER_THREADS: usize = 1;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy)]
pub struct Fields {
    pub id: Field,
    pub body: Field,
    pub payload: Field,
}

/// Exclusively owned connection to one on-disk tantivy index.
pub struct EngineConnection {
    id: u64,
    path: PathBuf,
    index: Index,
    fields: Fields,
    analyzer: Option<String>,
    writer: Mutex<Option<IndexWriter>>,
}

impl std::fmt::Debug for EngineConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConnection")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("analyzer", &self.analyzer)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl EngineConnection {
    /// Open the index at `path`, creating it if needed, with `analyzer`
    /// bound to the searchable text field.
    pub fn open(path: &Path, analyzer: Option<&dyn Analyzer>) -> Result<Self, EngineError> {
        std::fs::create_dir_all(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let open_err = |source| EngineError::Open {
            path: path.to_path_buf(),
            source,
        };

        let tokenizer = analyzer.map(|a| a.name()).unwrap_or(DEFAULT_TOKENIZER);
        let index = if path.join("meta.json").exists() {
            let index = Index::open_in_dir(path).map_err(open_err)?;
            let stored = body_tokenizer(&index.schema()).map_err(open_err)?;
            if stored != tokenizer {
                return Err(EngineError::AnalyzerMismatch {
                    path: path.to_path_buf(),
                    stored,
                    configured: tokenizer.to_string(),
                });
            }
            index
        } else {
            Index::create_in_dir(path, build_schema(tokenizer)).map_err(open_err)?
        };
        if let Some(analyzer) = analyzer {
            index
                .tokenizers()
                .register(analyzer.name(), analyzer.text_analyzer());
        }

        let fields = fields_from_schema(&index.schema()).map_err(open_err)?;
        let writer = index
            .writer_with_num_threads(WRITER_THREADS, WRITER_HEAP_BYTES)
            .map_err(open_err)?;

        let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
        debug!(connection = id, path = %path.display(), tokenizer, "opened engine connection");

        Ok(Self {
            id,
            path: path.to_path_buf(),
            index,
            fields,
            analyzer: analyzer.map(|a| a.name().to_string()),
            writer: Mutex::new(Some(writer)),
        })
    }

    /// Process-unique connection id.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn analyzer(&self) -> Option<&str> {
        self.analyzer.as_deref()
    }

    pub fn fields(&self) -> Fields {
        self.fields
    }

    /// Underlying engine index, for callers that query it.
    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn is_closed(&self) -> bool {
        self.writer.lock().is_none()
    }

    pub fn add_document(&self, document: &IndexDocument) -> Result<(), EngineError> {
        let payload = serde_json::to_string(&document.payload)?;
        let mut guard = self.writer.lock();
        let writer = guard.as_mut().ok_or(EngineError::Closed(self.id))?;
        writer.add_document(doc! {
            self.fields.id => document.id.clone(),
            self.fields.body => document.body.clone(),
            self.fields.payload => payload,
        })?;
        Ok(())
    }

    pub fn commit(&self) -> Result<(), EngineError> {
        let mut guard = self.writer.lock();
        let writer = guard.as_mut().ok_or(EngineError::Closed(self.id))?;
        writer.commit()?;
        Ok(())
    }

    /// Drop uncommitted documents.
    pub fn rollback(&self) -> Result<(), EngineError> {
        let mut guard = self.writer.lock();
        let writer = guard.as_mut().ok_or(EngineError::Closed(self.id))?;
        writer.rollback()?;
        Ok(())
    }

    /// Stage removal of every document. Visible after the next commit;
    /// a rollback restores the committed documents.
    pub fn delete_all(&self) -> Result<(), EngineError> {
        let mut guard = self.writer.lock();
        let writer = guard.as_mut().ok_or(EngineError::Closed(self.id))?;
        writer.delete_all_documents()?;
        Ok(())
    }

    /// Committed document count.
    pub fn num_docs(&self) -> Result<u64, EngineError> {
        if self.is_closed() {
            return Err(EngineError::Closed(self.id));
        }
        Ok(self.index.reader()?.searcher().num_docs())
    }

    /// Release the writer (and its directory lock). Idempotent.
    pub fn close(&self) -> Result<(), EngineError> {
        let writer = self.writer.lock().take();
        if let Some(writer) = writer {
            writer.wait_merging_threads()?;
            debug!(connection = self.id, path = %self.path.display(), "closed engine connection");
        }
        Ok(())
    }

    /// Close the connection, then remove its persisted data.
    pub fn destroy(&self) -> Result<(), EngineError> {
        self.close()?;
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(EngineError::Remove {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

pub fn build_schema(tokenizer: &str) -> Schema {
    let body_indexing = TextFieldIndexing::default()
        .set_tokenizer(tokenizer)
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    let body_options = TextOptions::default()
        .set_indexing_options(body_indexing)
        .set_stored();

    let mut schema_builder = Schema::builder();
    schema_builder.add_text_field("id", STRING | STORED);
    schema_builder.add_text_field("body", body_options);
    schema_builder.add_text_field("payload", STORED);
    schema_builder.build()
}

/// Tokenizer bound to `body` in an existing schema.
fn body_tokenizer(schema: &Schema) -> tantivy::Result<String> {
    let body = schema.get_field("body")?;
    let tokenizer = match schema.get_field_entry(body).field_type() {
        FieldType::Str(options) => options
            .get_indexing_options()
            .map(|indexing| indexing.tokenizer().to_string()),
        _ => None,
    };
    tokenizer.ok_or_else(|| TantivyError::SchemaError("field 'body' is not indexed text".into()))
}

pub fn fields_from_schema(schema: &Schema) -> tantivy::Result<Fields> {
    Ok(Fields {
        id: schema.get_field("id")?,
        body: schema.get_field("body")?,
        payload: schema.get_field("payload")?,
    })
}
