//! Population of a freshly opened index.

use std::time::Instant;

use anyhow::Context;
use tracing::{error, info, warn};

use super::{IndexHandle, IndexState};
use crate::components::{ComponentLoader, Converter};
use crate::config::IndexConfig;
use crate::engine::IndexDocument;

/// What a creator sees while filling: the handle being built and the
/// converter resolved for it.
pub struct FillContext<'a> {
    handle: &'a IndexHandle,
    converter: &'a dyn Converter,
    added: u64,
}

impl<'a> FillContext<'a> {
    pub fn new(handle: &'a IndexHandle, converter: &'a dyn Converter) -> Self {
        Self {
            handle,
            converter,
            added: 0,
        }
    }

    pub fn handle(&self) -> &IndexHandle {
        self.handle
    }

    pub fn config(&self) -> &IndexConfig {
        self.handle.config()
    }

    pub fn converter(&self) -> &dyn Converter {
        self.converter
    }

    /// Convert `value` and add it to the index.
    pub fn add(&mut self, value: &serde_json::Value) -> anyhow::Result<()> {
        let document = self.converter.to_document(value).context("convert value")?;
        self.add_document(&document)
    }

    /// Add an already converted document.
    pub fn add_document(&mut self, document: &IndexDocument) -> anyhow::Result<()> {
        self.handle.connection().add_document(document)?;
        self.added += 1;
        Ok(())
    }

    pub fn added(&self) -> u64 {
        self.added
    }
}

fn advance(handle: &IndexHandle, next: IndexState) {
    if let Err(e) = handle.transition(next) {
        warn!(index = %handle.name(), error = %e, "ignored state transition");
    }
}

fn fail(handle: &IndexHandle, reason: String) {
    advance(handle, IndexState::Failed { reason });
}

/// Drive `handle` from `Created` to a terminal state.
///
/// Creator load and fill errors are logged and recorded as `Failed`; they are
/// not returned, because the handle exists either way.
pub fn populate(handle: &IndexHandle, converter: &dyn Converter, loader: &ComponentLoader) {
    let name = handle.name();
    let Some(creator_id) = handle.config().creator_type_id() else {
        info!(index = %name, "no creator configured, index ready");
        advance(handle, IndexState::Ready);
        return;
    };

    let creator = match loader.creator(Some(creator_id)) {
        Ok(creator) => creator,
        Err(e) => {
            error!(index = %name, creator = creator_id, error = %e, "could not load index creator");
            fail(handle, e.to_string());
            return;
        }
    };

    info!(index = %name, creator = creator_id, "filling index");
    advance(handle, IndexState::Filling);
    let start = Instant::now();

    // Contents left by an earlier build at this path are replaced, not appended to.
    let mut ctx = FillContext::new(handle, converter);
    let outcome = handle
        .connection()
        .delete_all()
        .context("clear previous contents")
        .and_then(|()| creator.fill(&mut ctx))
        .and_then(|()| handle.connection().commit().context("commit"));
    let added = ctx.added();

    match outcome {
        Ok(()) => {
            handle.record_documents(added);
            advance(handle, IndexState::Ready);
            info!(
                index = %name,
                documents = added,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "index filled"
            );
        }
        Err(e) => {
            error!(
                index = %name,
                creator = creator_id,
                error = %format!("{e:#}"),
                "could not fill index"
            );
            if let Err(rollback) = handle.connection().rollback() {
                warn!(index = %name, error = %rollback, "rollback after failed fill");
            }
            fail(handle, format!("{e:#}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::IndexCreator;
    use crate::components::converters::StringMapConverter;
    use crate::config::{ConfigurationResolver, IndexProperties};
    use crate::engine::EngineConnection;
    use serde_json::json;

    struct TwoThenFail;

    impl IndexCreator for TwoThenFail {
        fn fill(&self, ctx: &mut FillContext<'_>) -> anyhow::Result<()> {
            ctx.add(&json!({ "id": "a" }))?;
            ctx.add(&json!({ "id": "b" }))?;
            anyhow::bail!("source went away")
        }
    }

    struct Three;

    impl IndexCreator for Three {
        fn fill(&self, ctx: &mut FillContext<'_>) -> anyhow::Result<()> {
            for i in 0..3 {
                ctx.add(&json!({ "id": format!("doc-{i}") }))?;
            }
            Ok(())
        }
    }

    fn handle_with_creator(tmp: &std::path::Path, creator: Option<&str>) -> IndexHandle {
        let mut overrides = IndexProperties::from_pairs([("index.t.converterClass", "string-map")]);
        if let Some(c) = creator {
            overrides.set("index.t.creatorClass", c);
        }
        let config = ConfigurationResolver::builtin(tmp).resolve("t", Some(&overrides));
        let connection = EngineConnection::open(config.path(), None).unwrap();
        IndexHandle::new(config, connection)
    }

    fn loader() -> ComponentLoader {
        let mut loader = ComponentLoader::with_builtins();
        loader
            .register_creator("three", || Ok(Box::new(Three) as Box<dyn IndexCreator>))
            .register_creator("two-then-fail", || {
                Ok(Box::new(TwoThenFail) as Box<dyn IndexCreator>)
            });
        loader
    }

    #[test]
    fn no_creator_is_ready_immediately() {
        let tmp = tempfile::tempdir().unwrap();
        let handle = handle_with_creator(tmp.path(), None);
        populate(&handle, &StringMapConverter, &loader());
        assert_eq!(handle.state(), IndexState::Ready);
        assert_eq!(handle.documents_added(), 0);
    }

    #[test]
    fn successful_fill_commits_and_counts() {
        let tmp = tempfile::tempdir().unwrap();
        let handle = handle_with_creator(tmp.path(), Some("three"));
        populate(&handle, &StringMapConverter, &loader());
        assert!(handle.is_ready());
        assert_eq!(handle.documents_added(), 3);
        assert_eq!(handle.connection().num_docs().unwrap(), 3);
    }

    #[test]
    fn failing_fill_rolls_back_and_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let handle = handle_with_creator(tmp.path(), Some("two-then-fail"));
        populate(&handle, &StringMapConverter, &loader());
        let state = handle.state();
        assert!(state.is_failed());
        assert!(state.failure_reason().unwrap().contains("source went away"));
        assert_eq!(handle.documents_added(), 0);

        handle.connection().commit().unwrap();
        assert_eq!(handle.connection().num_docs().unwrap(), 0);
    }

    #[test]
    fn refill_replaces_committed_documents() {
        let tmp = tempfile::tempdir().unwrap();
        let loader = loader();
        let first = handle_with_creator(tmp.path(), Some("three"));
        populate(&first, &StringMapConverter, &loader);
        first.connection().close().unwrap();

        let second = handle_with_creator(tmp.path(), Some("three"));
        assert_eq!(second.connection().num_docs().unwrap(), 3);
        populate(&second, &StringMapConverter, &loader);
        assert!(second.is_ready());
        assert_eq!(second.documents_added(), 3);
        assert_eq!(second.connection().num_docs().unwrap(), 3);
    }

    #[test]
    fn failed_refill_keeps_previous_documents() {
        let tmp = tempfile::tempdir().unwrap();
        let loader = loader();
        let first = handle_with_creator(tmp.path(), Some("three"));
        populate(&first, &StringMapConverter, &loader);
        first.connection().close().unwrap();

        let second = handle_with_creator(tmp.path(), Some("two-then-fail"));
        populate(&second, &StringMapConverter, &loader);
        assert!(second.state().is_failed());
        second.connection().commit().unwrap();
        assert_eq!(second.connection().num_docs().unwrap(), 3);
    }

    #[test]
    fn unknown_creator_fails_without_filling() {
        let tmp = tempfile::tempdir().unwrap();
        let handle = handle_with_creator(tmp.path(), Some("nowhere"));
        populate(&handle, &StringMapConverter, &loader());
        let reason = handle.state().failure_reason().unwrap().to_string();
        assert!(reason.contains("unknown creator 'nowhere'"), "{reason}");
    }

    #[test]
    fn conversion_error_fails_fill() {
        struct BadValue;
        impl IndexCreator for BadValue {
            fn fill(&self, ctx: &mut FillContext<'_>) -> anyhow::Result<()> {
                ctx.add(&json!({ "count": 1 }))
            }
        }
        let tmp = tempfile::tempdir().unwrap();
        let handle = handle_with_creator(tmp.path(), Some("bad"));
        let mut loader = loader();
        loader.register_creator("bad", || Ok(Box::new(BadValue) as Box<dyn IndexCreator>));
        populate(&handle, &StringMapConverter, &loader);
        let reason = handle.state().failure_reason().unwrap().to_string();
        assert!(reason.contains("convert value"), "{reason}");
    }
}
