//! Built-in index creators.
//!
//! Domain-specific creators named by the default table (`schema`, `task`,
//! `tags`, ...) are registered by the embedding application.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use super::{ComponentLoader, IndexCreator};
use crate::index::lifecycle::FillContext;

pub const NOOP: &str = "noop";
pub const JSON_LINES: &str = "json-lines";

/// Attribute naming the input file of [`JsonLinesCreator`].
pub const SOURCE_ATTRIBUTE: &str = "source";

pub(super) fn register_builtins(loader: &mut ComponentLoader) {
    loader
        .register_default_creator::<NoopCreator>(NOOP)
        .register_default_creator::<JsonLinesCreator>(JSON_LINES);
}

/// Adds nothing; the index is ready empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCreator;

impl IndexCreator for NoopCreator {
    fn fill(&self, _ctx: &mut FillContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// Reads one JSON domain value per line from `index.<name>.source`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonLinesCreator;

impl IndexCreator for JsonLinesCreator {
    fn fill(&self, ctx: &mut FillContext<'_>) -> Result<()> {
        let source = ctx
            .config()
            .attribute(SOURCE_ATTRIBUTE)
            .map(PathBuf::from)
            .with_context(|| {
                format!(
                    "index '{}' has no '{SOURCE_ATTRIBUTE}' attribute",
                    ctx.config().name()
                )
            })?;
        let file = File::open(&source)
            .with_context(|| format!("open source {}", source.display()))?;

        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("read {}", source.display()))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let value: serde_json::Value = serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid JSON", source.display(), lineno + 1))?;
            ctx.add(&value)
                .with_context(|| format!("{}:{}", source.display(), lineno + 1))?;
        }
        debug!(source = %source.display(), added = ctx.added(), "json-lines source consumed");
        Ok(())
    }
}
