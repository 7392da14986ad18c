use index_registry::{
    ComponentLoader, ConfigurationResolver, FillContext, IndexCreator, IndexRegistry,
};
use serde_json::json;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: Arc<std::sync::Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Assert that the captured log output contains the provided substring.
    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }
}

struct TestWriter(Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.0.lock().unwrap();
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Creator that counts invocations and adds `docs` string-map values.
#[derive(Clone)]
pub struct CountingCreator {
    pub calls: Arc<AtomicUsize>,
    pub docs: usize,
    pub delay: Duration,
}

#[allow(dead_code)]
impl CountingCreator {
    pub fn new(docs: usize) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            docs,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl IndexCreator for CountingCreator {
    fn fill(&self, ctx: &mut FillContext<'_>) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        for i in 0..self.docs {
            ctx.add(&json!({ "id": format!("doc-{i}"), "text": "fixture" }))?;
        }
        Ok(())
    }
}

/// Creator that parks on `entered`/`release` so a test can observe the
/// registry mid-construction.
#[derive(Clone)]
pub struct GatedCreator {
    pub entered: Arc<Barrier>,
    pub release: Arc<Barrier>,
}

#[allow(dead_code)]
impl GatedCreator {
    pub fn new() -> Self {
        Self {
            entered: Arc::new(Barrier::new(2)),
            release: Arc::new(Barrier::new(2)),
        }
    }
}

impl IndexCreator for GatedCreator {
    fn fill(&self, _ctx: &mut FillContext<'_>) -> anyhow::Result<()> {
        self.entered.wait();
        self.release.wait();
        Ok(())
    }
}

/// Loader with builtins plus `creator` registered under `id`.
#[allow(dead_code)]
pub fn loader_with<C>(id: &str, creator: C) -> ComponentLoader
where
    C: IndexCreator + Clone + Sync + 'static,
{
    let mut loader = ComponentLoader::with_builtins();
    loader.register_creator(id, move || Ok(Box::new(creator.clone()) as Box<dyn IndexCreator>));
    loader
}

#[allow(dead_code)]
pub fn registry(tmp: &Path, loader: ComponentLoader) -> IndexRegistry {
    IndexRegistry::new(ConfigurationResolver::builtin(tmp), loader)
}
