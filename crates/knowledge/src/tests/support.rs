//! Deterministic test doubles shared by the integration-style tests.

use crate::agent::{Router, RoutingContext, RoutingDecision};
use crate::chunker::{Chunker, ChunkingParams};
use crate::embeddings::providers::trigram::TrigramProvider;
use crate::embeddings::EmbeddingProvider;
use crate::extractors::MetadataExtractor;
use crate::loader::{DocumentLoader, DocumentSource, LoadLocation, SourceFile};
use crate::store::{FsMedium, IndexStore, PersistenceMedium};
use crate::trace::{ObservabilitySink, Outcome, TraceEvent};
use crate::types::DocumentUnit;
use async_trait::async_trait;
use docsage_core::{AppError, AppResult};
use docsage_llm::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
use std::collections::VecDeque;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const DIMENSIONS: usize = 64;

/// Write a small corpus of essays under `dir`.
pub fn write_corpus(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join("growing_up.txt"),
        "Before college the author wrote short stories and programmed an IBM 1401.\n\n\
         The stories were awful. They had hardly any plot, just characters with strong feelings.",
    )
    .unwrap();
    fs::write(
        dir.join("lisp.md"),
        "# Lisp\n\nIn college the author studied philosophy and then switched to AI.\n\n\
         Lisp was interesting for its own sake and the author decided to write a book about it.",
    )
    .unwrap();
    fs::write(
        dir.join("painting.txt"),
        "After grad school the author went to art school to study painting.\n\n\
         Painting still life was cheap because the subjects did not move.",
    )
    .unwrap();
}

/// Small chunks so every file yields several fragments.
pub fn small_chunker() -> Chunker {
    Chunker::new(ChunkingParams {
        chunk_size: 90,
        chunk_overlap: 0,
    })
    .unwrap()
}

/// A [`DocumentLoader`] that counts how often it is asked to discover and load.
#[derive(Default)]
pub struct CountingSource {
    inner: DocumentLoader,
    pub discovers: AtomicUsize,
    pub loads: AtomicUsize,
}

impl CountingSource {
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl DocumentSource for CountingSource {
    fn discover(&self, locations: &[LoadLocation]) -> AppResult<Vec<SourceFile>> {
        self.discovers.fetch_add(1, Ordering::SeqCst);
        self.inner.discover(locations)
    }

    fn load(&self, locations: &[LoadLocation]) -> AppResult<Vec<DocumentUnit>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load(locations)
    }
}

/// Trigram embeddings with a call counter.
#[derive(Debug)]
pub struct CountingEmbedder {
    inner: TrigramProvider,
    pub batches: AtomicUsize,
}

impl CountingEmbedder {
    pub fn new() -> Self {
        Self {
            inner: TrigramProvider::new(DIMENSIONS),
            batches: AtomicUsize::new(0),
        }
    }

    pub fn batch_count(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        // Widen the window for concurrent callers to overlap.
        tokio::task::yield_now().await;
        self.inner.embed_batch(texts).await
    }
}

/// Filesystem medium whose writes can be made to fail halfway through.
#[derive(Default)]
pub struct FlakyMedium {
    inner: FsMedium,
    pub fail_writes: AtomicBool,
    pub writes: AtomicUsize,
}

impl FlakyMedium {
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl PersistenceMedium for FlakyMedium {
    fn read(&self, location: &Path) -> AppResult<Option<Vec<u8>>> {
        self.inner.read(location)
    }

    fn write_atomic(&self, location: &Path, bytes: &[u8]) -> AppResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if !self.fail_writes.load(Ordering::SeqCst) {
            return self.inner.write_atomic(location, bytes);
        }
        self.inner.write_with(location, |file| {
            file.write_all(&bytes[..bytes.len() / 2])?;
            Err(io::Error::other("disk full"))
        })?;
        Ok(())
    }

    fn remove(&self, location: &Path) -> AppResult<()> {
        self.inner.remove(location)
    }
}

/// Store wired to counting doubles.
pub struct TestStore {
    pub store: IndexStore,
    pub source: Arc<CountingSource>,
    pub embedder: Arc<CountingEmbedder>,
    pub medium: Arc<FlakyMedium>,
}

impl TestStore {
    pub fn new() -> Self {
        let source = Arc::new(CountingSource::default());
        let embedder = Arc::new(CountingEmbedder::new());
        let medium = Arc::new(FlakyMedium::default());
        let store = IndexStore::new(
            Arc::clone(&source) as Arc<dyn DocumentSource>,
            small_chunker(),
            Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>,
        )
        .with_medium(Arc::clone(&medium) as Arc<dyn PersistenceMedium>)
        .with_batch_size(4);

        Self {
            store,
            source,
            embedder,
            medium,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ObservabilitySink>) -> Self {
        self.store = self.store.with_sink(sink);
        self
    }

    pub fn with_extractors(mut self, extractors: Vec<Arc<dyn MetadataExtractor>>) -> Self {
        self.store = self.store.with_extractors(extractors);
        self
    }
}

/// Sink that keeps every event it receives.
#[derive(Default)]
pub struct CollectingSink(Mutex<Vec<TraceEvent>>);

impl CollectingSink {
    pub fn events(&self) -> Vec<TraceEvent> {
        self.0.lock().unwrap().clone()
    }

    /// `(operation, outcome)` pairs in emission order.
    pub fn outcomes(&self) -> Vec<(&'static str, Outcome)> {
        self.events().iter().map(|e| (e.operation, e.outcome)).collect()
    }
}

impl ObservabilitySink for CollectingSink {
    fn record(&self, event: TraceEvent) {
        self.0.lock().unwrap().push(event);
    }
}

/// Completion double.
///
/// Scripted replies are returned first, in order. After that the reply is a
/// fixed function of the prompt, so streaming and non-streaming agree.
#[derive(Default)]
pub struct FakeLlm {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl FakeLlm {
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        let llm = Self::default();
        llm.fail.store(true, Ordering::SeqCst);
        llm
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn reply(&self, request: &LlmRequest) -> AppResult<String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Llm("connection refused".to_string()));
        }
        self.prompts.lock().unwrap().push(request.prompt.clone());
        if let Some(reply) = self.replies.lock().unwrap().pop_front() {
            return Ok(reply);
        }
        let words = request.prompt.split_whitespace().count();
        Ok(format!(
            "The context suggests an answer drawn from {} words of prompt.",
            words
        ))
    }
}

#[async_trait]
impl LlmClient for FakeLlm {
    fn provider_name(&self) -> &str {
        "fake"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let content = self.reply(request)?;
        Ok(LlmResponse {
            content,
            model: request.model.clone(),
            usage: LlmUsage::default(),
            done: true,
        })
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        let content = self.reply(request)?;
        let model = request.model.clone();
        let mut chunks: Vec<AppResult<LlmStreamChunk>> = content
            .split_inclusive(' ')
            .map(|word| {
                Ok(LlmStreamChunk {
                    content: word.to_string(),
                    model: model.clone(),
                    done: false,
                    usage: None,
                })
            })
            .collect();
        chunks.push(Ok(LlmStreamChunk {
            content: String::new(),
            model,
            done: true,
            usage: Some(LlmUsage::new(10, 10)),
        }));
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

/// Router that replays a fixed list of decisions and records what it saw.
#[derive(Default)]
pub struct ScriptedRouter {
    decisions: Mutex<VecDeque<RoutingDecision>>,
    /// `remaining_calls` observed on each decision
    pub budgets: Mutex<Vec<usize>>,
}

impl ScriptedRouter {
    pub fn new(decisions: Vec<RoutingDecision>) -> Self {
        Self {
            decisions: Mutex::new(decisions.into()),
            budgets: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Router for ScriptedRouter {
    async fn decide(&self, context: &RoutingContext<'_>) -> AppResult<RoutingDecision> {
        self.budgets.lock().unwrap().push(context.remaining_calls);
        self.decisions
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AppError::Agent("router script exhausted".to_string()))
    }
}
