//! Index store: the cache-or-build lifecycle for named indexes.
//!
//! `open_or_build` first tries the persisted copy at the requested location.
//! A copy that is missing is a plain cache miss; a copy that exists but cannot
//! be used (corrupt, wrong version, different embedding space, stale sources)
//! is a cache miss logged at `warn`. Either way the index is rebuilt from the
//! sources and persisted before the handle is returned.
//!
//! Builds are serialized per index id, so concurrent callers for an index
//! that was never built produce exactly one build.

use crate::chunker::{Chunker, ChunkingParams};
use crate::embeddings::{embed_in_batches, EmbeddingIdentity, EmbeddingProvider};
use crate::extractors::{self, MetadataExtractor};
use crate::loader::{fingerprint, DocumentSource, LoadLocation};
use crate::progress::{BuildPhase, ProgressReporter};
use crate::trace::{self, ObservabilitySink, TraceEvent};
use crate::types::Fragment;
use chrono::{DateTime, Utc};
use docsage_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Instant;

/// Bumped whenever the on-disk layout changes; older copies are rebuilt.
pub const FORMAT_VERSION: u32 = 1;

/// File name of the persisted index inside its location directory.
pub const INDEX_FILE: &str = "index.json";

/// Bookkeeping for one persisted index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub index_id: String,
    /// Hash over (path, size, mtime) of every source file
    pub source_fingerprint: String,
    pub persisted_location: PathBuf,
    pub build_timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
struct PersistedIndexRef<'a> {
    format_version: u32,
    record: &'a IndexRecord,
    embedding: &'a EmbeddingIdentity,
    chunking: ChunkingParams,
    extractors: &'a [String],
    fragments: &'a [Fragment],
}

#[derive(Deserialize)]
struct PersistedIndex {
    format_version: u32,
    record: IndexRecord,
    embedding: EmbeddingIdentity,
    chunking: ChunkingParams,
    #[serde(default)]
    extractors: Vec<String>,
    fragments: Vec<Fragment>,
}

/// An index resident in memory. Shared read-only by every query.
#[derive(Debug)]
pub struct LoadedIndex {
    record: RwLock<IndexRecord>,
    embedding: EmbeddingIdentity,
    chunking: ChunkingParams,
    extractors: Vec<String>,
    fragments: Vec<Fragment>,
}

impl From<PersistedIndex> for LoadedIndex {
    fn from(persisted: PersistedIndex) -> Self {
        Self {
            record: RwLock::new(persisted.record),
            embedding: persisted.embedding,
            chunking: persisted.chunking,
            extractors: persisted.extractors,
            fragments: persisted.fragments,
        }
    }
}

impl LoadedIndex {
    pub fn record(&self) -> IndexRecord {
        read_lock(&self.record).clone()
    }

    pub fn embedding(&self) -> &EmbeddingIdentity {
        &self.embedding
    }

    pub fn chunking(&self) -> ChunkingParams {
        self.chunking
    }

    /// Signatures of the metadata extractors the fragments went through.
    pub fn extractors(&self) -> &[String] {
        &self.extractors
    }

    /// Fragments in ingestion order.
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn summary(&self) -> IndexSummary {
        IndexSummary {
            record: self.record(),
            embedding: self.embedding.clone(),
            chunking: self.chunking,
            extractors: self.extractors.clone(),
            fragment_count: self.fragments.len(),
            document_count: count_documents(&self.fragments),
        }
    }

    fn to_bytes(&self, record: &IndexRecord) -> AppResult<Vec<u8>> {
        let persisted = PersistedIndexRef {
            format_version: FORMAT_VERSION,
            record,
            embedding: &self.embedding,
            chunking: self.chunking,
            extractors: &self.extractors,
            fragments: &self.fragments,
        };
        Ok(serde_json::to_vec(&persisted)?)
    }
}

/// What a persisted index contains, without its vectors.
#[derive(Debug, Clone, Serialize)]
pub struct IndexSummary {
    pub record: IndexRecord,
    pub embedding: EmbeddingIdentity,
    pub chunking: ChunkingParams,
    pub extractors: Vec<String>,
    pub fragment_count: usize,
    pub document_count: usize,
}

fn count_documents(fragments: &[Fragment]) -> usize {
    fragments
        .iter()
        .map(|f| f.document_id.as_str())
        .collect::<HashSet<_>>()
        .len()
}

/// How a handle came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOrigin {
    /// Served from memory or from the persisted copy
    Loaded,
    /// Built from sources; `persisted` is false if writing the copy failed
    Built { persisted: bool },
}

/// Non-owning reference to an index held by an [`IndexStore`].
///
/// Stops resolving once the store evicts the index or is dropped.
#[derive(Debug, Clone)]
pub struct IndexHandle {
    index_id: String,
    origin: IndexOrigin,
    index: Weak<LoadedIndex>,
}

impl IndexHandle {
    pub fn index_id(&self) -> &str {
        &self.index_id
    }

    pub fn origin(&self) -> IndexOrigin {
        self.origin
    }

    pub fn is_loaded(&self) -> bool {
        self.index.strong_count() > 0
    }

    /// Resolve the handle, failing with `InvalidArgument` once unloaded.
    pub fn upgrade(&self) -> AppResult<Arc<LoadedIndex>> {
        self.index.upgrade().ok_or_else(|| {
            AppError::InvalidArgument(format!("index '{}' is not loaded", self.index_id))
        })
    }
}

/// Storage for persisted index bytes.
///
/// `location` is a directory; the medium decides the file layout inside it.
/// `write_atomic` must leave either the old or the new content, never a mix.
pub trait PersistenceMedium: Send + Sync {
    /// `Ok(None)` when nothing was ever persisted at `location`.
    fn read(&self, location: &Path) -> AppResult<Option<Vec<u8>>>;

    fn write_atomic(&self, location: &Path, bytes: &[u8]) -> AppResult<()>;

    fn remove(&self, location: &Path) -> AppResult<()>;
}

/// Local filesystem medium: `<location>/index.json`, replaced by rename.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsMedium;

impl FsMedium {
    /// Write through `fill` into a temp file next to the target, then rename.
    ///
    /// If `fill` fails, the temp file is discarded and the target is untouched.
    pub(crate) fn write_with(
        &self,
        location: &Path,
        fill: impl FnOnce(&mut fs::File) -> io::Result<()>,
    ) -> io::Result<()> {
        fs::create_dir_all(location)?;
        let mut tmp = tempfile::NamedTempFile::new_in(location)?;
        fill(tmp.as_file_mut())?;
        tmp.as_file().sync_all()?;
        tmp.persist(location.join(INDEX_FILE))
            .map_err(|e| e.error)?;
        Ok(())
    }
}

impl PersistenceMedium for FsMedium {
    fn read(&self, location: &Path) -> AppResult<Option<Vec<u8>>> {
        match fs::read(location.join(INDEX_FILE)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_atomic(&self, location: &Path, bytes: &[u8]) -> AppResult<()> {
        self.write_with(location, |file| file.write_all(bytes))?;
        Ok(())
    }

    fn remove(&self, location: &Path) -> AppResult<()> {
        match fs::remove_file(location.join(INDEX_FILE)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

enum CacheLookup {
    Hit(LoadedIndex),
    NotFound,
    Invalid(String),
}

/// Owns loaded indexes and their persisted copies.
pub struct IndexStore {
    source: Arc<dyn DocumentSource>,
    chunker: Arc<Chunker>,
    embedder: Arc<dyn EmbeddingProvider>,
    embed_batch_size: usize,
    extractors: Vec<Arc<dyn MetadataExtractor>>,
    medium: Arc<dyn PersistenceMedium>,
    sink: Option<Arc<dyn ObservabilitySink>>,
    progress: ProgressReporter,
    build_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    loaded: RwLock<HashMap<String, Arc<LoadedIndex>>>,
}

impl IndexStore {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        chunker: Chunker,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            source,
            chunker: Arc::new(chunker),
            embedder,
            embed_batch_size: 32,
            extractors: Vec::new(),
            medium: Arc::new(FsMedium),
            sink: None,
            progress: ProgressReporter::noop(),
            build_locks: Mutex::new(HashMap::new()),
            loaded: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_medium(mut self, medium: Arc<dyn PersistenceMedium>) -> Self {
        self.medium = medium;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ObservabilitySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// Metadata extractors run over every fragment before embedding.
    pub fn with_extractors(mut self, extractors: Vec<Arc<dyn MetadataExtractor>>) -> Self {
        self.extractors = extractors;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.embed_batch_size = batch_size.max(1);
        self
    }

    /// The embedding capability queries must use to stay in the index's space.
    pub fn embedder(&self) -> Arc<dyn EmbeddingProvider> {
        Arc::clone(&self.embedder)
    }

    pub(crate) fn sink(&self) -> Option<Arc<dyn ObservabilitySink>> {
        self.sink.clone()
    }

    /// Handle for an index already in memory.
    pub fn get(&self, index_id: &str) -> Option<IndexHandle> {
        read_lock(&self.loaded)
            .get(index_id)
            .map(|index| handle(index_id, IndexOrigin::Loaded, index))
    }

    pub fn loaded_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = read_lock(&self.loaded).keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Drop an index from memory. Outstanding handles stop resolving.
    pub fn evict(&self, index_id: &str) -> bool {
        write_lock(&self.loaded).remove(index_id).is_some()
    }

    /// Load the persisted index at `persisted_location`, or build it from
    /// `sources` and persist it there.
    #[tracing::instrument(skip(self, sources, persisted_location), fields(location = %persisted_location.display()))]
    pub async fn open_or_build(
        &self,
        index_id: &str,
        sources: &[LoadLocation],
        persisted_location: &Path,
    ) -> AppResult<IndexHandle> {
        if index_id.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "index id must not be empty".to_string(),
            ));
        }

        let start = Instant::now();
        let lock = self.build_lock(index_id);
        let _guard = lock.lock().await;

        let result = self
            .open_or_build_locked(index_id, sources, persisted_location)
            .await;

        let event = match &result {
            Ok(h) => TraceEvent::success("open_or_build", index_id, start.elapsed())
                .with_detail(format!("{:?}", h.origin())),
            Err(e) => TraceEvent::failure("open_or_build", index_id, start.elapsed(), e),
        };
        trace::emit(self.sink.as_deref(), event);
        result
    }

    async fn open_or_build_locked(
        &self,
        index_id: &str,
        sources: &[LoadLocation],
        location: &Path,
    ) -> AppResult<IndexHandle> {
        let cached = read_lock(&self.loaded).get(index_id).cloned();
        if let Some(index) = cached {
            let current = index.record().persisted_location;
            if current != location {
                return Err(AppError::InvalidArgument(format!(
                    "index '{}' is already open from {} (requested {})",
                    index_id,
                    current.display(),
                    location.display()
                )));
            }
            tracing::debug!(index_id, "Index already in memory");
            return Ok(handle(index_id, IndexOrigin::Loaded, &index));
        }

        match self.inspect_persisted(index_id, sources, location).await {
            CacheLookup::Hit(index) => {
                tracing::info!(
                    index_id,
                    fragments = index.fragments.len(),
                    "Loaded persisted index"
                );
                return Ok(self.install(index_id, index, IndexOrigin::Loaded));
            }
            CacheLookup::NotFound => {
                tracing::info!(index_id, location = %location.display(), "No persisted index, building");
            }
            CacheLookup::Invalid(cause) => {
                tracing::warn!(
                    index_id,
                    location = %location.display(),
                    cause = %cause,
                    "Persisted index unusable, rebuilding"
                );
            }
        }

        let index = self
            .build(index_id, sources, location)
            .await
            .map_err(|e| in_index(index_id, e))?;

        let record = index.record();
        let persisted = match self.write(&index, &record).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(index_id, error = %e, "Built index could not be persisted");
                false
            }
        };

        Ok(self.install(index_id, index, IndexOrigin::Built { persisted }))
    }

    /// Write the full index behind `handle` to `location`.
    ///
    /// The prior content at `location` survives any failure. On success the
    /// copy at the previous location, if different, is removed.
    pub async fn persist(&self, handle: &IndexHandle, location: &Path) -> AppResult<IndexRecord> {
        let start = Instant::now();
        let index = handle.upgrade()?;
        let lock = self.build_lock(handle.index_id());
        let _guard = lock.lock().await;

        let previous = index.record();
        let record = IndexRecord {
            persisted_location: location.to_path_buf(),
            ..previous.clone()
        };

        let result = self.write(&index, &record).await;
        trace::emit(
            self.sink.as_deref(),
            match &result {
                Ok(()) => TraceEvent::success("persist", handle.index_id(), start.elapsed()),
                Err(e) => TraceEvent::failure("persist", handle.index_id(), start.elapsed(), e),
            },
        );
        result?;

        if previous.persisted_location != location {
            if let Err(e) = self.medium.remove(&previous.persisted_location) {
                tracing::warn!(
                    index_id = handle.index_id(),
                    error = %e,
                    "Could not remove previous persisted copy"
                );
            }
        }

        *write_lock(&index.record) = record.clone();
        Ok(record)
    }

    /// Summary of the persisted copy at `location`, if it can be read.
    pub async fn describe(&self, location: &Path) -> AppResult<Option<IndexSummary>> {
        let Some(bytes) = self.read(location).await? else {
            return Ok(None);
        };
        let persisted: PersistedIndex = serde_json::from_slice(&bytes)?;
        Ok(Some(LoadedIndex::from(persisted).summary()))
    }

    fn build_lock(&self, index_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .build_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(locks.entry(index_id.to_string()).or_default())
    }

    fn install(&self, index_id: &str, index: LoadedIndex, origin: IndexOrigin) -> IndexHandle {
        let index = Arc::new(index);
        let handle = handle(index_id, origin, &index);
        write_lock(&self.loaded).insert(index_id.to_string(), index);
        handle
    }

    async fn read(&self, location: &Path) -> AppResult<Option<Vec<u8>>> {
        let medium = Arc::clone(&self.medium);
        let location = location.to_path_buf();
        tokio::task::spawn_blocking(move || medium.read(&location))
            .await
            .map_err(|e| AppError::Other(format!("read task failed: {}", e)))?
    }

    async fn write(&self, index: &LoadedIndex, record: &IndexRecord) -> AppResult<()> {
        let index_id = record.index_id.clone();
        self.progress.emit(
            &index_id,
            BuildPhase::Persist,
            0,
            Some(1),
            record.persisted_location.display().to_string(),
        );

        let bytes = index
            .to_bytes(record)
            .map_err(|e| AppError::persistence(&index_id, e.to_string()))?;
        let medium = Arc::clone(&self.medium);
        let location = record.persisted_location.clone();

        tokio::task::spawn_blocking(move || medium.write_atomic(&location, &bytes))
            .await
            .map_err(|e| AppError::persistence(&index_id, format!("write task failed: {}", e)))?
            .map_err(|e| match e {
                AppError::Persistence { .. } => e,
                other => AppError::persistence(&index_id, other.to_string()),
            })?;

        self.progress
            .emit(&index_id, BuildPhase::Persist, 1, Some(1), "written");
        tracing::info!(index_id = %index_id, location = %record.persisted_location.display(), "Persisted index");
        Ok(())
    }

    async fn inspect_persisted(
        &self,
        index_id: &str,
        sources: &[LoadLocation],
        location: &Path,
    ) -> CacheLookup {
        let bytes = match self.read(location).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return CacheLookup::NotFound,
            Err(e) => return CacheLookup::Invalid(format!("read failed: {}", e)),
        };

        let persisted: PersistedIndex = match serde_json::from_slice(&bytes) {
            Ok(p) => p,
            Err(e) => return CacheLookup::Invalid(format!("corrupt index file: {}", e)),
        };

        if let Err(cause) = self.check_compatible(index_id, &persisted) {
            return CacheLookup::Invalid(cause);
        }

        match self.fingerprint_sources(sources).await {
            Ok(current) if current != persisted.record.source_fingerprint => {
                return CacheLookup::Invalid("source files changed since the last build".to_string());
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    index_id,
                    error = %e,
                    "Could not fingerprint sources, trusting persisted copy"
                );
            }
        }

        let index = LoadedIndex::from(persisted);
        write_lock(&index.record).persisted_location = location.to_path_buf();
        CacheLookup::Hit(index)
    }

    fn check_compatible(&self, index_id: &str, persisted: &PersistedIndex) -> Result<(), String> {
        if persisted.format_version != FORMAT_VERSION {
            return Err(format!(
                "format version {} (expected {})",
                persisted.format_version, FORMAT_VERSION
            ));
        }
        if persisted.record.index_id != index_id {
            return Err(format!(
                "persisted copy belongs to index '{}'",
                persisted.record.index_id
            ));
        }
        self.embedder
            .identity()
            .validate_consistency(&persisted.embedding)
            .map_err(|e| e.to_string())?;
        if persisted.chunking != self.chunker.params() {
            return Err(format!(
                "chunking changed: persisted {:?}, configured {:?}",
                persisted.chunking,
                self.chunker.params()
            ));
        }
        let configured = self.extractor_signatures();
        if persisted.extractors != configured {
            return Err(format!(
                "metadata extractors changed: persisted {:?}, configured {:?}",
                persisted.extractors, configured
            ));
        }
        if persisted.fragments.is_empty() {
            return Err("persisted copy has no fragments".to_string());
        }
        let dims = persisted.embedding.dimensions;
        if let Some(bad) = persisted.fragments.iter().find(|f| f.embedding.len() != dims) {
            return Err(format!(
                "fragment {} has {} dimensions (expected {})",
                bad.id,
                bad.embedding.len(),
                dims
            ));
        }
        Ok(())
    }

    fn extractor_signatures(&self) -> Vec<String> {
        self.extractors.iter().map(|e| e.signature()).collect()
    }

    async fn fingerprint_sources(&self, sources: &[LoadLocation]) -> AppResult<String> {
        let source = Arc::clone(&self.source);
        let sources = sources.to_vec();
        tokio::task::spawn_blocking(move || source.discover(&sources).map(|f| fingerprint(&f)))
            .await
            .map_err(|e| AppError::Other(format!("discover task failed: {}", e)))?
    }

    async fn build(
        &self,
        index_id: &str,
        sources: &[LoadLocation],
        location: &Path,
    ) -> AppResult<LoadedIndex> {
        let start = Instant::now();

        let source = Arc::clone(&self.source);
        let locations = sources.to_vec();
        let (files, documents) = tokio::task::spawn_blocking(move || {
            let files = source.discover(&locations)?;
            let documents = source.load(&locations)?;
            Ok::<_, AppError>((files, documents))
        })
        .await
        .map_err(|e| AppError::Other(format!("load task failed: {}", e)))??;

        self.progress.emit(
            index_id,
            BuildPhase::Discover,
            files.len() as u64,
            Some(files.len() as u64),
            format!("{} files", files.len()),
        );
        self.progress.emit(
            index_id,
            BuildPhase::Load,
            documents.len() as u64,
            Some(documents.len() as u64),
            format!("{} documents", documents.len()),
        );

        let mut fragments = Vec::new();
        for document in &documents {
            for text in self.chunker.split(document.text()) {
                fragments.push(Fragment {
                    id: uuid::Uuid::new_v4().to_string(),
                    document_id: document.id().to_string(),
                    position: fragments.len() as u32,
                    text,
                    embedding: Vec::new(),
                    metadata: document.metadata().clone(),
                });
            }
        }
        if fragments.is_empty() {
            return Err(AppError::Knowledge(
                "documents produced no fragments".to_string(),
            ));
        }
        self.progress.emit(
            index_id,
            BuildPhase::Chunk,
            fragments.len() as u64,
            None,
            format!("{} fragments", fragments.len()),
        );

        if !self.extractors.is_empty() {
            let total = fragments.len() as u64;
            self.progress.emit(
                index_id,
                BuildPhase::Extract,
                0,
                Some(total),
                format!("{} extractor(s)", self.extractors.len()),
            );
            extractors::enrich(&self.extractors, &mut fragments).await?;
            self.progress
                .emit(index_id, BuildPhase::Extract, total, Some(total), "metadata added");
        }

        let texts: Vec<String> = fragments.iter().map(extractors::embedding_text).collect();
        let total = texts.len() as u64;
        let model = self.embedder.model_name().to_string();
        let vectors = embed_in_batches(
            self.embedder.as_ref(),
            &texts,
            self.embed_batch_size,
            |done| {
                self.progress.emit(
                    index_id,
                    BuildPhase::Embed,
                    done as u64,
                    Some(total),
                    format!("model={}", model),
                )
            },
        )
        .await?;

        let identity = self.embedder.identity();
        for (fragment, vector) in fragments.iter_mut().zip(vectors) {
            if vector.len() != identity.dimensions {
                return Err(AppError::Knowledge(format!(
                    "embedding provider returned {} dimensions (expected {})",
                    vector.len(),
                    identity.dimensions
                )));
            }
            fragment.embedding = vector;
        }

        tracing::info!(
            index_id,
            files = files.len(),
            documents = documents.len(),
            fragments = fragments.len(),
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Built index"
        );

        Ok(LoadedIndex {
            record: RwLock::new(IndexRecord {
                index_id: index_id.to_string(),
                source_fingerprint: fingerprint(&files),
                persisted_location: location.to_path_buf(),
                build_timestamp: Utc::now(),
            }),
            embedding: identity,
            chunking: self.chunker.params(),
            extractors: self.extractor_signatures(),
            fragments,
        })
    }
}

fn handle(index_id: &str, origin: IndexOrigin, index: &Arc<LoadedIndex>) -> IndexHandle {
    IndexHandle {
        index_id: index_id.to_string(),
        origin,
        index: Arc::downgrade(index),
    }
}

/// Attach the index id to build errors that would otherwise lack it.
pub(crate) fn in_index(index_id: &str, err: AppError) -> AppError {
    match err {
        AppError::Load { path, message } => AppError::Load {
            path,
            message: format!("index '{}': {}", index_id, message),
        },
        AppError::Knowledge(message) => {
            AppError::Knowledge(format!("index '{}': {}", index_id, message))
        }
        AppError::Llm(message) => AppError::Llm(format!("index '{}': {}", index_id, message)),
        other => other,
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fs_medium_read_missing() {
        let dir = TempDir::new().unwrap();
        assert!(FsMedium.read(&dir.path().join("nothing")).unwrap().is_none());
    }

    #[test]
    fn test_fs_medium_overwrite() {
        let dir = TempDir::new().unwrap();
        FsMedium.write_atomic(dir.path(), b"first").unwrap();
        FsMedium.write_atomic(dir.path(), b"second").unwrap();
        assert_eq!(FsMedium.read(dir.path()).unwrap().unwrap(), b"second");

        // Only the index file remains; temp files were renamed away.
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_fs_medium_failed_write_keeps_prior_content() {
        let dir = TempDir::new().unwrap();
        FsMedium.write_atomic(dir.path(), b"prior content").unwrap();

        let result = FsMedium.write_with(dir.path(), |file| {
            file.write_all(b"half of the new")?;
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        });
        assert!(result.is_err());

        assert_eq!(FsMedium.read(dir.path()).unwrap().unwrap(), b"prior content");
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_fs_medium_remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        FsMedium.write_atomic(dir.path(), b"x").unwrap();
        FsMedium.remove(dir.path()).unwrap();
        FsMedium.remove(dir.path()).unwrap();
        assert!(FsMedium.read(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_in_index_names_the_index() {
        let err = in_index("lyft", AppError::Knowledge("boom".to_string()));
        assert!(err.to_string().contains("'lyft'"));
    }
}
