//! Document indexing, retrieval and tool routing.
//!
//! The workflow is cache-or-build: [`IndexStore::open_or_build`] loads a
//! persisted index when one exists and is valid, otherwise it loads the
//! source documents, chunks and embeds them, and persists the result. A
//! [`QueryEngine`] answers questions over a loaded index, and an [`Agent`]
//! routes requests across several engines exposed as tools.

pub mod agent;
pub mod chat;
pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod evaluate;
pub mod extractors;
pub mod filters;
pub mod loader;
pub mod parser;
pub mod progress;
pub mod query;
pub mod similarity;
pub mod store;
pub mod trace;
pub mod types;

#[cfg(test)]
mod tests;

pub use agent::{
    Agent, AgentConfig, AgentResult, FunctionTool, LlmRouter, QueryEngineTool, Router,
    RoutingDecision, Tool, ToolDescriptor, ToolOutput, TraceEntry,
};
pub use chat::{ChatMessage, ChatSession, Conversation, Role, WindowPolicy};
pub use evaluate::{EvaluationResult, FaithfulnessEvaluator};
pub use extractors::{MetadataExtractor, QuestionsAnsweredExtractor, SummaryExtractor};
pub use filters::MetadataFilters;
pub use loader::{DocumentLoader, DocumentSource, Granularity, LoadLocation};
pub use progress::{BuildPhase, ProgressEvent, ProgressReporter};
pub use query::{QueryEngine, QueryEngineConfig, QueryStream};
pub use store::{
    FsMedium, IndexHandle, IndexOrigin, IndexRecord, IndexStore, IndexSummary, PersistenceMedium,
};
pub use trace::{ObservabilitySink, TraceEvent, TracingSink};
pub use types::{DocumentUnit, Fragment, Metadata, MetadataValue, QueryResult, SourceFragment};

use docsage_core::{AppConfig, AppResult};
use docsage_llm::LlmClient;
use std::sync::Arc;

/// A declared index opened through its own store.
pub struct OpenedIndex {
    pub store: Arc<IndexStore>,
    pub handle: IndexHandle,
}

/// Open a declared index, building and persisting it on a cache miss.
pub async fn open_index(
    config: &AppConfig,
    index_id: &str,
    progress: ProgressReporter,
) -> AppResult<OpenedIndex> {
    let definition = config.index(index_id)?;
    let locations = config::load_locations(config, definition)?;
    let store = Arc::new(
        config::index_store(config, config::granularity(definition))?
            .with_extractors(config::metadata_extractors(config, definition)?)
            .with_progress(progress),
    );

    let handle = store
        .open_or_build(index_id, &locations, &config.persist_dir_for(index_id))
        .await?;

    Ok(OpenedIndex { store, handle })
}

/// Open a declared index and put a query engine over it.
///
/// The returned store must outlive the engine; the engine only holds a
/// handle to the loaded index.
pub async fn open_query_engine(
    config: &AppConfig,
    index_id: &str,
    llm: Arc<dyn LlmClient>,
    progress: ProgressReporter,
) -> AppResult<(Arc<IndexStore>, QueryEngine)> {
    let opened = open_index(config, index_id, progress).await?;
    let engine = QueryEngine::new(
        &opened.store,
        opened.handle,
        llm,
        config::query_engine_config(config)?,
    )?;
    Ok((opened.store, engine))
}

/// Summary of a declared index's persisted copy, without loading it.
pub async fn describe_index(config: &AppConfig, index_id: &str) -> AppResult<Option<IndexSummary>> {
    let definition = config.index(index_id)?;
    let store = config::index_store(config, config::granularity(definition))?;
    store.describe(&config.persist_dir_for(index_id)).await
}
