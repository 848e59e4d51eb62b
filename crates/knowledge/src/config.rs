//! Wiring from application configuration to stores and engines.

use crate::agent::{Agent, AgentConfig, LlmRouter};
use crate::chunker::{Chunker, ChunkingParams};
use crate::embeddings::{create_provider, EmbeddingConfig};
use crate::extractors::{MetadataExtractor, QuestionsAnsweredExtractor, SummaryExtractor};
use crate::loader::{DocumentLoader, Granularity, LoadLocation};
use crate::query::QueryEngineConfig;
use crate::store::IndexStore;
use crate::trace::TracingSink;
use docsage_core::config::IndexDefinition;
use docsage_core::{AppConfig, AppError, AppResult};
use docsage_llm::{create_client, CompletionOptions, LlmClient};
use docsage_prompt::{defaults, resolve_prompt};
use std::sync::Arc;

/// Resolve a declared index's sources against the workspace.
///
/// Directories become directory locations carrying the index's recursion
/// flag and extension allow-list; anything else is treated as a file.
pub fn load_locations(config: &AppConfig, definition: &IndexDefinition) -> AppResult<Vec<LoadLocation>> {
    if definition.sources.is_empty() {
        return Err(AppError::Config(
            "index declares no sources".to_string(),
        ));
    }

    let extensions: Vec<&str> = definition.extensions.iter().map(String::as_str).collect();
    Ok(definition
        .sources
        .iter()
        .map(|source| {
            let path = config.resolve_path(source);
            if path.is_dir() {
                LoadLocation::directory(path, definition.recursive, &extensions)
            } else {
                LoadLocation::file(path)
            }
        })
        .collect())
}

pub fn granularity(definition: &IndexDefinition) -> Granularity {
    if definition.per_page {
        Granularity::PerPage
    } else {
        Granularity::PerFile
    }
}

/// Store with the configured chunking and embedding provider.
pub fn index_store(config: &AppConfig, granularity: Granularity) -> AppResult<IndexStore> {
    let chunker = Chunker::new(ChunkingParams::from(&config.chunking))?;
    let embedding = EmbeddingConfig::from_app_config(config);
    let embedder = create_provider(&embedding)?;
    let loader = DocumentLoader::new().with_granularity(granularity);

    tracing::debug!(
        provider = %embedding.provider,
        model = %embedding.model,
        dimensions = embedding.dimensions,
        ?granularity,
        "Creating index store"
    );

    Ok(IndexStore::new(Arc::new(loader), chunker, embedder)
        .with_batch_size(embedding.batch_size)
        .with_sink(Arc::new(TracingSink)))
}

/// LLM metadata extractors the index asks for. Summaries run first so the
/// questions prompt can be overridden to use them.
pub fn metadata_extractors(
    config: &AppConfig,
    definition: &IndexDefinition,
) -> AppResult<Vec<Arc<dyn MetadataExtractor>>> {
    if !definition.summaries && definition.questions == 0 {
        return Ok(Vec::new());
    }

    let client = llm_client(config)?;
    let mut extractors: Vec<Arc<dyn MetadataExtractor>> = Vec::new();
    if definition.summaries {
        let template = resolve_prompt(&config.workspace, defaults::SUMMARY_ID)?;
        extractors.push(Arc::new(
            SummaryExtractor::new(Arc::clone(&client), &config.model).with_template(template),
        ));
    }
    if definition.questions > 0 {
        let template = resolve_prompt(&config.workspace, defaults::QUESTIONS_ID)?;
        extractors.push(Arc::new(
            QuestionsAnsweredExtractor::new(client, &config.model, definition.questions)
                .with_template(template),
        ));
    }
    Ok(extractors)
}

pub fn completion_options(config: &AppConfig) -> CompletionOptions {
    let generation = &config.generation;
    CompletionOptions {
        temperature: generation.temperature,
        max_output_tokens: generation.max_output_tokens,
        system_instruction: generation.system_instruction.clone(),
    }
}

/// Engine settings with workspace prompt overrides applied.
pub fn query_engine_config(config: &AppConfig) -> AppResult<QueryEngineConfig> {
    let text_qa = resolve_prompt(&config.workspace, defaults::TEXT_QA_ID)?;
    let condense = resolve_prompt(&config.workspace, defaults::CONDENSE_ID)?;

    Ok(QueryEngineConfig::new(&config.model)
        .with_options(completion_options(config))
        .with_text_qa(text_qa)
        .with_condense(condense))
}

/// Routing agent on the active model. Trace events go to `tracing`.
pub fn agent(config: &AppConfig, llm: Arc<dyn LlmClient>) -> AppResult<Agent> {
    let template = resolve_prompt(&config.workspace, defaults::AGENT_ROUTE_ID)?;
    let router = LlmRouter::new(llm, &config.model, completion_options(config)).with_template(template);

    Ok(Agent::new(
        Arc::new(router),
        AgentConfig {
            system_instruction: config.generation.system_instruction.clone(),
        },
    )
    .with_sink(Arc::new(TracingSink)))
}

/// Completion client for the active provider.
pub fn llm_client(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    let endpoint = config.provider_endpoint(&config.provider);
    let api_key = config.resolve_api_key(&config.provider);
    create_client(&config.provider, endpoint.as_deref(), api_key.as_deref()).map_err(AppError::Llm)
}
