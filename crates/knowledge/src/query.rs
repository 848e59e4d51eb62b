//! Query engine: retrieve, optionally condense, then answer.

use crate::chat::{Conversation, LlmCondenser, QuestionCondenser};
use crate::embeddings::EmbeddingProvider;
use crate::filters::MetadataFilters;
use crate::similarity::{CosineSearch, SimilaritySearch};
use crate::store::{in_index, IndexHandle, IndexStore};
use crate::trace::{self, ObservabilitySink, TraceEvent};
use crate::types::{Fragment, MetadataValue};
use docsage_core::{AppError, AppResult};
use docsage_llm::{CompletionOptions, LlmClient, LlmRequest};
use docsage_prompt::{defaults, PromptTemplate};
use futures::{Stream, StreamExt};
use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

pub use crate::types::{QueryResult, SourceFragment};

/// Stream of answer text increments.
pub type TextStream = Pin<Box<dyn Stream<Item = AppResult<String>> + Send>>;

/// Per-engine settings: completion model and options, templates, filters.
#[derive(Debug, Clone)]
pub struct QueryEngineConfig {
    pub model: String,
    pub options: CompletionOptions,
    /// Answer template; variables `context` and `query`
    pub text_qa: PromptTemplate,
    /// Follow-up rewrite template; variables `chat_history` and `question`
    pub condense: PromptTemplate,
    pub filters: MetadataFilters,
}

impl QueryEngineConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            options: CompletionOptions::default(),
            text_qa: defaults::text_qa(),
            condense: defaults::condense(),
            filters: MetadataFilters::default(),
        }
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_text_qa(mut self, template: PromptTemplate) -> Self {
        self.text_qa = template;
        self
    }

    pub fn with_condense(mut self, template: PromptTemplate) -> Self {
        self.condense = template;
        self
    }

    pub fn with_filters(mut self, filters: MetadataFilters) -> Self {
        self.filters = filters;
        self
    }
}

pub struct QueryEngine {
    handle: IndexHandle,
    embedder: Arc<dyn EmbeddingProvider>,
    search: Arc<dyn SimilaritySearch>,
    llm: Arc<dyn LlmClient>,
    condenser: Arc<dyn QuestionCondenser>,
    config: QueryEngineConfig,
    sink: Option<Arc<dyn ObservabilitySink>>,
}

struct Prepared {
    retrieval_query: String,
    sources: Vec<SourceFragment>,
    request: LlmRequest,
}

impl QueryEngine {
    /// Engine over `handle`, embedding questions with the store's provider.
    pub fn new(
        store: &IndexStore,
        handle: IndexHandle,
        llm: Arc<dyn LlmClient>,
        config: QueryEngineConfig,
    ) -> AppResult<Self> {
        config.options.validate()?;
        check_variables(&config.text_qa, &["context", "query"])?;
        check_variables(&config.condense, &["chat_history", "question"])?;

        let condenser = Arc::new(LlmCondenser::new(
            Arc::clone(&llm),
            config.model.clone(),
            config.options.clone(),
            config.condense.clone(),
        ));

        Ok(Self {
            handle,
            embedder: store.embedder(),
            search: Arc::new(CosineSearch),
            llm,
            condenser,
            config,
            sink: store.sink(),
        })
    }

    pub fn with_search(mut self, search: Arc<dyn SimilaritySearch>) -> Self {
        self.search = search;
        self
    }

    pub fn with_condenser(mut self, condenser: Arc<dyn QuestionCondenser>) -> Self {
        self.condenser = condenser;
        self
    }

    pub fn index_id(&self) -> &str {
        self.handle.index_id()
    }

    pub fn config(&self) -> &QueryEngineConfig {
        &self.config
    }

    /// Active templates keyed by their role in the engine.
    pub fn prompts(&self) -> BTreeMap<&'static str, &PromptTemplate> {
        BTreeMap::from([
            ("text_qa", &self.config.text_qa),
            ("condense", &self.config.condense),
        ])
    }

    /// Swap the answer template. It must still use `context` and `query`.
    pub fn update_text_qa(&mut self, template: PromptTemplate) -> AppResult<()> {
        check_variables(&template, &["context", "query"])?;
        self.config.text_qa = template;
        Ok(())
    }

    /// The `top_k` fragments most similar to `question`, best first.
    pub async fn retrieve(&self, question: &str, top_k: usize) -> AppResult<Vec<SourceFragment>> {
        if top_k == 0 {
            return Err(AppError::InvalidArgument(
                "top_k must be greater than zero".to_string(),
            ));
        }
        let index = self.handle.upgrade()?;

        let query_vector = self
            .embedder
            .embed(question)
            .await
            .map_err(|e| in_index(self.index_id(), e))?;

        let candidates: Vec<&Fragment> = index
            .fragments()
            .iter()
            .filter(|f| self.config.filters.matches(&f.metadata))
            .collect();

        let ranked = self.search.search(&query_vector, &candidates, top_k);
        let sources: Vec<SourceFragment> = ranked
            .into_iter()
            .filter_map(|(i, score)| candidates.get(i).map(|f| (f, score)))
            .map(|(f, score)| SourceFragment {
                text: f.text.clone(),
                score: score.clamp(0.0, 1.0),
                metadata: f.metadata.clone(),
            })
            .collect();

        tracing::debug!(
            index_id = self.index_id(),
            candidates = candidates.len(),
            returned = sources.len(),
            top_score = sources.first().map(|s| s.score).unwrap_or(0.0),
            "Retrieved fragments"
        );
        Ok(sources)
    }

    /// Answer `question` from the `top_k` best fragments.
    ///
    /// With a non-empty `conversation` the question is condensed first, and
    /// the exchange is appended to the conversation on success.
    pub async fn query(
        &self,
        question: &str,
        top_k: usize,
        conversation: Option<&mut Conversation>,
    ) -> AppResult<QueryResult> {
        let start = Instant::now();
        let result = async {
            let prepared = self.prepare(question, top_k, conversation.as_deref()).await?;
            let response = self
                .llm
                .complete(&prepared.request)
                .await
                .map_err(|e| in_index(self.index_id(), e))?;
            Ok::<_, AppError>(QueryResult {
                answer: response.content,
                sources: prepared.sources,
                retrieval_query: prepared.retrieval_query,
            })
        }
        .await;

        self.record("query", start, &result);
        let result = result?;

        if let Some(conversation) = conversation {
            conversation.record_exchange(question, result.answer.clone());
        }
        Ok(result)
    }

    /// Streaming variant of [`query`](Self::query).
    ///
    /// Retrieval happens up front; the answer arrives as text increments whose
    /// concatenation is the full answer. The conversation is only read.
    pub async fn query_stream(
        &self,
        question: &str,
        top_k: usize,
        conversation: Option<&Conversation>,
    ) -> AppResult<QueryStream> {
        let start = Instant::now();
        let result = async {
            let prepared = self.prepare(question, top_k, conversation).await?;
            let request = prepared.request.with_streaming();
            let chunks = self
                .llm
                .stream(&request)
                .await
                .map_err(|e| in_index(self.index_id(), e))?;

            let stream = chunks
                .filter_map(|chunk| async move {
                    match chunk {
                        Ok(chunk) if chunk.content.is_empty() => None,
                        Ok(chunk) => Some(Ok(chunk.content)),
                        Err(e) => Some(Err(e)),
                    }
                })
                .boxed();

            Ok::<_, AppError>(QueryStream {
                sources: prepared.sources,
                retrieval_query: prepared.retrieval_query,
                stream,
            })
        }
        .await;

        self.record("query_stream", start, &result);
        result
    }

    async fn prepare(
        &self,
        question: &str,
        top_k: usize,
        conversation: Option<&Conversation>,
    ) -> AppResult<Prepared> {
        if top_k == 0 {
            return Err(AppError::InvalidArgument(
                "top_k must be greater than zero".to_string(),
            ));
        }
        self.handle.upgrade()?;
        if question.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "question must not be empty".to_string(),
            ));
        }

        let retrieval_query = match conversation {
            Some(history) if !history.is_empty() => self
                .condenser
                .condense(history, question)
                .await
                .map_err(|e| in_index(self.index_id(), e))?,
            _ => question.to_string(),
        };

        let sources = self.retrieve(&retrieval_query, top_k).await?;
        let context = format_context(&sources);
        let prompt = self.config.text_qa.render(&[
            ("context", context.as_str()),
            ("query", retrieval_query.as_str()),
        ])?;

        let request = LlmRequest::new(prompt, &self.config.model).with_options(&self.config.options);

        Ok(Prepared {
            retrieval_query,
            sources,
            request,
        })
    }

    fn record<T>(&self, operation: &'static str, start: Instant, result: &AppResult<T>) {
        let event = match result {
            Ok(_) => TraceEvent::success(operation, self.index_id(), start.elapsed()),
            Err(e) => TraceEvent::failure(operation, self.index_id(), start.elapsed(), e),
        };
        trace::emit(self.sink.as_deref(), event);
    }
}

/// Answer stream plus the sources it was grounded on.
pub struct QueryStream {
    pub sources: Vec<SourceFragment>,
    pub retrieval_query: String,
    stream: TextStream,
}

impl QueryStream {
    /// Drain the stream into the complete answer.
    pub async fn into_text(mut self) -> AppResult<String> {
        let mut text = String::new();
        while let Some(piece) = self.stream.next().await {
            text.push_str(&piece?);
        }
        Ok(text)
    }

    /// Drain the stream into a [`QueryResult`].
    pub async fn into_result(self) -> AppResult<QueryResult> {
        let sources = self.sources.clone();
        let retrieval_query = self.retrieval_query.clone();
        let answer = self.into_text().await?;
        Ok(QueryResult {
            answer,
            sources,
            retrieval_query,
        })
    }
}

impl Stream for QueryStream {
    type Item = AppResult<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.stream.poll_next_unpin(cx)
    }
}

fn format_context(sources: &[SourceFragment]) -> String {
    sources
        .iter()
        .enumerate()
        .map(|(i, source)| {
            let label = match source.metadata.get("file_name") {
                Some(MetadataValue::Text(name)) => match source.metadata.get("page_label") {
                    Some(page) => format!(" ({}, page {})", name, page),
                    None => format!(" ({})", name),
                },
                _ => String::new(),
            };
            format!("[Document {}]{}\n{}", i + 1, label, source.text)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn check_variables(template: &PromptTemplate, required: &[&str]) -> AppResult<()> {
    let used = template.variables();
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|v| !used.iter().any(|u| u == v))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::Prompt(format!(
            "template '{}' must use: {}",
            template.id,
            missing.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Metadata;

    #[test]
    fn test_format_context_labels_sources() {
        let mut metadata = Metadata::new();
        metadata.insert("file_name".to_string(), "lyft_2021.pdf".into());
        metadata.insert("page_label".to_string(), "4".into());

        let sources = vec![
            SourceFragment {
                text: "Revenue was $3.2 billion.".to_string(),
                score: 0.9,
                metadata,
            },
            SourceFragment {
                text: "Unlabelled text.".to_string(),
                score: 0.5,
                metadata: Metadata::new(),
            },
        ];

        assert_eq!(
            format_context(&sources),
            "[Document 1] (lyft_2021.pdf, page 4)\nRevenue was $3.2 billion.\n\n[Document 2]\nUnlabelled text."
        );
    }

    #[test]
    fn test_check_variables() {
        assert!(check_variables(&defaults::text_qa(), &["context", "query"]).is_ok());
        let err = check_variables(&defaults::condense(), &["context"]).unwrap_err();
        assert!(err.to_string().contains("context"));
    }
}
