//! LLM-generated fragment metadata.
//!
//! Extractors run after chunking and before embedding. Their output is merged
//! into each fragment's metadata, and the well-known keys are also placed in
//! front of the text handed to the embedder so they take part in retrieval.

use crate::types::{Fragment, Metadata};
use async_trait::async_trait;
use docsage_core::{AppError, AppResult};
use docsage_llm::{CompletionOptions, LlmClient, LlmRequest};
use docsage_prompt::{defaults, PromptTemplate};
use std::sync::Arc;

pub const QUESTIONS_KEY: &str = "questions_this_excerpt_can_answer";
pub const SUMMARY_KEY: &str = "section_summary";

/// Produces extra metadata for every fragment of an index build.
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    /// Identifies the extractor and its settings. Recorded with the persisted
    /// index; a different set of signatures forces a rebuild.
    fn signature(&self) -> String;

    /// One metadata map per fragment, in fragment order.
    async fn extract(&self, fragments: &[Fragment]) -> AppResult<Vec<Metadata>>;
}

/// Asks the model which questions each fragment answers.
pub struct QuestionsAnsweredExtractor {
    client: Arc<dyn LlmClient>,
    model: String,
    questions: usize,
    options: CompletionOptions,
    template: PromptTemplate,
}

impl QuestionsAnsweredExtractor {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>, questions: usize) -> Self {
        Self {
            client,
            model: model.into(),
            questions: questions.max(1),
            options: CompletionOptions::new(0.1, 256),
            template: defaults::questions(),
        }
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }
}

#[async_trait]
impl MetadataExtractor for QuestionsAnsweredExtractor {
    fn signature(&self) -> String {
        format!("questions:{}:{}", self.questions, self.template.id)
    }

    async fn extract(&self, fragments: &[Fragment]) -> AppResult<Vec<Metadata>> {
        let count = self.questions.to_string();
        let mut extracted = Vec::with_capacity(fragments.len());

        for fragment in fragments {
            let prompt = self.template.render(&[
                ("context", fragment.text.as_str()),
                ("num_questions", count.as_str()),
            ])?;
            let reply = complete(self.client.as_ref(), &self.model, &self.options, prompt).await?;
            let questions: Vec<&str> = reply
                .lines()
                .map(strip_list_marker)
                .filter(|line| !line.is_empty() && !line.ends_with(':'))
                .take(self.questions)
                .collect();

            let mut metadata = Metadata::new();
            metadata.insert(QUESTIONS_KEY.to_string(), questions.join("\n").into());
            extracted.push(metadata);
        }

        tracing::debug!(fragments = fragments.len(), "Generated fragment questions");
        Ok(extracted)
    }
}

/// Asks the model for a short summary of each fragment.
pub struct SummaryExtractor {
    client: Arc<dyn LlmClient>,
    model: String,
    options: CompletionOptions,
    template: PromptTemplate,
}

impl SummaryExtractor {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            options: CompletionOptions::new(0.1, 256),
            template: defaults::summary(),
        }
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }
}

#[async_trait]
impl MetadataExtractor for SummaryExtractor {
    fn signature(&self) -> String {
        format!("summary:{}", self.template.id)
    }

    async fn extract(&self, fragments: &[Fragment]) -> AppResult<Vec<Metadata>> {
        let mut extracted = Vec::with_capacity(fragments.len());
        for fragment in fragments {
            let prompt = self.template.render(&[("context", fragment.text.as_str())])?;
            let reply = complete(self.client.as_ref(), &self.model, &self.options, prompt).await?;

            let mut metadata = Metadata::new();
            metadata.insert(SUMMARY_KEY.to_string(), reply.trim().to_string().into());
            extracted.push(metadata);
        }

        tracing::debug!(fragments = fragments.len(), "Generated fragment summaries");
        Ok(extracted)
    }
}

async fn complete(
    client: &dyn LlmClient,
    model: &str,
    options: &CompletionOptions,
    prompt: String,
) -> AppResult<String> {
    let request = LlmRequest::new(prompt, model).with_options(options);
    Ok(client.complete(&request).await?.content)
}

/// Run every extractor in order and merge its output into `fragments`.
pub(crate) async fn enrich(
    extractors: &[Arc<dyn MetadataExtractor>],
    fragments: &mut [Fragment],
) -> AppResult<()> {
    for extractor in extractors {
        let extracted = extractor.extract(fragments).await?;
        if extracted.len() != fragments.len() {
            return Err(AppError::Knowledge(format!(
                "metadata extractor '{}' returned {} entries for {} fragments",
                extractor.signature(),
                extracted.len(),
                fragments.len()
            )));
        }
        for (fragment, metadata) in fragments.iter_mut().zip(extracted) {
            fragment.metadata.extend(metadata);
        }
    }
    Ok(())
}

/// Text handed to the embedder: generated metadata first, then the fragment.
pub(crate) fn embedding_text(fragment: &Fragment) -> String {
    let mut text = String::new();
    for key in [SUMMARY_KEY, QUESTIONS_KEY] {
        if let Some(value) = fragment.metadata.get(key) {
            text.push_str(&format!("{}: {}\n", key, value));
        }
    }
    if text.is_empty() {
        return fragment.text.clone();
    }
    text.push('\n');
    text.push_str(&fragment.text);
    text
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        return rest.trim();
    }
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix(['.', ')']) {
            return rest.trim();
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(text: &str) -> Fragment {
        Fragment {
            id: "f1".to_string(),
            document_id: "bitcoin.pdf#page=1".to_string(),
            position: 0,
            text: text.to_string(),
            embedding: Vec::new(),
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn test_strip_list_marker() {
        assert_eq!(strip_list_marker("1. What is proof-of-work?"), "What is proof-of-work?");
        assert_eq!(strip_list_marker("  2) Who signs blocks?"), "Who signs blocks?");
        assert_eq!(strip_list_marker("- Why timestamps?"), "Why timestamps?");
        assert_eq!(strip_list_marker("2008 was the year?"), "2008 was the year?");
    }

    #[test]
    fn test_embedding_text_leads_with_generated_metadata() {
        let mut f = fragment("Nodes accept the longest chain.");
        assert_eq!(embedding_text(&f), "Nodes accept the longest chain.");

        f.metadata.insert(SUMMARY_KEY.to_string(), "Consensus rules.".into());
        f.metadata.insert("file_name".to_string(), "bitcoin.pdf".into());
        assert_eq!(
            embedding_text(&f),
            "section_summary: Consensus rules.\n\nNodes accept the longest chain."
        );
    }
}
