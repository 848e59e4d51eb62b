//! LLM-judged faithfulness of answers to their retrieved context.

use crate::types::QueryResult;
use docsage_core::{AppError, AppResult};
use docsage_llm::{CompletionOptions, LlmClient, LlmRequest};
use docsage_prompt::{defaults, PromptTemplate};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationResult {
    /// Whether the judge found the answer supported by the context
    pub passing: bool,
    /// The judge's raw reply
    pub feedback: String,
}

pub struct FaithfulnessEvaluator {
    client: Arc<dyn LlmClient>,
    model: String,
    options: CompletionOptions,
    template: PromptTemplate,
}

impl FaithfulnessEvaluator {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            // Judging is deterministic and short.
            options: CompletionOptions::new(0.0, 64),
            template: defaults::faithfulness(),
        }
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    /// Judge `answer` against `contexts`.
    pub async fn evaluate(
        &self,
        query: &str,
        answer: &str,
        contexts: &[&str],
    ) -> AppResult<EvaluationResult> {
        if contexts.is_empty() {
            return Err(AppError::InvalidArgument(
                "at least one context is required".to_string(),
            ));
        }
        if answer.trim().is_empty() {
            return Err(AppError::InvalidArgument("answer must not be empty".to_string()));
        }

        let context = contexts.join("\n\n");
        let prompt = self.template.render(&[
            ("query", query),
            ("answer", answer),
            ("context", context.as_str()),
        ])?;
        let request = LlmRequest::new(prompt, &self.model).with_options(&self.options);
        let response = self.client.complete(&request).await?;

        let passing = parse_verdict(&response.content);
        tracing::debug!(passing, contexts = contexts.len(), "Faithfulness verdict");
        Ok(EvaluationResult {
            passing,
            feedback: response.content.trim().to_string(),
        })
    }

    /// Judge a query result against all of its sources at once.
    pub async fn evaluate_response(
        &self,
        query: &str,
        result: &QueryResult,
    ) -> AppResult<EvaluationResult> {
        let contexts: Vec<&str> = result.sources.iter().map(|s| s.text.as_str()).collect();
        self.evaluate(query, &result.answer, &contexts).await
    }

    /// Judge a query result against each source separately, in source order.
    pub async fn evaluate_sources(
        &self,
        query: &str,
        result: &QueryResult,
    ) -> AppResult<Vec<EvaluationResult>> {
        let mut verdicts = Vec::with_capacity(result.sources.len());
        for source in &result.sources {
            verdicts.push(self.evaluate(query, &result.answer, &[source.text.as_str()]).await?);
        }
        Ok(verdicts)
    }
}

/// A reply passes when its first word is YES.
fn parse_verdict(reply: &str) -> bool {
    reply
        .trim_start()
        .split(|c: char| !c.is_alphanumeric())
        .find(|w| !w.is_empty())
        .is_some_and(|w| w.eq_ignore_ascii_case("yes"))
}
