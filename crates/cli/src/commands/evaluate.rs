//! Evaluate command handler.
//!
//! Asks a question, then has the model judge whether the answer is supported
//! by the retrieved sources, as a whole and per source.

use super::{print_json, progress};
use clap::Args;
use docsage_core::{config::AppConfig, AppResult};
use docsage_knowledge::config::llm_client;
use docsage_knowledge::{open_query_engine, FaithfulnessEvaluator, MetadataValue};

/// Check whether an answer is supported by its sources
#[derive(Args, Debug)]
pub struct EvaluateCommand {
    /// Index name as declared in config.yaml
    pub index: String,

    /// The question to ask and evaluate
    pub question: String,

    /// Number of fragments to retrieve
    #[arg(short = 'k', long, default_value = "2")]
    pub top_k: usize,

    /// Also judge the answer against each source separately
    #[arg(long)]
    pub per_source: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl EvaluateCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing evaluate command for index '{}'", self.index);

        let llm = llm_client(config)?;
        let (_store, engine) =
            open_query_engine(config, &self.index, llm.clone(), progress(!self.json)).await?;
        let evaluator = FaithfulnessEvaluator::new(llm, &config.model);

        let result = engine.query(&self.question, self.top_k, None).await?;
        let overall = evaluator.evaluate_response(&self.question, &result).await?;
        let per_source = if self.per_source {
            evaluator.evaluate_sources(&self.question, &result).await?
        } else {
            Vec::new()
        };

        if self.json {
            return print_json(&serde_json::json!({
                "question": self.question,
                "answer": result.answer,
                "passing": overall.passing,
                "feedback": overall.feedback,
                "sources": per_source,
            }));
        }

        println!("{}", result.answer);
        println!();
        println!("Faithful: {}", if overall.passing { "yes" } else { "no" });
        for (source, verdict) in result.sources.iter().zip(&per_source) {
            let name = match source.metadata.get("file_name") {
                Some(MetadataValue::Text(name)) => name.as_str(),
                _ => "(unknown)",
            };
            println!(
                "- {} (score {:.3}): {}",
                name,
                source.score,
                if verdict.passing { "supported" } else { "not supported" }
            );
        }
        Ok(())
    }
}
