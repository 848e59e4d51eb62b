//! Ask command handler.
//!
//! Answers one question over one index, opening or building it first.

use super::{parse_filters, print_json, print_piece, print_sources, progress};
use clap::Args;
use docsage_core::{config::AppConfig, AppResult};
use docsage_knowledge::config::{llm_client, query_engine_config};
use docsage_knowledge::{open_index, QueryEngine, QueryResult};
use futures::StreamExt;

/// Ask a question over one index
#[derive(Args, Debug)]
pub struct AskCommand {
    /// Index name as declared in config.yaml
    pub index: String,

    /// The question to ask
    pub question: String,

    /// Number of fragments to retrieve
    #[arg(short = 'k', long, default_value = "2")]
    pub top_k: usize,

    /// Only consider fragments whose metadata matches (key=value, repeatable)
    #[arg(long = "filter")]
    pub filters: Vec<String>,

    /// Print the answer as it is generated
    #[arg(long, conflicts_with = "json")]
    pub stream: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Hide build progress
    #[arg(short, long)]
    pub quiet: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command for index '{}'", self.index);

        let opened = open_index(config, &self.index, progress(!self.quiet && !self.json)).await?;
        let engine_config = query_engine_config(config)?.with_filters(parse_filters(&self.filters)?);
        let engine = QueryEngine::new(&opened.store, opened.handle, llm_client(config)?, engine_config)?;

        if self.stream {
            let mut stream = engine.query_stream(&self.question, self.top_k, None).await?;
            while let Some(piece) = stream.next().await {
                print_piece(&piece?);
            }
            println!();
            println!();
            print_sources(&stream.sources);
            return Ok(());
        }

        let result = engine.query(&self.question, self.top_k, None).await?;
        self.print_result(&result)
    }

    fn print_result(&self, result: &QueryResult) -> AppResult<()> {
        if self.json {
            return print_json(result);
        }
        println!("{}", result.answer);
        println!();
        print_sources(&result.sources);
        Ok(())
    }
}
