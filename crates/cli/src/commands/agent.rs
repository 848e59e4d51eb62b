//! Agent command handler.
//!
//! Exposes each selected index as a query tool and lets the model route the
//! request between them.

use super::build::selected_indexes;
use super::{print_json, progress};
use clap::Args;
use docsage_core::{config::AppConfig, AppResult};
use docsage_knowledge::config::{agent as routing_agent, llm_client};
use docsage_knowledge::{open_query_engine, AgentResult, ToolDescriptor, ToolOutput};
use std::sync::Arc;

/// Route a request across several indexes with an agent
#[derive(Args, Debug)]
pub struct AgentCommand {
    /// The request to answer
    pub request: String,

    /// Indexes to expose as tools (repeatable; default: all declared)
    #[arg(short, long = "index")]
    pub indexes: Vec<String>,

    /// Maximum number of tool calls
    #[arg(long, default_value = "5")]
    pub max_tool_calls: usize,

    /// Fragments retrieved per tool call
    #[arg(short = 'k', long, default_value = "2")]
    pub top_k: usize,

    /// Print each tool call
    #[arg(long)]
    pub show_trace: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AgentCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let ids = selected_indexes(config, &self.indexes)?;
        tracing::info!("Executing agent command over {} index(es)", ids.len());

        let llm = llm_client(config)?;

        // Stores own the loaded indexes; keep them alive for the whole run.
        let mut stores = Vec::with_capacity(ids.len());
        let mut tools = Vec::with_capacity(ids.len());
        for id in &ids {
            let (store, engine) =
                open_query_engine(config, id, Arc::clone(&llm), progress(!self.json)).await?;
            let description = match config.index(id)?.description.as_str() {
                "" => format!("Answers questions about the '{}' documents", id),
                text => text.to_string(),
            };
            tools.push(ToolDescriptor::query_engine(
                id.as_str(),
                description,
                Arc::new(engine),
                self.top_k,
            ));
            stores.push(store);
        }

        let mut agent = routing_agent(config, llm)?;
        agent.configure(tools)?;

        let result = agent.run(&self.request, self.max_tool_calls).await?;
        tracing::debug!(loaded = stores.len(), calls = result.trace.len(), "Agent finished");
        self.print_result(&result)
    }

    fn print_result(&self, result: &AgentResult) -> AppResult<()> {
        if self.json {
            return print_json(result);
        }

        if self.show_trace {
            for (i, entry) in result.trace.iter().enumerate() {
                match &entry.output {
                    ToolOutput::Success(_) => {
                        println!("[{}] {} {}", i + 1, entry.tool_name, entry.input)
                    }
                    ToolOutput::Error(message) => {
                        println!("[{}] {} {} -> {}", i + 1, entry.tool_name, entry.input, message)
                    }
                }
            }
            println!();
        }

        println!("{}", result.answer);
        if let Some(ref explanation) = result.explanation {
            println!();
            println!("Explanation: {}", explanation);
        }
        if result.budget_exhausted {
            eprintln!(
                "note: stopped after {} tool call(s); the answer was assembled from tool output",
                result.trace.len()
            );
        }
        Ok(())
    }
}
