//! Stats command handler.
//!
//! Shows what is persisted for each declared index without loading it.

use super::build::selected_indexes;
use super::print_json;
use clap::Args;
use docsage_core::{config::AppConfig, AppResult};
use docsage_knowledge::describe_index;

/// Show what is persisted for each index
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Index names (default: every index in config.yaml)
    pub indexes: Vec<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let mut rows = Vec::new();
        for id in selected_indexes(config, &self.indexes)? {
            let summary = match describe_index(config, &id).await {
                Ok(summary) => summary,
                Err(e) => {
                    tracing::warn!(index = %id, error = %e, "Persisted index unreadable");
                    None
                }
            };

            if self.json {
                rows.push(serde_json::json!({ "index": id, "persisted": summary }));
                continue;
            }

            match summary {
                Some(s) => {
                    println!("{}", id);
                    println!("  Location: {}", s.record.persisted_location.display());
                    println!("  Built: {}", s.record.build_timestamp.to_rfc3339());
                    println!("  Documents: {}", s.document_count);
                    println!("  Fragments: {}", s.fragment_count);
                    println!(
                        "  Embedding: {}/{} ({} dims)",
                        s.embedding.provider, s.embedding.model, s.embedding.dimensions
                    );
                    println!(
                        "  Chunking: size {}, overlap {}",
                        s.chunking.chunk_size, s.chunking.chunk_overlap
                    );
                    if !s.extractors.is_empty() {
                        println!("  Extractors: {}", s.extractors.join(", "));
                    }
                }
                None => println!("{}\n  (not built: {})", id, config.persist_dir_for(&id).display()),
            }
        }

        if self.json {
            print_json(&rows)?;
        }
        Ok(())
    }
}
