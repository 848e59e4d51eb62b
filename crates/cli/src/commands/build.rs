//! Build command handler.
//!
//! Opens declared indexes through the cache-or-build path.

use super::{print_json, progress};
use clap::Args;
use docsage_core::{config::AppConfig, AppError, AppResult};
use docsage_knowledge::{open_index, IndexOrigin};

/// Build declared indexes, or load them if already persisted
#[derive(Args, Debug)]
pub struct BuildCommand {
    /// Index names (default: every index in config.yaml)
    pub indexes: Vec<String>,

    /// Hide build progress
    #[arg(short, long)]
    pub quiet: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl BuildCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let ids = selected_indexes(config, &self.indexes)?;
        tracing::info!("Executing build command for {} index(es)", ids.len());

        let mut reports = Vec::new();
        for id in &ids {
            let opened = open_index(config, id, progress(!self.quiet && !self.json)).await?;
            let summary = opened.handle.upgrade()?.summary();
            let origin = match opened.handle.origin() {
                IndexOrigin::Loaded => "loaded",
                IndexOrigin::Built { persisted: true } => "built",
                IndexOrigin::Built { persisted: false } => "built (not persisted)",
            };

            if self.json {
                reports.push(serde_json::json!({
                    "index": id,
                    "origin": origin,
                    "documents": summary.document_count,
                    "fragments": summary.fragment_count,
                    "location": summary.record.persisted_location,
                }));
            } else {
                println!(
                    "{}: {} ({} documents, {} fragments) at {}",
                    id,
                    origin,
                    summary.document_count,
                    summary.fragment_count,
                    summary.record.persisted_location.display()
                );
            }
        }

        if self.json {
            print_json(&reports)?;
        }
        Ok(())
    }
}

/// The requested index ids, or all declared ones when none are named.
pub(crate) fn selected_indexes(config: &AppConfig, requested: &[String]) -> AppResult<Vec<String>> {
    if requested.is_empty() {
        if config.indexes.is_empty() {
            return Err(AppError::Config(
                "No indexes declared. Add an `indexes:` section to .docsage/config.yaml".to_string(),
            ));
        }
        return Ok(config.indexes.keys().cloned().collect());
    }

    for id in requested {
        config.index(id)?;
    }
    Ok(requested.to_vec())
}
