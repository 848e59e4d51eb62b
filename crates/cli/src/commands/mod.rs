//! Command handlers for the docsage CLI.
//!
//! Each command lives in its own submodule.

pub mod agent;
pub mod ask;
pub mod build;
pub mod chat;
pub mod complete;
pub mod evaluate;
pub mod prompts;
pub mod stats;

pub use agent::AgentCommand;
pub use ask::AskCommand;
pub use build::BuildCommand;
pub use chat::ChatCommand;
pub use complete::CompleteCommand;
pub use evaluate::EvaluateCommand;
pub use prompts::PromptsCommand;
pub use stats::StatsCommand;

use docsage_core::{AppError, AppResult};
use docsage_knowledge::{
    MetadataFilters, MetadataValue, ProgressEvent, ProgressReporter, SourceFragment,
};
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;

/// Pretty-print a value as JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Write a streamed piece to stdout immediately.
pub(crate) fn print_piece(piece: &str) {
    print!("{}", piece);
    std::io::stdout().flush().ok();
}

/// Build progress on stderr, or nothing.
pub(crate) fn progress(enabled: bool) -> ProgressReporter {
    if enabled {
        ProgressReporter::new(Arc::new(|event: ProgressEvent| eprintln!("{}", event.format_simple())))
    } else {
        ProgressReporter::noop()
    }
}

/// Parse repeated `--filter key=value` flags.
pub(crate) fn parse_filters(pairs: &[String]) -> AppResult<MetadataFilters> {
    MetadataFilters::parse_pairs(pairs.iter().map(String::as_str)).ok_or_else(|| {
        AppError::InvalidArgument("filters must be given as key=value".to_string())
    })
}

pub(crate) fn print_sources(sources: &[SourceFragment]) {
    if sources.is_empty() {
        println!("Sources: (none)");
        return;
    }
    println!("Sources:");
    for source in sources {
        let name = match source.metadata.get("file_name") {
            Some(MetadataValue::Text(name)) => name.as_str(),
            _ => "(unknown)",
        };
        match source.metadata.get("page_label") {
            Some(page) => println!("- {} p.{} (score {:.3})", name, page, source.score),
            None => println!("- {} (score {:.3})", name, source.score),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filters() {
        let filters = parse_filters(&["file_name=lyft_2021.pdf".to_string()]).unwrap();
        assert!(!filters.is_empty());
        assert!(parse_filters(&["no-equals-sign".to_string()]).is_err());
        assert!(parse_filters(&[]).unwrap().is_empty());
    }
}
