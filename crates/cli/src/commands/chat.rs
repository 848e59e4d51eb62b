//! Chat command handler.
//!
//! A line-based REPL over one index. Follow-up questions are condensed with
//! the conversation so far before retrieval.

use super::{print_piece, print_sources, progress};
use clap::Args;
use docsage_core::{config::AppConfig, AppResult};
use docsage_knowledge::config::llm_client;
use docsage_knowledge::{open_query_engine, ChatSession, Conversation, WindowPolicy};
use futures::StreamExt;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Interactive chat over one index
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Index name as declared in config.yaml
    pub index: String,

    /// Number of fragments to retrieve per turn
    #[arg(short = 'k', long, default_value = "2")]
    pub top_k: usize,

    /// Keep only the most recent N messages of history
    #[arg(long)]
    pub window: Option<usize>,

    /// Wait for whole answers instead of streaming
    #[arg(long)]
    pub no_stream: bool,

    /// Print sources after each answer
    #[arg(long)]
    pub sources: bool,
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chat command for index '{}'", self.index);

        let (_store, engine) =
            open_query_engine(config, &self.index, llm_client(config)?, progress(true)).await?;

        let window = self
            .window
            .map(WindowPolicy::LastMessages)
            .unwrap_or_default();
        let mut session = ChatSession::new(Arc::new(engine), self.top_k)
            .with_conversation(Conversation::new().with_window(window));

        println!("Chatting with '{}'. Type /reset to start over, /exit to quit.", self.index);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            print!("> ");
            std::io::stdout().flush().ok();

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let message = line.trim();
            match message {
                "" => continue,
                "/exit" | "/quit" => break,
                "/reset" => {
                    session.reset();
                    println!("Conversation cleared.");
                    continue;
                }
                _ => {}
            }

            // A failed turn is reported and the session continues.
            if let Err(e) = self.turn(&mut session, message).await {
                tracing::warn!("Chat turn failed: {}", e);
                eprintln!("error: {}", e);
            }
        }

        Ok(())
    }

    async fn turn(&self, session: &mut ChatSession, message: &str) -> AppResult<()> {
        let sources = if self.no_stream {
            let result = session.chat(message).await?;
            println!("{}", result.answer);
            result.sources
        } else {
            let mut stream = session.stream_chat(message).await?;
            let sources = stream.query_stream().sources.clone();
            while let Some(piece) = stream.next().await {
                print_piece(&piece?);
            }
            println!();
            sources
        };

        if self.sources {
            print_sources(&sources);
        }
        Ok(())
    }
}
