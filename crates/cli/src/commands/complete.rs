//! Complete command handler.
//!
//! Sends a prompt straight to the configured model, with no index involved.

use super::{print_json, print_piece};
use clap::Args;
use docsage_core::{config::AppConfig, AppError, AppResult};
use docsage_knowledge::config::{completion_options, llm_client};
use docsage_llm::{LlmClient, LlmRequest, LlmUsage};
use futures::StreamExt;
use std::path::PathBuf;

/// Send a prompt straight to the model
#[derive(Args, Debug)]
pub struct CompleteCommand {
    /// The prompt text
    pub prompt: Option<String>,

    /// Read the prompt from a file
    #[arg(short, long, conflicts_with = "prompt")]
    pub file: Option<PathBuf>,

    /// Print the answer as it is generated
    #[arg(long)]
    pub stream: bool,

    /// Maximum tokens in response
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Temperature for response generation (0.0-1.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// System instruction for this request
    #[arg(long)]
    pub system: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl CompleteCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing complete command");

        let prompt = self.get_prompt()?;

        let mut options = completion_options(config);
        if let Some(max_tokens) = self.max_tokens {
            options.max_output_tokens = max_tokens;
        }
        if let Some(temperature) = self.temperature {
            options.temperature = temperature;
        }
        if let Some(ref system) = self.system {
            options.system_instruction = Some(system.clone());
        }
        options.validate()?;

        let client = llm_client(config)?;
        let request = LlmRequest::new(prompt, &config.model).with_options(&options);

        if self.stream {
            self.handle_streaming(client.as_ref(), request, config).await
        } else {
            self.handle_non_streaming(client.as_ref(), &request, config).await
        }
    }

    async fn handle_non_streaming(
        &self,
        client: &dyn LlmClient,
        request: &LlmRequest,
        config: &AppConfig,
    ) -> AppResult<()> {
        tracing::info!("Sending non-streaming request to LLM");
        let response = client.complete(request).await?;

        if self.json {
            print_json(&serde_json::json!({
                "answer": response.content,
                "model": response.model,
                "provider": config.provider,
                "usage": usage_json(&response.usage),
            }))?;
        } else {
            println!("{}", response.content);
            log_usage(&response.usage);
        }
        Ok(())
    }

    async fn handle_streaming(
        &self,
        client: &dyn LlmClient,
        request: LlmRequest,
        config: &AppConfig,
    ) -> AppResult<()> {
        tracing::info!("Starting streaming request to LLM");
        let request = request.with_streaming();
        let mut stream = client.stream(&request).await?;
        let mut full_content = String::new();
        let mut final_usage = None;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if !chunk.content.is_empty() {
                full_content.push_str(&chunk.content);
                if !self.json {
                    print_piece(&chunk.content);
                }
            }
            if chunk.done {
                final_usage = chunk.usage;
                break;
            }
        }

        let usage = final_usage.unwrap_or_default();
        if self.json {
            print_json(&serde_json::json!({
                "answer": full_content,
                "model": request.model,
                "provider": config.provider,
                "usage": usage_json(&usage),
            }))?;
        } else {
            println!();
            log_usage(&usage);
        }
        Ok(())
    }

    fn get_prompt(&self) -> AppResult<String> {
        if let Some(ref prompt) = self.prompt {
            return Ok(prompt.clone());
        }
        match self.file {
            Some(ref path) => std::fs::read_to_string(path)
                .map_err(|e| AppError::load(path, format!("cannot read prompt file: {}", e))),
            None => Err(AppError::InvalidArgument("No prompt provided".to_string())),
        }
    }
}

fn usage_json(usage: &LlmUsage) -> serde_json::Value {
    serde_json::json!({
        "promptTokens": usage.prompt_tokens,
        "completionTokens": usage.completion_tokens,
        "totalTokens": usage.total_tokens,
    })
}

fn log_usage(usage: &LlmUsage) {
    tracing::debug!(
        "Token usage - Prompt: {}, Completion: {}, Total: {}",
        usage.prompt_tokens,
        usage.completion_tokens,
        usage.total_tokens
    );
}
