//! Prompts command handler.
//!
//! Lists the templates engines use, or shows one after workspace overrides.

use super::print_json;
use clap::Args;
use docsage_core::{config::AppConfig, AppResult};
use docsage_prompt::{list_prompts, resolve_prompt};

/// List or show prompt templates
#[derive(Args, Debug)]
pub struct PromptsCommand {
    /// Show the effective template for this id
    #[arg(long)]
    pub show: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl PromptsCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        if let Some(ref id) = self.show {
            let template = resolve_prompt(&config.workspace, id)?;
            if self.json {
                return print_json(&serde_json::json!({
                    "id": template.id,
                    "variables": template.variables(),
                    "unbound": template.unbound_variables(),
                    "template": template.template,
                }));
            }
            println!("# {} (variables: {})", template.id, template.unbound_variables().join(", "));
            println!("{}", template.template);
            return Ok(());
        }

        let ids = list_prompts(&config.workspace)?;
        if self.json {
            return print_json(&ids);
        }
        for id in ids {
            println!("{}", id);
        }
        Ok(())
    }
}
