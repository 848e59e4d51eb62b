//! Workspace prompt overrides.
//!
//! Overrides live in `.docsage/prompts/<id>.yml` and replace the built-in
//! template with the same id.

use crate::defaults;
use crate::types::{PromptDefinition, PromptTemplate};
use docsage_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

fn prompts_dir(workspace_path: &Path) -> PathBuf {
    workspace_path.join(".docsage/prompts")
}

/// Load a prompt override by id from the workspace.
///
/// # Example
/// ```no_run
/// use docsage_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), "query.text_qa")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompts_dir(workspace_path).join(format!("{}.yml", prompt_id));

    tracing::debug!("Loading prompt from: {:?}", prompt_file);

    if !prompt_file.exists() {
        return Err(AppError::Prompt(format!(
            "Prompt file not found: {:?}",
            prompt_file
        )));
    }

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse prompt YAML {:?}: {}",
            prompt_file, e
        ))
    })?;

    validate_prompt(&definition, prompt_id)?;

    tracing::info!("Loaded prompt override: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// The workspace override for `prompt_id` if one exists, else the built-in.
pub fn resolve_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptTemplate> {
    if prompts_dir(workspace_path)
        .join(format!("{}.yml", prompt_id))
        .exists()
    {
        return load_prompt(workspace_path, prompt_id).map(PromptTemplate::from);
    }

    defaults::builtin_template(prompt_id)
        .ok_or_else(|| AppError::Prompt(format!("Unknown prompt id: {}", prompt_id)))
}

/// All prompt ids available in the workspace: built-ins plus overrides.
pub fn list_prompts(workspace_path: &Path) -> AppResult<Vec<String>> {
    let mut prompt_ids: Vec<String> = defaults::builtin_ids()
        .iter()
        .map(|id| id.to_string())
        .collect();

    let dir = prompts_dir(workspace_path);
    if dir.exists() {
        for entry in walkdir::WalkDir::new(&dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("yml") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    if !prompt_ids.iter().any(|id| id == stem) {
                        prompt_ids.push(stem.to_string());
                    }
                }
            }
        }
    }

    Ok(prompt_ids)
}

fn validate_prompt(def: &PromptDefinition, expected_id: &str) -> AppResult<()> {
    if def.id != expected_id {
        return Err(AppError::Prompt(format!(
            "Prompt file {}.yml declares id '{}'",
            expected_id, def.id
        )));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    // An override must still consume every variable the built-in is fed.
    if let Some(builtin) = defaults::builtin_template(expected_id) {
        let template = PromptTemplate::new(def.id.clone(), def.template.clone())?;
        let used = template.variables();
        let missing: Vec<String> = builtin
            .variables()
            .into_iter()
            .filter(|v| !used.contains(v))
            .collect();
        if !missing.is_empty() {
            return Err(AppError::Prompt(format!(
                "Override for '{}' does not use required variables: {}",
                expected_id,
                missing.join(", ")
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_prompt(dir: &Path, id: &str, body: &str) -> PathBuf {
        let prompts_dir = dir.join(".docsage/prompts");
        fs::create_dir_all(&prompts_dir).unwrap();
        let file_path = prompts_dir.join(format!("{}.yml", id));
        fs::write(&file_path, body).unwrap();
        file_path
    }

    fn qa_override(id: &str) -> String {
        format!(
            r#"
id: {}
title: "Pirate answers"
apiVersion: "1.0"
template: "Context: {{{{context}}}} Q: {{{{query}}}} Answer like a {{{{persona}}}}."
partials:
  persona: pirate
"#,
            id
        )
    }

    #[test]
    fn test_load_valid_prompt() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(temp_dir.path(), "query.text_qa", &qa_override("query.text_qa"));

        let prompt = load_prompt(temp_dir.path(), "query.text_qa").unwrap();
        assert_eq!(prompt.title, "Pirate answers");

        let template = resolve_prompt(temp_dir.path(), "query.text_qa").unwrap();
        let rendered = template
            .render(&[("context", "ctx"), ("query", "q")])
            .unwrap();
        assert_eq!(rendered, "Context: ctx Q: q Answer like a pirate.");
    }

    #[test]
    fn test_resolve_falls_back_to_builtin() {
        let temp_dir = TempDir::new().unwrap();
        let template = resolve_prompt(temp_dir.path(), "chat.condense").unwrap();
        assert_eq!(template, defaults::condense());
        assert!(resolve_prompt(temp_dir.path(), "no.such").is_err());
    }

    #[test]
    fn test_load_nonexistent_prompt() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_prompt(temp_dir.path(), "nonexistent").is_err());
    }

    #[test]
    fn test_load_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(temp_dir.path(), "invalid", "invalid: yaml: content:");
        assert!(load_prompt(temp_dir.path(), "invalid").is_err());
    }

    #[test]
    fn test_override_missing_required_variable() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(
            temp_dir.path(),
            "query.text_qa",
            "id: query.text_qa\ntitle: t\napiVersion: \"1.0\"\ntemplate: \"{{query}}\"\n",
        );
        let err = load_prompt(temp_dir.path(), "query.text_qa").unwrap_err();
        assert!(err.to_string().contains("context"));
    }

    #[test]
    fn test_list_prompts() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(temp_dir.path(), "query.text_qa", &qa_override("query.text_qa"));
        write_prompt(temp_dir.path(), "custom.summary", &qa_override("custom.summary"));

        let prompts = list_prompts(temp_dir.path()).unwrap();
        assert_eq!(prompts.len(), 7);
        assert!(prompts.contains(&"custom.summary".to_string()));
    }
}
