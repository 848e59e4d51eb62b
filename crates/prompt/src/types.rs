//! Prompt types.
//!
//! A `PromptDefinition` is the on-disk YAML form of a template override; a
//! `PromptTemplate` is the in-memory, renderable form used by engines.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A prompt override loaded from `.docsage/prompts/<id>.yml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Identifier of the template being overridden (e.g. "query.text_qa")
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    #[serde(default)]
    pub description: String,

    /// Handlebars template text
    pub template: String,

    /// Values bound ahead of time (e.g. `tone: "a Shakespeare play"`)
    #[serde(default)]
    pub partials: BTreeMap<String, String>,
}

/// A compiled-on-render Handlebars template with optional pre-bound values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub id: String,
    pub template: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub partials: BTreeMap<String, String>,
}

impl From<PromptDefinition> for PromptTemplate {
    fn from(def: PromptDefinition) -> Self {
        Self {
            id: def.id,
            template: def.template,
            partials: def.partials,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_definition_deserialization() {
        let yaml = r#"
id: query.text_qa
title: Shakespearean answers
apiVersion: "1.0"
template: |
  Context:
  {{context}}
  Answer "{{query}}" in the style of {{tone}}.
partials:
  tone: a Shakespeare play
"#;

        let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.id, "query.text_qa");
        assert_eq!(def.partials["tone"], "a Shakespeare play");

        let template = PromptTemplate::from(def);
        assert!(template.template.contains("{{query}}"));
        assert_eq!(template.partials.len(), 1);
    }
}
