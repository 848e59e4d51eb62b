//! Template rendering.

use crate::types::PromptTemplate;
use docsage_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::BTreeMap;

impl PromptTemplate {
    /// Create a template, checking that it compiles.
    pub fn new(id: impl Into<String>, template: impl Into<String>) -> AppResult<Self> {
        let template = Self {
            id: id.into(),
            template: template.into(),
            partials: BTreeMap::new(),
        };
        template.compile()?;
        Ok(template)
    }

    /// Bind a variable ahead of time. Values passed to `render` take precedence.
    pub fn partial_format(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.partials.insert(name.into(), value.into());
        self
    }

    /// Variable names referenced by the template, in order of first use.
    ///
    /// Block helpers, comments and partial calls are skipped; only plain
    /// `{{name}}` and `{{{name}}}` expressions count.
    pub fn variables(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let mut rest = self.template.as_str();

        while let Some(start) = rest.find("{{") {
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                break;
            };
            let expr = after[..end].trim_matches(|c| c == '{' || c == '}').trim();
            rest = &after[end + 2..];

            let is_helper = expr.starts_with(['#', '/', '!', '>', '^']) || expr == "else";
            let is_name = !expr.is_empty()
                && expr
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '.');
            if !is_helper && is_name && !names.iter().any(|n| n == expr) {
                names.push(expr.to_string());
            }
        }

        names
    }

    /// Variables still unbound after partial application.
    pub fn unbound_variables(&self) -> Vec<String> {
        self.variables()
            .into_iter()
            .filter(|name| !self.partials.contains_key(name))
            .collect()
    }

    /// Render with the given variables merged over the partials.
    ///
    /// Rendering is strict: a referenced variable with no value is an error
    /// rather than an empty string.
    pub fn render(&self, variables: &[(&str, &str)]) -> AppResult<String> {
        let mut values: BTreeMap<&str, &str> = self
            .partials
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        for (name, value) in variables {
            values.insert(name, value);
        }

        let handlebars = self.compile()?;
        handlebars
            .render(&self.id, &values)
            .map_err(|e| AppError::Prompt(format!("Failed to render '{}': {}", self.id, e)))
    }

    fn compile(&self) -> AppResult<Handlebars<'static>> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars.set_strict_mode(true);
        handlebars
            .register_template_string(&self.id, &self.template)
            .map_err(|e| {
                AppError::Prompt(format!("Failed to register template '{}': {}", self.id, e))
            })?;
        Ok(handlebars)
    }
}
