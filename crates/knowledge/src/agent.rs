//! Tool-routing agent.
//!
//! An [`Agent`] owns a fixed set of [`ToolDescriptor`]s. For each request it
//! asks a [`Router`] what to do next, invokes the chosen tool, records the
//! call in the trace and repeats until the router answers or the tool-call
//! budget runs out.

use crate::query::QueryEngine;
use crate::trace::{self, ObservabilitySink, TraceEvent};
use crate::types::MetadataValue;
use async_trait::async_trait;
use docsage_core::{AppError, AppResult};
use docsage_llm::{CompletionOptions, LlmClient, LlmRequest};
use docsage_prompt::{defaults, PromptTemplate};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

const DEFAULT_SYSTEM_INSTRUCTION: &str =
    "You are an assistant that answers questions by calling the tools below.";

/// A callable capability the agent can route to.
#[async_trait]
pub trait Tool: Send + Sync {
    async fn invoke(&self, input: Value) -> AppResult<Value>;
}

/// A named tool with its description and JSON input schema.
///
/// Immutable once the agent is configured.
#[derive(Clone)]
pub struct ToolDescriptor {
    name: String,
    description: String,
    input_schema: Value,
    tool: Arc<dyn Tool>,
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish_non_exhaustive()
    }
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        tool: Arc<dyn Tool>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            tool,
        }
    }

    /// Tool that answers a natural-language question from one index.
    pub fn query_engine(
        name: impl Into<String>,
        description: impl Into<String>,
        engine: Arc<QueryEngine>,
        top_k: usize,
    ) -> Self {
        Self::new(
            name,
            description,
            QueryEngineTool::input_schema(),
            Arc::new(QueryEngineTool::new(engine, top_k)),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    async fn call(&self, input: Value) -> AppResult<Value> {
        validate_input(&self.input_schema, &input)?;
        self.tool.invoke(input).await
    }
}

/// Binds a query engine as a tool. Input: `{"input": "<question>"}`.
pub struct QueryEngineTool {
    engine: Arc<QueryEngine>,
    top_k: usize,
}

impl QueryEngineTool {
    pub fn new(engine: Arc<QueryEngine>, top_k: usize) -> Self {
        Self { engine, top_k }
    }

    pub fn input_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "input": { "type": "string", "description": "A detailed plain-text question" }
            },
            "required": ["input"]
        })
    }
}

#[async_trait]
impl Tool for QueryEngineTool {
    async fn invoke(&self, input: Value) -> AppResult<Value> {
        let question = input
            .get("input")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::InvalidArgument("missing string field 'input'".to_string()))?;

        let result = self.engine.query(question, self.top_k, None).await?;
        let sources: Vec<Value> = result
            .sources
            .iter()
            .map(|s| {
                let file = match s.metadata.get("file_name") {
                    Some(MetadataValue::Text(name)) => Value::String(name.clone()),
                    _ => Value::Null,
                };
                json!({ "score": s.score, "file_name": file })
            })
            .collect();

        Ok(json!({ "answer": result.answer, "sources": sources }))
    }
}

pub type ToolFuture = Pin<Box<dyn Future<Output = AppResult<Value>> + Send>>;

/// Wraps a plain function as a tool.
pub struct FunctionTool {
    func: Arc<dyn Fn(Value) -> ToolFuture + Send + Sync>,
}

impl FunctionTool {
    pub fn new<F, Fut>(func: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Value>> + Send + 'static,
    {
        Self {
            func: Arc::new(move |input| Box::pin(func(input))),
        }
    }

    /// Synchronous function tool.
    pub fn from_fn<F>(func: F) -> Self
    where
        F: Fn(Value) -> AppResult<Value> + Send + Sync + 'static,
    {
        let func = Arc::new(func);
        Self::new(move |input| {
            let func = Arc::clone(&func);
            async move { func(input) }
        })
    }
}

#[async_trait]
impl Tool for FunctionTool {
    async fn invoke(&self, input: Value) -> AppResult<Value> {
        (self.func)(input).await
    }
}

/// Check `input` against the subset of JSON Schema tools declare:
/// object type, required keys and primitive property types.
fn validate_input(schema: &Value, input: &Value) -> AppResult<()> {
    if schema.get("type").and_then(Value::as_str) != Some("object") {
        return Ok(());
    }
    let object = input
        .as_object()
        .ok_or_else(|| AppError::InvalidArgument("tool input must be a JSON object".to_string()))?;

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if !object.contains_key(key) {
                return Err(AppError::InvalidArgument(format!(
                    "missing required field '{}'",
                    key
                )));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (key, value) in object {
            let Some(expected) = properties
                .get(key)
                .and_then(|p| p.get("type"))
                .and_then(Value::as_str)
            else {
                continue;
            };
            let ok = match expected {
                "string" => value.is_string(),
                "number" => value.is_number(),
                "integer" => value.is_i64() || value.is_u64(),
                "boolean" => value.is_boolean(),
                "array" => value.is_array(),
                "object" => value.is_object(),
                _ => true,
            };
            if !ok {
                return Err(AppError::InvalidArgument(format!(
                    "field '{}' must be of type {}",
                    key, expected
                )));
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoutingDecision {
    ToolCall { name: String, input: Value },
    FinalAnswer {
        answer: String,
        explanation: Option<String>,
    },
}

/// Everything a router sees when deciding the next step.
pub struct RoutingContext<'a> {
    pub request: &'a str,
    pub tools: &'a [ToolDescriptor],
    pub trace: &'a [TraceEntry],
    /// Tool calls still allowed; zero means the router should answer
    pub remaining_calls: usize,
    pub system_instruction: Option<&'a str>,
}

/// Decides the next step: call a tool or answer.
#[async_trait]
pub trait Router: Send + Sync {
    async fn decide(&self, context: &RoutingContext<'_>) -> AppResult<RoutingDecision>;
}

/// Router backed by the completion capability and the `agent.route` template.
pub struct LlmRouter {
    client: Arc<dyn LlmClient>,
    model: String,
    options: CompletionOptions,
    template: PromptTemplate,
}

impl LlmRouter {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>, options: CompletionOptions) -> Self {
        Self {
            client,
            model: model.into(),
            options,
            template: defaults::agent_route(),
        }
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    fn render(&self, context: &RoutingContext<'_>) -> AppResult<String> {
        let tools = context
            .tools
            .iter()
            .map(|t| format!("- {}: {}\n  input schema: {}", t.name, t.description, t.input_schema))
            .collect::<Vec<_>>()
            .join("\n");

        let trace = if context.trace.is_empty() {
            "(none)".to_string()
        } else {
            context
                .trace
                .iter()
                .enumerate()
                .map(|(i, entry)| {
                    format!(
                        "{}. {}({}) -> {}",
                        i + 1,
                        entry.tool_name,
                        entry.input,
                        entry.output.render()
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        let budget_note = if context.remaining_calls == 0 {
            "No tool calls remain. You must give your final answer now.".to_string()
        } else {
            format!("You may make at most {} more tool call(s).", context.remaining_calls)
        };

        self.template.render(&[
            (
                "system_instruction",
                context.system_instruction.unwrap_or(DEFAULT_SYSTEM_INSTRUCTION),
            ),
            ("tools", tools.as_str()),
            ("request", context.request),
            ("trace", trace.as_str()),
            ("budget_note", budget_note.as_str()),
        ])
    }
}

#[async_trait]
impl Router for LlmRouter {
    async fn decide(&self, context: &RoutingContext<'_>) -> AppResult<RoutingDecision> {
        let prompt = self.render(context)?;
        let request = LlmRequest::new(prompt, &self.model).with_options(&self.options);
        let response = self
            .client
            .complete(&request)
            .await
            .map_err(|e| AppError::Agent(format!("router unreachable: {}", e)))?;
        Ok(parse_decision(&response.content))
    }
}

/// Read a routing reply. Replies without a usable JSON object are taken as
/// the final answer verbatim.
pub fn parse_decision(reply: &str) -> RoutingDecision {
    let object = match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => {
            serde_json::from_str::<Value>(&reply[start..=end]).ok()
        }
        _ => None,
    };

    if let Some(object) = object {
        if let Some(name) = object.get("tool").and_then(Value::as_str) {
            return RoutingDecision::ToolCall {
                name: name.to_string(),
                input: object.get("input").cloned().unwrap_or(Value::Null),
            };
        }
        if let Some(answer) = object.get("answer").and_then(Value::as_str) {
            return RoutingDecision::FinalAnswer {
                answer: answer.to_string(),
                explanation: object
                    .get("explanation")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            };
        }
    }

    RoutingDecision::FinalAnswer {
        answer: reply.trim().to_string(),
        explanation: None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutput {
    Success(Value),
    /// The tool failed; the message names the tool
    Error(String),
}

impl ToolOutput {
    fn render(&self) -> String {
        match self {
            Self::Success(value) => value.to_string(),
            Self::Error(message) => format!("ERROR: {}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub tool_name: String,
    pub input: Value,
    pub output: ToolOutput,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentResult {
    pub answer: String,
    /// Tool calls in invocation order
    pub trace: Vec<TraceEntry>,
    pub explanation: Option<String>,
    /// True when the answer was synthesized because the budget ran out
    pub budget_exhausted: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AgentConfig {
    /// Persona and rules given to the router
    pub system_instruction: Option<String>,
}

pub struct Agent {
    router: Arc<dyn Router>,
    config: AgentConfig,
    tools: Option<Vec<ToolDescriptor>>,
    sink: Option<Arc<dyn ObservabilitySink>>,
}

impl Agent {
    pub fn new(router: Arc<dyn Router>, config: AgentConfig) -> Self {
        Self {
            router,
            config,
            tools: None,
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ObservabilitySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub(crate) fn sink(&self) -> Option<Arc<dyn ObservabilitySink>> {
        self.sink.clone()
    }

    /// Register the tool set. Allowed once; on error the agent stays unconfigured.
    pub fn configure(&mut self, tools: Vec<ToolDescriptor>) -> AppResult<()> {
        if self.tools.is_some() {
            return Err(AppError::AgentConfiguration(
                "agent is already configured".to_string(),
            ));
        }
        if tools.is_empty() {
            return Err(AppError::AgentConfiguration(
                "at least one tool is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for tool in &tools {
            if tool.name.trim().is_empty() {
                return Err(AppError::AgentConfiguration(
                    "tool names must not be empty".to_string(),
                ));
            }
            if !seen.insert(tool.name.as_str()) {
                return Err(AppError::AgentConfiguration(format!(
                    "duplicate tool name '{}'",
                    tool.name
                )));
            }
        }

        tracing::info!(tools = ?seen, "Agent configured");
        self.tools = Some(tools);
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.tools.is_some()
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        self.tools.as_deref().unwrap_or_default()
    }

    /// Route `request` through the tools, making at most `max_tool_calls` calls.
    pub async fn run(&self, request: &str, max_tool_calls: usize) -> AppResult<AgentResult> {
        let tools = self.tools.as_deref().ok_or_else(|| {
            AppError::AgentConfiguration("agent has no tools configured".to_string())
        })?;

        let start = Instant::now();
        let result = self.route(tools, request, max_tool_calls).await;

        let event = match &result {
            Ok(r) => TraceEvent::success("agent_run", "agent", start.elapsed())
                .with_detail(format!("{} tool call(s)", r.trace.len())),
            Err(e) => TraceEvent::failure("agent_run", "agent", start.elapsed(), e),
        };
        trace::emit(self.sink.as_deref(), event);
        result
    }

    async fn route(
        &self,
        tools: &[ToolDescriptor],
        request: &str,
        max_tool_calls: usize,
    ) -> AppResult<AgentResult> {
        let mut trace: Vec<TraceEntry> = Vec::new();

        loop {
            let context = RoutingContext {
                request,
                tools,
                trace: &trace,
                remaining_calls: max_tool_calls.saturating_sub(trace.len()),
                system_instruction: self.config.system_instruction.as_deref(),
            };

            let decision = self.router.decide(&context).await.map_err(|e| match e {
                AppError::Agent(_) => e,
                other => AppError::Agent(other.to_string()),
            })?;

            match decision {
                RoutingDecision::FinalAnswer {
                    answer,
                    explanation,
                } => {
                    return Ok(AgentResult {
                        answer,
                        trace,
                        explanation,
                        budget_exhausted: false,
                    });
                }
                RoutingDecision::ToolCall { name, .. } if trace.len() >= max_tool_calls => {
                    tracing::warn!(
                        tool = %name,
                        max_tool_calls,
                        "Tool-call budget exhausted, synthesizing answer"
                    );
                    return Ok(AgentResult {
                        answer: best_effort_answer(&trace),
                        trace,
                        explanation: None,
                        budget_exhausted: true,
                    });
                }
                RoutingDecision::ToolCall { name, input } => {
                    let descriptor = tools
                        .iter()
                        .find(|t| t.name == name)
                        .ok_or_else(|| AppError::UnknownTool { tool: name.clone() })?;

                    let output = self.invoke(descriptor, input.clone()).await;
                    trace.push(TraceEntry {
                        tool_name: name,
                        input,
                        output,
                    });
                }
            }
        }
    }

    async fn invoke(&self, descriptor: &ToolDescriptor, input: Value) -> ToolOutput {
        let start = Instant::now();
        tracing::info!(tool = %descriptor.name, input = %input, "Calling tool");

        match descriptor.call(input).await {
            Ok(value) => {
                trace::emit(
                    self.sink.as_deref(),
                    TraceEvent::success("tool_call", &descriptor.name, start.elapsed()),
                );
                ToolOutput::Success(value)
            }
            Err(e) => {
                let err = AppError::tool_invocation(&descriptor.name, e.to_string());
                tracing::warn!(error = %err, "Tool call failed");
                trace::emit(
                    self.sink.as_deref(),
                    TraceEvent::failure("tool_call", &descriptor.name, start.elapsed(), &err),
                );
                ToolOutput::Error(err.to_string())
            }
        }
    }
}

/// Answer assembled from the trace when the router never finished.
fn best_effort_answer(trace: &[TraceEntry]) -> String {
    let answers: Vec<String> = trace
        .iter()
        .filter_map(|entry| match &entry.output {
            ToolOutput::Success(value) => Some(match value.get("answer").and_then(Value::as_str) {
                Some(answer) => format!("{}: {}", entry.tool_name, answer),
                None => match value.as_str() {
                    Some(text) => format!("{}: {}", entry.tool_name, text),
                    None => format!("{}: {}", entry.tool_name, value),
                },
            }),
            ToolOutput::Error(_) => None,
        })
        .collect();

    if answers.is_empty() {
        "No answer could be produced within the tool-call budget.".to_string()
    } else {
        answers.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tool_call() {
        let decision = parse_decision(
            "Sure.\n{\"tool\": \"lyft_10k\", \"input\": {\"input\": \"Lyft revenue 2021\"}}",
        );
        assert_eq!(
            decision,
            RoutingDecision::ToolCall {
                name: "lyft_10k".to_string(),
                input: json!({"input": "Lyft revenue 2021"}),
            }
        );
    }

    #[test]
    fn test_parse_final_answer_with_explanation() {
        let decision = parse_decision(r#"{"answer": "Uber grew faster.", "explanation": "Compared both 10-Ks."}"#);
        assert_eq!(
            decision,
            RoutingDecision::FinalAnswer {
                answer: "Uber grew faster.".to_string(),
                explanation: Some("Compared both 10-Ks.".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_plain_text_is_answer() {
        let decision = parse_decision("  I don't need any tools for that.  ");
        assert_eq!(
            decision,
            RoutingDecision::FinalAnswer {
                answer: "I don't need any tools for that.".to_string(),
                explanation: None,
            }
        );
    }

    #[test]
    fn test_validate_input() {
        let schema = json!({
            "type": "object",
            "properties": { "a": {"type": "integer"}, "b": {"type": "integer"} },
            "required": ["a", "b"]
        });
        assert!(validate_input(&schema, &json!({"a": 2, "b": 3})).is_ok());
        assert!(validate_input(&schema, &json!({"a": 2})).is_err());
        assert!(validate_input(&schema, &json!({"a": "2", "b": 3})).is_err());
        assert!(validate_input(&schema, &json!("2 and 3")).is_err());
    }

    #[tokio::test]
    async fn test_function_tool() {
        let multiply = FunctionTool::from_fn(|input| {
            let a = input["a"].as_i64().unwrap_or(0);
            let b = input["b"].as_i64().unwrap_or(0);
            Ok(json!(a * b))
        });
        assert_eq!(multiply.invoke(json!({"a": 6, "b": 7})).await.unwrap(), json!(42));
    }

    #[test]
    fn test_best_effort_answer() {
        let trace = vec![
            TraceEntry {
                tool_name: "lyft_10k".to_string(),
                input: json!({"input": "revenue"}),
                output: ToolOutput::Success(json!({"answer": "$3.2B", "sources": []})),
            },
            TraceEntry {
                tool_name: "uber_10k".to_string(),
                input: json!({"input": "revenue"}),
                output: ToolOutput::Error("Tool 'uber_10k' failed: timeout".to_string()),
            },
        ];
        assert_eq!(best_effort_answer(&trace), "lyft_10k: $3.2B");
        assert!(best_effort_answer(&[]).contains("No answer"));
    }
}
