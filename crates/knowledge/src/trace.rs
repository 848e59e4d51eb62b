//! Structured trace events for store and query operations.

use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

/// One observed operation.
#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent {
    /// e.g. "open_or_build", "persist", "query", "tool_call"
    pub operation: &'static str,
    /// Index id or tool name
    pub target: String,
    pub duration: Duration,
    pub outcome: Outcome,
    /// Extra detail such as the cache path taken or the error message
    pub detail: Option<String>,
}

impl TraceEvent {
    pub fn success(operation: &'static str, target: impl Into<String>, duration: Duration) -> Self {
        Self {
            operation,
            target: target.into(),
            duration,
            outcome: Outcome::Success,
            detail: None,
        }
    }

    pub fn failure(
        operation: &'static str,
        target: impl Into<String>,
        duration: Duration,
        error: impl ToString,
    ) -> Self {
        Self {
            operation,
            target: target.into(),
            duration,
            outcome: Outcome::Failure,
            detail: Some(error.to_string()),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Receives trace events. Must not block.
pub trait ObservabilitySink: Send + Sync {
    fn record(&self, event: TraceEvent);
}

/// Emits each event as a `tracing` record under the `docsage::trace` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ObservabilitySink for TracingSink {
    fn record(&self, event: TraceEvent) {
        let duration_ms = event.duration.as_secs_f64() * 1000.0;
        match event.outcome {
            Outcome::Success => tracing::info!(
                target: "docsage::trace",
                operation = event.operation,
                target_name = %event.target,
                duration_ms,
                detail = event.detail.as_deref().unwrap_or(""),
                "ok"
            ),
            Outcome::Failure => tracing::warn!(
                target: "docsage::trace",
                operation = event.operation,
                target_name = %event.target,
                duration_ms,
                detail = event.detail.as_deref().unwrap_or(""),
                "failed"
            ),
        }
    }
}

/// Forward an event to an optional sink.
pub(crate) fn emit(sink: Option<&dyn ObservabilitySink>, event: TraceEvent) {
    if let Some(sink) = sink {
        sink.record(event);
    }
}
