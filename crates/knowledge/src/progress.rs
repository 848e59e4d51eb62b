//! Progress reporting for index builds.
//!
//! A build walks through discover, load, chunk, embed and persist. Each phase
//! emits [`ProgressEvent`]s through an optional callback and to `tracing`.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Discover,
    Load,
    Chunk,
    Extract,
    Embed,
    Persist,
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Discover => "discover",
            Self::Load => "load",
            Self::Chunk => "chunk",
            Self::Extract => "extract",
            Self::Embed => "embed",
            Self::Persist => "persist",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub index_id: String,
    pub phase: BuildPhase,

    /// Units processed so far (files, documents, fragments)
    pub current: u64,

    /// Total expected work, if known
    pub total: Option<u64>,

    pub message: String,

    /// Seconds since the reporter was created
    pub elapsed_secs: f64,
}

impl ProgressEvent {
    pub fn percentage(&self) -> Option<f64> {
        self.total.map(|t| {
            if t > 0 {
                (self.current as f64 / t as f64) * 100.0
            } else {
                100.0
            }
        })
    }

    /// Format as a simple user-facing line.
    pub fn format_simple(&self) -> String {
        let progress = match self.total {
            Some(total) => format!("{}/{}", self.current, total),
            None => self.current.to_string(),
        };
        let pct = self
            .percentage()
            .map(|p| format!(" ({:.0}%)", p))
            .unwrap_or_default();

        format!(
            "[{}:{}] {}{} - {}",
            self.index_id, self.phase, progress, pct, self.message
        )
    }
}

pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    start_time: Instant,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::noop()
    }
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            start_time: Instant::now(),
        }
    }

    /// Reporter that only logs.
    pub fn noop() -> Self {
        Self {
            callback: None,
            start_time: Instant::now(),
        }
    }

    pub fn emit(
        &self,
        index_id: &str,
        phase: BuildPhase,
        current: u64,
        total: Option<u64>,
        message: impl Into<String>,
    ) {
        let event = ProgressEvent {
            index_id: index_id.to_string(),
            phase,
            current,
            total,
            message: message.into(),
            elapsed_secs: self.start_time.elapsed().as_secs_f64(),
        };

        tracing::debug!(
            index_id = %event.index_id,
            phase = %event.phase,
            current = event.current,
            total = ?event.total,
            message = %event.message,
            elapsed_secs = event.elapsed_secs,
            "Build progress"
        );

        if let Some(callback) = &self.callback {
            callback(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_progress_event_format() {
        let event = ProgressEvent {
            index_id: "lyft".to_string(),
            phase: BuildPhase::Embed,
            current: 5,
            total: Some(10),
            message: "model=trigram-v1".to_string(),
            elapsed_secs: 0.5,
        };
        let formatted = event.format_simple();
        assert_eq!(formatted, "[lyft:embed] 5/10 (50%) - model=trigram-v1");
    }

    #[test]
    fn test_progress_reporter_emit() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);

        let reporter = ProgressReporter::new(Arc::new(move |event| {
            sink.lock().unwrap().push(event);
        }));
        reporter.emit("essay", BuildPhase::Discover, 3, None, "3 files");

        let captured = events.lock().unwrap();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].phase, BuildPhase::Discover);
        assert_eq!(captured[0].percentage(), None);
    }

    #[test]
    fn test_noop_reporter() {
        ProgressReporter::noop().emit("x", BuildPhase::Load, 1, Some(1), "done");
    }
}
