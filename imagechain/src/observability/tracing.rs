//! Tracing setup and span helpers for chain execution.

use ::tracing::Subscriber;
use std::time::Instant;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "imagechain=info";

/// Installs the global tracing subscriber.
///
/// Honors `RUST_LOG`, falling back to [`DEFAULT_FILTER`]. With `json` set,
/// events are written as one JSON object per line.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(json: bool) -> Result<(), tracing_subscriber::util::TryInitError> {
    subscriber(json, std::io::stdout).try_init()
}

/// Builds the subscriber [`init_tracing`] installs, writing to `writer`.
pub fn subscriber<W>(json: bool, writer: W) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Clone + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let json_layer = json.then(|| {
        fmt::layer()
            .json()
            .with_current_span(false)
            .with_writer(writer.clone())
    });
    let text_layer = (!json).then(|| fmt::layer().with_target(false).with_writer(writer));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
}

/// Fields attached to stage log lines.
#[derive(Debug, Clone, Default)]
pub struct StageSpanAttributes {
    /// Chain name.
    pub chain: String,
    /// Stage name.
    pub stage: String,
    /// Zero-based stage position.
    pub stage_index: usize,
    /// Zero-based attempt counter.
    pub attempt: usize,
    /// Final stage status.
    pub status: Option<String>,
    /// Duration in milliseconds.
    pub duration_ms: Option<f64>,
    /// Error message if failed.
    pub error: Option<String>,
}

impl StageSpanAttributes {
    /// Creates attributes for a stage.
    #[must_use]
    pub fn new(chain: impl Into<String>, stage: impl Into<String>, stage_index: usize) -> Self {
        Self {
            chain: chain.into(),
            stage: stage.into(),
            stage_index,
            ..Default::default()
        }
    }

    /// Sets the attempt counter.
    #[must_use]
    pub fn with_attempt(mut self, attempt: usize) -> Self {
        self.attempt = attempt;
        self
    }

    /// Sets the stage status.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Sets the duration.
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Sets the error.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Converts to a JSON object for wide events.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut value = serde_json::json!({
            "stage": self.stage,
            "stage_index": self.stage_index,
            "attempt": self.attempt,
        });
        if let Some(ref status) = self.status {
            value["status"] = serde_json::json!(status);
        }
        if let Some(duration) = self.duration_ms {
            value["duration_ms"] = serde_json::json!(duration);
        }
        if let Some(ref error) = self.error {
            value["error"] = serde_json::json!(error);
        }
        value
    }
}

/// Simple span timing helper.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    name: String,
}

impl SpanTimer {
    /// Starts a new span timer.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns the span name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Finishes the span and returns the duration.
    #[must_use]
    pub fn finish(self) -> f64 {
        self.elapsed_ms()
    }
}
