//! The collector contract every sensor type implements.

use std::fmt::Write;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::labels::LabelSet;

/// Default bound for a single network operation (connect, read, write).
pub const DEFAULT_SCRAPE_TIMEOUT: Duration = Duration::from_secs(10);

/// A recoverable failure encountered during one scrape.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The transport could not be opened.
    #[error("failed to connect to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// An operation exceeded its deadline.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// Read or write failure on an open transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the connection before the response was complete.
    #[error("connection closed before end of response")]
    UnexpectedEof,

    /// The peer answered with something the protocol does not allow here.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A reading could not be converted to a number.
    #[error("could not parse value {value:?} of {field}: {message}")]
    Data {
        field: String,
        value: String,
        message: String,
    },
}

impl ScrapeError {
    /// Create a timeout error for the named operation.
    pub fn timeout(operation: &'static str, timeout: Duration) -> Self {
        Self::Timeout { operation, timeout }
    }

    /// Create a protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Error category used as a structured log field.
    pub fn category(&self) -> &'static str {
        match self {
            ScrapeError::Connect { .. }
            | ScrapeError::Timeout { .. }
            | ScrapeError::Io(_)
            | ScrapeError::UnexpectedEof => "transport",
            ScrapeError::Protocol(_) => "protocol",
            ScrapeError::Data { .. } => "data",
        }
    }
}

/// Result of one scrape.
///
/// Every variant carries a fragment the exposition store can publish as-is:
/// a failed scrape publishes nothing, a partial one publishes the samples read
/// before the failure.
#[derive(Debug)]
pub enum ScrapeOutcome {
    /// All readings were collected.
    Complete(String),
    /// Some readings were collected before a data error stopped the scrape.
    Partial { fragment: String, error: ScrapeError },
    /// Nothing usable was collected.
    Failed(ScrapeError),
}

impl ScrapeOutcome {
    /// The fragment to publish for this outcome.
    pub fn fragment(&self) -> &str {
        match self {
            ScrapeOutcome::Complete(fragment) => fragment,
            ScrapeOutcome::Partial { fragment, .. } => fragment,
            ScrapeOutcome::Failed(_) => "",
        }
    }

    /// The failure behind this outcome, if any.
    pub fn error(&self) -> Option<&ScrapeError> {
        match self {
            ScrapeOutcome::Complete(_) => None,
            ScrapeOutcome::Partial { error, .. } => Some(error),
            ScrapeOutcome::Failed(error) => Some(error),
        }
    }

    /// Whether this outcome counts as an incident.
    pub fn is_incident(&self) -> bool {
        self.error().is_some()
    }

    /// Consume the outcome, keeping only its fragment.
    pub fn into_fragment(self) -> String {
        match self {
            ScrapeOutcome::Complete(fragment) => fragment,
            ScrapeOutcome::Partial { fragment, .. } => fragment,
            ScrapeOutcome::Failed(_) => String::new(),
        }
    }
}

/// Per-instance construction parameters handed to a collector factory.
#[derive(Debug, Clone)]
pub struct CollectorOptions {
    /// Type-specific options, e.g. `ups@host:3493`.
    pub opts: String,
    /// Operator label override replacing the collector's own labels.
    pub labels: Option<LabelSet>,
    /// Bound for each network operation of a scrape.
    pub timeout: Duration,
}

impl CollectorOptions {
    /// Create options with no label override and the default timeout.
    pub fn new(opts: impl Into<String>) -> Self {
        Self {
            opts: opts.into(),
            labels: None,
            timeout: DEFAULT_SCRAPE_TIMEOUT,
        }
    }

    /// Set the label override.
    pub fn with_labels(mut self, labels: LabelSet) -> Self {
        self.labels = Some(labels);
        self
    }

    /// Set the per-operation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A configured sensor instance that produces exposition fragments on demand.
///
/// Implementations must:
/// - perform at most one transport interaction per [`scrape`](Self::scrape),
///   with no internal retry;
/// - bound every blocking operation with a timeout;
/// - report failures through [`ScrapeOutcome`] instead of panicking.
///
/// The scheduler owns each instance exclusively, so `scrape` takes `&mut self`
/// and is never called concurrently for the same instance.
#[async_trait]
pub trait Collector: Send {
    /// Human-readable identity used in logs, e.g. `main@nas:3493`.
    fn name(&self) -> &str;

    /// The label set attached to every sample this instance emits.
    fn labels(&self) -> &LabelSet;

    /// Check that the sensor is reachable.
    ///
    /// Called once after construction. A failure is logged by the caller and
    /// never prevents the instance from being scheduled.
    async fn probe(&mut self) -> Result<(), ScrapeError> {
        Ok(())
    }

    /// Collect the current readings.
    async fn scrape(&mut self) -> ScrapeOutcome;
}

/// Append one sample line `<name><labels> <value>` with a two-decimal value.
pub fn write_sample(out: &mut String, name: &str, labels: &LabelSet, value: f64) {
    writeln!(out, "{}{} {:.2}", name, labels, value).ok();
}
