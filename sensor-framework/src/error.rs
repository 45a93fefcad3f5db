//! Error types for the collector framework.

use thiserror::Error;

use crate::registry::RegistryError;

/// Result type alias using [`FrameworkError`].
pub type Result<T> = std::result::Result<T, FrameworkError>;

/// Errors that prevent a collector instance from being created or the
/// exporter from starting.
///
/// Scrape-time failures are not represented here; they are reported through
/// [`ScrapeOutcome`](crate::ScrapeOutcome) and never stop the exporter.
#[derive(Error, Debug)]
pub enum FrameworkError {
    /// A collector definition string could not be parsed.
    #[error("Invalid collector definition '{definition}': {message}")]
    Definition { definition: String, message: String },

    /// A label override could not be parsed.
    #[error("Invalid label set '{labels}': {message}")]
    Labels { labels: String, message: String },

    /// Registry lookup or registration failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A collector would be scheduled with a zero interval.
    #[error("Collector '{collector}' has a zero scrape interval")]
    Interval { collector: String },

    /// A collector factory rejected its options.
    #[error("Failed to create '{kind}' collector: {source}")]
    Collector {
        kind: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl FrameworkError {
    /// Wrap a factory error for the given collector type.
    pub fn collector<E>(kind: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Collector {
            kind: kind.into(),
            source: Box::new(source),
        }
    }
}
