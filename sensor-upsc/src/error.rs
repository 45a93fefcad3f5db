//! Construction errors for the UPS collector.

use sensor_framework::FrameworkError;

use crate::COLLECTOR_TYPE;

/// Errors that prevent a UPS collector instance from being created.
#[derive(Debug, thiserror::Error)]
pub enum UpscError {
    #[error("could not understand UPS address '{opts}': {reason}")]
    InvalidOptions { opts: String, reason: String },

    #[error("could not compile pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl From<UpscError> for FrameworkError {
    fn from(err: UpscError) -> Self {
        FrameworkError::collector(COLLECTOR_TYPE, err)
    }
}
