//! Parsing of `type,labels,opts` collector definitions.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{FrameworkError, Result};
use crate::labels::LabelSet;

/// One configured collector instance, as given on the command line or in the
/// configuration file.
///
/// The textual form is `type,labels,opts`:
/// - `type` names a registered sensor type;
/// - `labels` is empty or a label override (see [`LabelSet::parse_override`]);
/// - `opts` is passed to the factory untouched and may itself contain commas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorDefinition {
    pub kind: String,
    pub labels: Option<LabelSet>,
    pub opts: String,
    /// Per-instance interval override.
    pub interval: Option<Duration>,
}

impl CollectorDefinition {
    /// Parse a definition string.
    pub fn parse(definition: &str) -> Result<Self> {
        let invalid = |message: &str| FrameworkError::Definition {
            definition: definition.to_string(),
            message: message.to_string(),
        };

        let mut parts = definition.splitn(3, ',');
        let kind = parts.next().unwrap_or_default().trim();
        let (Some(labels), Some(opts)) = (parts.next(), parts.next()) else {
            return Err(invalid("expected 'type,labels,opts'"));
        };

        if kind.is_empty() {
            return Err(invalid("collector type is empty"));
        }

        let labels = match labels.trim() {
            "" => None,
            labels => Some(LabelSet::parse_override(labels)?),
        };

        Ok(Self {
            kind: kind.to_string(),
            labels,
            opts: opts.trim().to_string(),
            interval: None,
        })
    }

    /// Set the per-instance interval override.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }
}

impl FromStr for CollectorDefinition {
    type Err = FrameworkError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for CollectorDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},", self.kind)?;
        if let Some(labels) = &self.labels {
            for (i, (key, value)) in labels.iter().enumerate() {
                if i > 0 {
                    f.write_str(";")?;
                }
                write!(f, "{}={}", key, value)?;
            }
        }
        write!(f, ",{}", self.opts)
    }
}
