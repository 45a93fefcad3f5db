//! Configuration for the sensor exporter.

use std::path::Path;
use std::time::Duration;

use sensor_common::LoggingConfig;
use sensor_framework::http::RESERVED_PATHS;
use sensor_framework::{
    CollectorDefinition, DEFAULT_SCRAPE_DEADLINE, DEFAULT_SCRAPE_TIMEOUT, ScheduleSettings,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] sensor_common::Error),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Invalid collector '{spec}': {source}")]
    Collector {
        spec: String,
        #[source]
        source: sensor_framework::FrameworkError,
    },
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Exposition endpoint settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Scrape timing settings.
    #[serde(default)]
    pub scrape: ScrapeConfig,

    /// Collector instances, in exposition order.
    #[serde(default)]
    pub collectors: Vec<CollectorEntry>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Address to listen on (default: "0.0.0.0:9255").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_listen() -> String {
    "0.0.0.0:9255".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
        }
    }
}

/// Scrape timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Bound for each network operation (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Hard deadline for one whole scrape (seconds).
    #[serde(default = "default_deadline")]
    pub deadline_secs: u64,

    /// Interval for every instance without its own, instead of the
    /// sensor type's suggestion (seconds).
    #[serde(default)]
    pub interval_secs: Option<u64>,
}

fn default_timeout() -> u64 {
    DEFAULT_SCRAPE_TIMEOUT.as_secs()
}

fn default_deadline() -> u64 {
    DEFAULT_SCRAPE_DEADLINE.as_secs()
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            deadline_secs: default_deadline(),
            interval_secs: None,
        }
    }
}

/// One configured collector instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorEntry {
    /// Definition in `type,labels,opts` form.
    pub spec: String,

    /// Interval for this instance (seconds).
    #[serde(default)]
    pub interval_secs: Option<u64>,
}

impl CollectorEntry {
    /// Entry without an interval override.
    pub fn new(spec: impl Into<String>) -> Self {
        Self {
            spec: spec.into(),
            interval_secs: None,
        }
    }

    /// Parse the definition and apply the interval override.
    pub fn definition(&self) -> Result<CollectorDefinition, ConfigError> {
        let definition =
            CollectorDefinition::parse(&self.spec).map_err(|source| ConfigError::Collector {
                spec: self.spec.clone(),
                source,
            })?;

        Ok(match self.interval_secs {
            Some(secs) => definition.with_interval(Duration::from_secs(secs)),
            None => definition,
        })
    }
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: ExporterConfig = sensor_common::load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = sensor_common::parse_config(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Collectors may still be added from the command line afterwards, so an
    /// empty list is only rejected by [`ExporterConfig::require_collectors`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "Invalid listen address: {}",
                self.http.listen
            )));
        }

        if !self.http.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        if RESERVED_PATHS.contains(&self.http.path.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Metrics path {} is reserved",
                self.http.path
            )));
        }

        if self.scrape.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeout_secs must be > 0".to_string(),
            ));
        }

        if self.scrape.deadline_secs < self.scrape.timeout_secs {
            return Err(ConfigError::Validation(
                "deadline_secs must be >= timeout_secs".to_string(),
            ));
        }

        if self.scrape.interval_secs == Some(0) {
            return Err(ConfigError::Validation(
                "interval_secs must be > 0".to_string(),
            ));
        }

        for entry in &self.collectors {
            if entry.interval_secs == Some(0) {
                return Err(ConfigError::Validation(format!(
                    "interval_secs of '{}' must be > 0",
                    entry.spec
                )));
            }
            entry.definition()?;
        }

        Ok(())
    }

    /// Fail when no collector is configured.
    pub fn require_collectors(&self) -> Result<(), ConfigError> {
        if self.collectors.is_empty() {
            return Err(ConfigError::Validation(
                "no collectors configured".to_string(),
            ));
        }
        Ok(())
    }

    /// Parsed definitions of every configured collector.
    pub fn definitions(&self) -> Result<Vec<CollectorDefinition>, ConfigError> {
        self.collectors.iter().map(CollectorEntry::definition).collect()
    }

    /// Scheduling parameters derived from the scrape settings.
    pub fn schedule_settings(&self) -> ScheduleSettings {
        ScheduleSettings {
            timeout: Duration::from_secs(self.scrape.timeout_secs),
            deadline: Duration::from_secs(self.scrape.deadline_secs),
            interval: self.scrape.interval_secs.map(Duration::from_secs),
        }
    }
}
