//! Registry of sensor types.
//!
//! Each collector crate contributes a [`CollectorDescriptor`] during the
//! initialization phase through `&mut CollectorRegistry`. Once populated, the
//! registry is shared immutably (usually behind an `Arc`) and needs no locking.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::collector::{Collector, CollectorOptions};
use crate::error::Result;

/// Registry errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A descriptor with this type name is already registered.
    #[error("Collector type '{0}' is already registered")]
    Duplicate(String),

    /// No descriptor with this type name exists.
    #[error("Unknown collector type '{0}'")]
    NotFound(String),
}

/// Prometheus metric type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
}

impl MetricKind {
    /// Get the TYPE comment string for Prometheus exposition format.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
        }
    }
}

/// Static TYPE/HELP metadata for one metric name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricFamily {
    pub name: String,
    pub kind: MetricKind,
    pub help: String,
}

impl MetricFamily {
    /// Describe a gauge.
    pub fn gauge(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: MetricKind::Gauge,
            help: help.into(),
        }
    }

    /// Describe a counter.
    pub fn counter(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: MetricKind::Counter,
            help: help.into(),
        }
    }

    /// `# TYPE <name> <kind>`
    pub fn type_line(&self) -> String {
        format!("# TYPE {} {}", self.name, self.kind.as_str())
    }

    /// `# HELP <name> <help>`
    pub fn help_line(&self) -> String {
        format!("# HELP {} {}", self.name, self.help)
    }
}

/// Constructs a collector instance from its per-instance options.
pub type CollectorFactory = fn(&CollectorOptions) -> Result<Box<dyn Collector>>;

/// Registered metadata for one sensor type.
#[derive(Clone)]
pub struct CollectorDescriptor {
    /// Unique type name used in collector definitions, e.g. `upsc`.
    pub name: String,
    /// Builds an instance from options.
    pub factory: CollectorFactory,
    /// Interval used unless the operator overrides it.
    pub interval: Duration,
    /// Every metric this type may emit.
    pub families: Vec<MetricFamily>,
    /// Usage text shown by `--list`.
    pub description: String,
}

impl CollectorDescriptor {
    /// Create a descriptor with no metric families and no description.
    pub fn new(name: impl Into<String>, factory: CollectorFactory, interval: Duration) -> Self {
        Self {
            name: name.into(),
            factory,
            interval,
            families: Vec::new(),
            description: String::new(),
        }
    }

    /// Set the metric catalog.
    pub fn with_families(mut self, families: Vec<MetricFamily>) -> Self {
        self.families = families;
        self
    }

    /// Set the human description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// TYPE lines in catalog order.
    pub fn type_lines(&self) -> Vec<String> {
        self.families.iter().map(MetricFamily::type_line).collect()
    }

    /// HELP lines in catalog order.
    pub fn help_lines(&self) -> Vec<String> {
        self.families.iter().map(MetricFamily::help_line).collect()
    }

    /// Build a collector instance.
    pub fn build(&self, options: &CollectorOptions) -> Result<Box<dyn Collector>> {
        (self.factory)(options)
    }
}

impl fmt::Debug for CollectorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectorDescriptor")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("families", &self.families.len())
            .finish_non_exhaustive()
    }
}

/// Table of sensor types, append-only during initialization.
#[derive(Debug, Default)]
pub struct CollectorRegistry {
    descriptors: BTreeMap<String, CollectorDescriptor>,
}

impl CollectorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sensor type.
    ///
    /// Fails if the type name is already taken; the existing descriptor is kept.
    pub fn register(&mut self, descriptor: CollectorDescriptor) -> std::result::Result<(), RegistryError> {
        if self.descriptors.contains_key(&descriptor.name) {
            warn!(collector = %descriptor.name, "Collector type already registered, ignoring");
            return Err(RegistryError::Duplicate(descriptor.name));
        }

        debug!(
            collector = %descriptor.name,
            interval = ?descriptor.interval,
            families = descriptor.families.len(),
            "Registered collector type"
        );
        self.descriptors.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    /// Look up a sensor type by name.
    pub fn resolve(&self, name: &str) -> std::result::Result<&CollectorDescriptor, RegistryError> {
        self.descriptors
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// All registered descriptors, ordered by type name.
    pub fn descriptors(&self) -> impl Iterator<Item = &CollectorDescriptor> {
        self.descriptors.values()
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether no type has been registered.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
