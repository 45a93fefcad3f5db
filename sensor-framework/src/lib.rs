//! Sensor Exporter Framework
//!
//! Pluggable collector framework that scrapes heterogeneous sensors and
//! republishes their readings as a Prometheus text exposition.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   resolve   ┌──────────────┐   tick    ┌──────────────┐
//! │   Registry   │────────────>│  Scheduler   │──────────>│  Collector   │
//! │ (descriptors)│             │ (1 task/inst)│<──────────│  (scrape)    │
//! └──────────────┘             └──────┬───────┘  outcome  └──────────────┘
//!                                     │ replace fragment
//!                              ┌──────▼───────┐   GET     ┌──────────────┐
//!                              │  Exposition  │<──────────│ HTTP server  │
//!                              │    store     │  snapshot │  (/metrics)  │
//!                              └──────────────┘           └──────────────┘
//! ```
//!
//! This framework provides:
//! - [`Collector`], the one-method contract implemented per sensor type
//! - [`CollectorRegistry`] mapping type names to [`CollectorDescriptor`]s
//! - [`CollectorDefinition`] parsing of `type,labels,opts` strings
//! - [`Scheduler`] running one independent loop per instance
//! - [`ExpositionStore`] assembling the exposition document
//! - [`HttpServer`] serving it
//!
//! # Example
//!
//! ```ignore
//! let mut registry = CollectorRegistry::new();
//! sensor_upsc::register(&mut registry)?;
//!
//! let definitions = vec![CollectorDefinition::parse("upsc,,main@nas")?];
//! let scheduler = Scheduler::build(&registry, &definitions, &ScheduleSettings::default())?;
//! let store = scheduler.store();
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! scheduler.start(shutdown_rx.clone());
//! HttpServer::new(store, "0.0.0.0:9255".parse()?, "/metrics".into()).run(shutdown_rx).await?;
//! ```

pub mod collector;
pub mod definition;
mod error;
pub mod exposition;
pub mod http;
pub mod incidents;
pub mod labels;
pub mod registry;
pub mod scheduler;

pub use collector::{
    Collector, CollectorOptions, DEFAULT_SCRAPE_TIMEOUT, ScrapeError, ScrapeOutcome, write_sample,
};
pub use definition::CollectorDefinition;
pub use error::{FrameworkError, Result};
pub use exposition::{ExpositionStore, FragmentSlot, SharedSlot, SharedStore};
pub use http::HttpServer;
pub use incidents::IncidentCounter;
pub use labels::LabelSet;
pub use registry::{
    CollectorDescriptor, CollectorFactory, CollectorRegistry, MetricFamily, MetricKind,
    RegistryError,
};
pub use scheduler::{
    DEFAULT_SCRAPE_DEADLINE, MIN_INTERVAL, ScheduleSettings, ScheduledInstance, Scheduler,
};

// Re-export commonly used types from sensor-common
pub use sensor_common::{LogFormat, LoggingConfig};
