//! UPS collector speaking the upsd (Network UPS Tools) protocol.
//!
//! Every scrape opens a fresh TCP connection to upsd, sends
//! `LIST VAR <ups>` and converts the variables listed in
//! [`mapping::VARIABLES`] into gauge samples.
//!
//! # Options
//!
//! ```text
//! upsc,,UPS            # UPS on the local upsd (localhost:3493)
//! upsc,,UPS@HOST       # UPS on a remote upsd, default port
//! upsc,,UPS@HOST:PORT  # UPS on a remote upsd, custom port
//! ```
//!
//! Samples carry `{ups="UPS"}`, plus `host="HOST"` when a host is given.
//!
//! See the upsd network protocol reference:
//! <https://networkupstools.org/docs/developer-guide.chunked/net-protocol.html>

use std::time::Duration;

use sensor_framework::{
    Collector, CollectorDescriptor, CollectorOptions, CollectorRegistry, RegistryError,
};

pub mod collector;
pub mod error;
pub mod mapping;
pub mod target;

pub use collector::UpscCollector;
pub use error::UpscError;
pub use target::{DEFAULT_HOST, DEFAULT_PORT, UpsTarget};

/// Type name used in collector definitions.
pub const COLLECTOR_TYPE: &str = "upsc";

/// Suggested scrape interval.
pub const SUGGESTED_INTERVAL: Duration = Duration::from_secs(10);

const DESCRIPTION: &str = "\
Reads UPS variables from a upsd daemon (Network UPS Tools).
To use it with the suggested scrape interval (HOST may be omitted for localhost):

  sensor-exporter upsc,,UPS@HOST";

/// Factory registered for the `upsc` type.
pub fn create(options: &CollectorOptions) -> sensor_framework::Result<Box<dyn Collector>> {
    Ok(Box::new(UpscCollector::new(options)?))
}

/// Descriptor for the `upsc` type.
pub fn descriptor() -> CollectorDescriptor {
    CollectorDescriptor::new(COLLECTOR_TYPE, create, SUGGESTED_INTERVAL)
        .with_families(mapping::families())
        .with_description(DESCRIPTION)
}

/// Register the `upsc` type.
pub fn register(registry: &mut CollectorRegistry) -> Result<(), RegistryError> {
    registry.register(descriptor())
}
