//! Prometheus exporter for UPS units and other sensors.
//!
//! This crate wires the collector framework to the built-in sensor types and
//! exposes the result via an HTTP `/metrics` endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  upsd / sensor  │<────│    Scheduler    │────>│   HTTP Server   │
//! │  (LIST VAR ..)  │     │ (1 task / inst) │     │   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! sensor-exporter upsc,,main@nas
//! sensor-exporter --config config.json5
//! sensor-exporter --list
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

use std::fmt::Write;

use sensor_framework::{CollectorRegistry, RegistryError};

pub mod config;

pub use config::{CollectorEntry, ConfigError, ExporterConfig};

/// Registry holding every built-in sensor type.
pub fn builtin_registry() -> Result<CollectorRegistry, RegistryError> {
    let mut registry = CollectorRegistry::new();
    sensor_upsc::register(&mut registry)?;
    Ok(registry)
}

/// Human-readable listing of the registered sensor types.
pub fn describe_registry(registry: &CollectorRegistry) -> String {
    let mut out = String::new();
    for descriptor in registry.descriptors() {
        writeln!(
            out,
            "{} (suggested interval: {}s)",
            descriptor.name,
            descriptor.interval.as_secs()
        )
        .ok();
        for line in descriptor.description.lines() {
            writeln!(out, "    {}", line).ok();
        }
        out.push('\n');
    }
    out
}
