//! Per-instance scrape scheduling.
//!
//! Every configured instance gets its own tokio task and its own ticker, so a
//! slow or hanging sensor never delays another. Within one instance the task
//! awaits each scrape before waiting for the next tick, and missed ticks are
//! skipped rather than queued, so scrapes of the same instance never overlap.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, timeout};
use tracing::{debug, info, warn};

use crate::collector::{
    Collector, CollectorOptions, DEFAULT_SCRAPE_TIMEOUT, ScrapeError, ScrapeOutcome,
};
use crate::definition::CollectorDefinition;
use crate::error::{FrameworkError, Result};
use crate::exposition::{ExpositionStore, SharedSlot, SharedStore};
use crate::incidents::IncidentCounter;
use crate::registry::CollectorRegistry;

/// Default hard deadline for a whole scrape.
pub const DEFAULT_SCRAPE_DEADLINE: Duration = Duration::from_secs(30);

/// Shortest interval an instance is ticked at.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Scheduling parameters shared by all instances.
#[derive(Debug, Clone)]
pub struct ScheduleSettings {
    /// Bound for each network operation, passed to collector factories.
    pub timeout: Duration,
    /// Hard deadline for one complete scrape.
    pub deadline: Duration,
    /// Interval applied to every instance without its own override.
    pub interval: Option<Duration>,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_SCRAPE_TIMEOUT,
            deadline: DEFAULT_SCRAPE_DEADLINE,
            interval: None,
        }
    }
}

/// A collector instance bound to its slot and interval.
pub struct ScheduledInstance {
    name: String,
    collector: Box<dyn Collector>,
    interval: Duration,
    deadline: Duration,
    slot: SharedSlot,
    incidents: IncidentCounter,
}

impl ScheduledInstance {
    /// Bind a collector to a slot.
    ///
    /// Intervals below [`MIN_INTERVAL`] are raised to it.
    pub fn new(
        collector: Box<dyn Collector>,
        interval: Duration,
        deadline: Duration,
        slot: SharedSlot,
        incidents: IncidentCounter,
    ) -> Self {
        Self {
            name: collector.name().to_string(),
            collector,
            interval: interval.max(MIN_INTERVAL),
            deadline,
            slot,
            incidents,
        }
    }

    /// Instance name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Scrape interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Perform one scrape and publish its fragment.
    ///
    /// Returns whether the scrape was an incident.
    pub async fn tick(&mut self) -> bool {
        let outcome = match timeout(self.deadline, self.collector.scrape()).await {
            Ok(outcome) => outcome,
            Err(_) => ScrapeOutcome::Failed(ScrapeError::timeout("scrape", self.deadline)),
        };

        let incident = match outcome.error() {
            Some(error) => {
                let total = self.incidents.record();
                warn!(
                    collector = %self.name,
                    category = error.category(),
                    error = %error,
                    kept_bytes = outcome.fragment().len(),
                    incidents = total,
                    "Scrape failed"
                );
                true
            }
            None => {
                debug!(
                    collector = %self.name,
                    samples = outcome.fragment().lines().count(),
                    "Scrape complete"
                );
                false
            }
        };

        self.slot.replace(outcome.into_fragment());
        incident
    }

    /// Check that the sensor is reachable, logging a failure.
    ///
    /// Returns whether the probe succeeded.
    pub async fn probe(&mut self) -> bool {
        match self.collector.probe().await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    collector = %self.name,
                    error = %e,
                    "Collector added but sensor is not reachable yet"
                );
                false
            }
        }
    }

    /// Probe the sensor once, then scrape at the configured interval until
    /// shutdown is signalled.
    ///
    /// The first scrape happens right after the probe, whatever its result.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            collector = %self.name,
            interval = ?self.interval,
            "Starting collector"
        );

        self.probe().await;

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        debug!(collector = %self.name, "Collector stopped");
    }
}

/// Owns every scheduled instance and the store they publish to.
pub struct Scheduler {
    instances: Vec<ScheduledInstance>,
    store: SharedStore,
}

impl Scheduler {
    /// Resolve and construct every defined instance.
    ///
    /// Fails on the first unknown type, rejected options or zero interval.
    /// Sensors are probed later, by each instance's own task.
    pub fn build(
        registry: &CollectorRegistry,
        definitions: &[CollectorDefinition],
        settings: &ScheduleSettings,
    ) -> Result<Self> {
        let incidents = IncidentCounter::new();
        let mut builder = ExpositionStore::builder();
        let mut pending = Vec::with_capacity(definitions.len());
        let mut identities: HashMap<(String, String), String> = HashMap::new();

        for definition in definitions {
            let descriptor = registry.resolve(&definition.kind)?;

            let mut options =
                CollectorOptions::new(definition.opts.clone()).with_timeout(settings.timeout);
            if let Some(labels) = &definition.labels {
                options = options.with_labels(labels.clone());
            }

            let collector = descriptor.build(&options)?;

            let identity = (descriptor.name.clone(), collector.labels().to_string());
            if let Some(previous) = identities.insert(identity, collector.name().to_string()) {
                warn!(
                    collector = %collector.name(),
                    other = %previous,
                    labels = %collector.labels(),
                    "Two collectors share the same type and labels; their series will be indistinguishable"
                );
            }

            let interval = definition
                .interval
                .or(settings.interval)
                .unwrap_or(descriptor.interval);
            if interval.is_zero() {
                return Err(FrameworkError::Interval {
                    collector: collector.name().to_string(),
                });
            }

            builder.add_families(&descriptor.families);
            let slot = builder.add_slot(collector.name());
            pending.push((collector, interval, slot));
        }

        let store = SharedStore::new(builder.build(incidents.clone()));
        let instances = pending
            .into_iter()
            .map(|(collector, interval, slot)| {
                ScheduledInstance::new(collector, interval, settings.deadline, slot, incidents.clone())
            })
            .collect();

        Ok(Self { instances, store })
    }

    /// The store every instance publishes to.
    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    /// Scheduled instances, in configuration order.
    pub fn instances(&self) -> &[ScheduledInstance] {
        &self.instances
    }

    /// Spawn one task per instance.
    pub fn start(self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        info!(collectors = self.instances.len(), "Starting scheduler");

        self.instances
            .into_iter()
            .map(|instance| tokio::spawn(instance.run(shutdown.clone())))
            .collect()
    }
}
