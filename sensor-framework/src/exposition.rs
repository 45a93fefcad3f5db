//! Exposition store holding the latest fragment of every collector instance.

use std::collections::HashSet;
use std::fmt::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::incidents::IncidentCounter;
use crate::registry::MetricFamily;

/// Prefix of the exporter's own metrics.
pub const SELF_PREFIX: &str = "sensor_exporter";

/// The latest fragment produced by one collector instance.
#[derive(Debug)]
pub struct FragmentSlot {
    name: String,
    fragment: RwLock<String>,
    scrapes: AtomicU64,
}

impl FragmentSlot {
    fn new(name: String) -> Self {
        Self {
            name,
            fragment: RwLock::new(String::new()),
            scrapes: AtomicU64::new(0),
        }
    }

    /// Instance name this slot belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the fragment wholesale and count the completed scrape.
    pub fn replace(&self, fragment: String) {
        *self.fragment.write() = fragment;
        self.scrapes.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy of the current fragment.
    pub fn fragment(&self) -> String {
        self.fragment.read().clone()
    }

    /// Number of completed scrapes.
    pub fn scrapes(&self) -> u64 {
        self.scrapes.load(Ordering::Relaxed)
    }
}

/// Shared handle to a fragment slot.
pub type SharedSlot = Arc<FragmentSlot>;

/// Collects metric families and slots before the store is frozen.
#[derive(Debug, Default)]
pub struct ExpositionBuilder {
    families: Vec<MetricFamily>,
    seen: HashSet<String>,
    slots: Vec<SharedSlot>,
}

impl ExpositionBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add metric families to the preamble, skipping names already present.
    pub fn add_families(&mut self, families: &[MetricFamily]) -> &mut Self {
        for family in families {
            if self.seen.insert(family.name.clone()) {
                self.families.push(family.clone());
            }
        }
        self
    }

    /// Allocate the fragment slot for a new instance.
    pub fn add_slot(&mut self, name: impl Into<String>) -> SharedSlot {
        let slot = Arc::new(FragmentSlot::new(name.into()));
        self.slots.push(slot.clone());
        slot
    }

    /// Freeze the preamble and slot list.
    pub fn build(self, incidents: IncidentCounter) -> ExpositionStore {
        let mut preamble = String::new();
        for family in &self.families {
            writeln!(preamble, "{}", family.help_line()).ok();
            writeln!(preamble, "{}", family.type_line()).ok();
        }

        ExpositionStore {
            preamble,
            families: self.families,
            slots: self.slots,
            incidents,
        }
    }
}

/// Thread-safe holder of the exposition document parts.
///
/// Readers never wait for a scrape: a slot is only locked for the duration of
/// a string swap or copy. Slots are read one at a time, so a snapshot may mix
/// fragments from different ticks of different instances.
#[derive(Debug)]
pub struct ExpositionStore {
    preamble: String,
    families: Vec<MetricFamily>,
    slots: Vec<SharedSlot>,
    incidents: IncidentCounter,
}

impl ExpositionStore {
    /// Start building a store.
    pub fn builder() -> ExpositionBuilder {
        ExpositionBuilder::new()
    }

    /// Render the full exposition document.
    ///
    /// Layout: HELP/TYPE preamble, one fragment per instance in configuration
    /// order, then the exporter's own metrics.
    pub fn snapshot(&self) -> String {
        let mut output = String::with_capacity(self.preamble.len() + self.slots.len() * 512);
        output.push_str(&self.preamble);

        for slot in &self.slots {
            output.push_str(&slot.fragment.read());
        }

        self.write_self_metrics(&mut output);
        output
    }

    fn write_self_metrics(&self, output: &mut String) {
        let scrapes: u64 = self.slots.iter().map(|s| s.scrapes()).sum();

        writeln!(
            output,
            "# HELP {SELF_PREFIX}_incidents_total Recoverable failures while scraping sensors"
        )
        .ok();
        writeln!(output, "# TYPE {SELF_PREFIX}_incidents_total counter").ok();
        writeln!(output, "{SELF_PREFIX}_incidents_total {}", self.incidents.get()).ok();

        writeln!(
            output,
            "# HELP {SELF_PREFIX}_scrapes_total Completed scrape attempts over all collectors"
        )
        .ok();
        writeln!(output, "# TYPE {SELF_PREFIX}_scrapes_total counter").ok();
        writeln!(output, "{SELF_PREFIX}_scrapes_total {}", scrapes).ok();

        writeln!(
            output,
            "# HELP {SELF_PREFIX}_collectors Configured collector instances"
        )
        .ok();
        writeln!(output, "# TYPE {SELF_PREFIX}_collectors gauge").ok();
        writeln!(output, "{SELF_PREFIX}_collectors {}", self.slots.len()).ok();
    }

    /// Metric families in preamble order.
    pub fn families(&self) -> &[MetricFamily] {
        &self.families
    }

    /// Fragment slots in configuration order.
    pub fn slots(&self) -> &[SharedSlot] {
        &self.slots
    }

    /// The shared incident counter.
    pub fn incidents(&self) -> &IncidentCounter {
        &self.incidents
    }

    /// Whether every instance has completed at least one scrape.
    pub fn is_ready(&self) -> bool {
        self.slots.iter().all(|slot| slot.scrapes() > 0)
    }
}

/// Create a shareable store handle.
pub type SharedStore = Arc<ExpositionStore>;
