//! Static tables translating upsd variables into exported metrics.
//!
//! To export another variable, add a row to [`VARIABLES`]; the TYPE/HELP
//! metadata is derived from the same row.

use std::collections::HashMap;
use std::sync::LazyLock;

use sensor_framework::MetricFamily;

/// One exported upsd variable.
#[derive(Debug, Clone, Copy)]
pub struct Variable {
    /// upsd variable name, e.g. `battery.charge`.
    pub field: &'static str,
    /// Exported metric name.
    pub metric: &'static str,
    /// HELP text.
    pub help: &'static str,
}

/// Every variable the collector exports, in exposition order.
pub const VARIABLES: &[Variable] = &[
    Variable {
        field: "battery.charge",
        metric: "upsc_battery_charge",
        help: "Battery charge (percent)",
    },
    Variable {
        field: "battery.charge.low",
        metric: "upsc_battery_charge_low",
        help: "Low battery charge threshold (percent)",
    },
    Variable {
        field: "battery.voltage",
        metric: "upsc_battery_voltage",
        help: "Battery voltage (V)",
    },
    Variable {
        field: "battery.voltage.high",
        metric: "upsc_battery_voltage_high",
        help: "Battery voltage high (V)",
    },
    Variable {
        field: "battery.voltage.low",
        metric: "upsc_battery_voltage_low",
        help: "Battery voltage low (V)",
    },
    Variable {
        field: "battery.voltage.nominal",
        metric: "upsc_battery_voltage_nominal",
        help: "Battery voltage nominal / expected (V)",
    },
    Variable {
        field: "input.frequency",
        metric: "upsc_input_frequency",
        help: "Input line frequency (Hz)",
    },
    Variable {
        field: "input.frequency.nominal",
        metric: "upsc_input_frequency_nominal",
        help: "Input line frequency nominal / expected (Hz)",
    },
    Variable {
        field: "input.voltage",
        metric: "upsc_input_voltage",
        help: "Input voltage (V)",
    },
    Variable {
        field: "input.voltage.fault",
        metric: "upsc_input_voltage_fault",
        help: "Input voltage fault (V)",
    },
    Variable {
        field: "input.voltage.nominal",
        metric: "upsc_input_voltage_nominal",
        help: "Input voltage nominal / expected (V)",
    },
    Variable {
        field: "input.current",
        metric: "upsc_input_current",
        help: "Input current (A)",
    },
    Variable {
        field: "output.voltage",
        metric: "upsc_output_voltage",
        help: "Output voltage (V)",
    },
    Variable {
        field: "ups.beeper.status",
        metric: "upsc_ups_beeper_enabled",
        help: "Beeper is enabled (bool)",
    },
    Variable {
        field: "ups.delay.shutdown",
        metric: "upsc_ups_delay_shutdown",
        help: "Wait number of seconds before shutdown (s)",
    },
    Variable {
        field: "ups.delay.start",
        metric: "upsc_ups_delay_start",
        help: "Start delay after number of seconds (s)",
    },
    Variable {
        field: "ups.load",
        metric: "upsc_ups_load",
        help: "Load on UPS (percent)",
    },
    Variable {
        field: "ups.status",
        metric: "upsc_ups_online",
        help: "UPS is online: 2 online, 1.5 online forced shutdown, 1 on battery, 0.5 on battery forced shutdown, 0 low battery",
    },
    Variable {
        field: "ups.temperature",
        metric: "upsc_ups_temperature",
        help: "UPS temperature (degrees C)",
    },
];

/// Numeric codes for symbolic values.
pub const STATUS_CODES: &[(&str, f64)] = &[
    ("enabled", 1.0),
    ("disabled", 0.0),
    ("muted", 0.0),
    // online, charged
    ("OL", 2.0),
    ("OL CHRG", 2.0),
    // online, forced shutdown
    ("FSD OL", 1.5),
    // on battery
    ("OB", 1.0),
    ("OB DISCHRG", 1.0),
    // on battery, forced shutdown
    ("FSD OB", 0.5),
    // low battery
    ("LB", 0.0),
    ("OB LB", 0.0),
    ("OB DISCHRG LB", 0.0),
];

static METRICS_BY_FIELD: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| VARIABLES.iter().map(|v| (v.field, v.metric)).collect());

static CODES_BY_VALUE: LazyLock<HashMap<&'static str, f64>> =
    LazyLock::new(|| STATUS_CODES.iter().copied().collect());

/// Metric name exported for a upsd variable, if it is exported at all.
pub fn metric_for(field: &str) -> Option<&'static str> {
    METRICS_BY_FIELD.get(field).copied()
}

/// Numeric code for a symbolic value.
pub fn status_code(value: &str) -> Option<f64> {
    CODES_BY_VALUE.get(value).copied()
}

/// TYPE/HELP metadata for every exported metric.
pub fn families() -> Vec<MetricFamily> {
    VARIABLES
        .iter()
        .map(|v| MetricFamily::gauge(v.metric, v.help))
        .collect()
}
