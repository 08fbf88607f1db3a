use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use metrics::Counter;

/// A counter handle that can also be read back.
struct TelemetryCounter {
    handle: Counter,
    value: Arc<AtomicU64>,
}

impl TelemetryCounter {
    fn increment(&self, value: u64) {
        self.handle.increment(value);
    }

    fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Default for TelemetryCounter {
    fn default() -> Self {
        let value = Arc::new(AtomicU64::new(0));
        TelemetryCounter { handle: Counter::from_arc(Arc::clone(&value)), value }
    }
}

/// Exporter telemetry.
///
/// `Telemetry` collects information about what the publisher has done over the lifetime of the
/// exporter. None of it is ever surfaced as an error: a skipped cycle or a failed instrument only
/// shows up here and in the logs.
#[derive(Default)]
pub(crate) struct Telemetry {
    cycles_completed: TelemetryCounter,
    cycles_skipped: TelemetryCounter,
    gauges_set: TelemetryCounter,
    histogram_points: TelemetryCounter,
    sink_failures: TelemetryCounter,
}

impl Telemetry {
    /// Applies the update buffer of a completed publish cycle.
    pub fn apply_update(&self, update: &TelemetryUpdate) {
        self.cycles_completed.increment(1);
        self.gauges_set.increment(update.gauges_set);
        self.histogram_points.increment(update.histogram_points);
        self.sink_failures.increment(update.sink_failures);
    }

    /// Tracks a publish cycle abandoned because its snapshot could not be restored.
    pub fn track_cycle_skipped(&self) {
        self.cycles_skipped.increment(1);
    }

    /// Takes a point-in-time copy of the counters.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            cycles_completed: self.cycles_completed.get(),
            cycles_skipped: self.cycles_skipped.get(),
            gauges_set: self.gauges_set.get(),
            histogram_points: self.histogram_points.get(),
            sink_failures: self.sink_failures.get(),
        }
    }
}

/// A point-in-time copy of the exporter's telemetry.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TelemetrySnapshot {
    /// Publish cycles that restored their snapshot and applied it.
    pub cycles_completed: u64,

    /// Publish cycles abandoned because the snapshot could not be restored.
    pub cycles_skipped: u64,

    /// Gauge updates.
    pub gauges_set: u64,

    /// Histogram observations.
    pub histogram_points: u64,

    /// Metrics skipped because their instrument could not be created.
    pub sink_failures: u64,
}

/// A buffer for collecting the telemetry of a single publish cycle.
#[derive(Debug, Default)]
pub(crate) struct TelemetryUpdate {
    gauges_set: u64,
    histogram_points: u64,
    sink_failures: u64,
}

impl TelemetryUpdate {
    /// Tracks a gauge update.
    pub fn track_gauge_set(&mut self) {
        self.gauges_set += 1;
    }

    /// Increments the number of histogram observations.
    pub fn increment_histogram_points(&mut self, value: usize) {
        self.histogram_points += value as u64;
    }

    /// Tracks a metric skipped because its instrument could not be created.
    pub fn track_sink_failure(&mut self) {
        self.sink_failures += 1;
    }

    pub fn gauges_set(&self) -> u64 {
        self.gauges_set
    }

    pub fn histogram_points(&self) -> u64 {
        self.histogram_points
    }

    pub fn sink_failures(&self) -> u64 {
        self.sink_failures
    }
}
