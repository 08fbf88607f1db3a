use std::sync::Arc;

use tracing::{debug, error, trace};

use crate::{
    common::{classify, MetricKind, NODE_GAUGES},
    registry::Registry,
    snapshot::{AggregatedSample, SampleMap, Snapshotter},
    telemetry::{Telemetry, TelemetryUpdate},
};

/// Publishes stats snapshots into the instruments of a registry.
pub(crate) struct Publisher<S> {
    snapshotter: S,
    registry: Arc<Registry>,
    telemetry: Arc<Telemetry>,
}

impl<S> Publisher<S>
where
    S: Snapshotter,
{
    /// Creates a new `Publisher`.
    pub fn new(snapshotter: S, registry: Arc<Registry>, telemetry: Arc<Telemetry>) -> Self {
        Publisher { snapshotter, registry, telemetry }
    }

    /// Runs a single publish cycle.
    ///
    /// A snapshot that cannot be restored is dropped along with the whole cycle, leaving every
    /// instrument untouched. Otherwise, node gauges are set to the maximum of their sample and
    /// every raw sample of `rcv`/`send` metrics is observed by the matching histogram. Metrics
    /// whose instrument cannot be created are skipped without affecting the others.
    pub fn write(&self) {
        let snapshot = self.snapshotter.snapshot();
        let metrics = match self.snapshotter.restore(snapshot) {
            Ok(metrics) => metrics,
            Err(e) => {
                debug!(error = %e, "Failed to restore stats snapshot, skipping publish cycle.");
                self.telemetry.track_cycle_skipped();
                return;
            }
        };

        let mut update = TelemetryUpdate::default();

        for name in NODE_GAUGES {
            if let Some(sample) = metrics.get(name) {
                self.gauge(name, sample, &mut update);
            }
        }

        self.histograms(&metrics, &mut update);

        self.registry.run_upkeep();
        self.telemetry.apply_update(&update);

        debug!(
            metrics = metrics.len(),
            gauges_set = update.gauges_set(),
            histogram_points = update.histogram_points(),
            sink_failures = update.sink_failures(),
            "Published stats snapshot."
        );
    }

    fn histograms(&self, metrics: &SampleMap, update: &mut TelemetryUpdate) {
        for (name, sample) in metrics {
            match classify(name) {
                MetricKind::Histogram => self.histogram(name, sample, update),
                MetricKind::Gauge => {}
                MetricKind::Ignored => trace!(metric_name = %name, "Ignoring metric."),
            }
        }
    }

    fn gauge(&self, name: &str, sample: &AggregatedSample, update: &mut TelemetryUpdate) {
        match self.registry.get_or_create_gauge(name) {
            Ok(gauge) => {
                gauge.set(sample.max);
                update.track_gauge_set();
            }
            Err(e) => {
                error!(metric_name = %name, error = %e, "Failed to create gauge.");
                update.track_sink_failure();
            }
        }
    }

    fn histogram(&self, name: &str, sample: &AggregatedSample, update: &mut TelemetryUpdate) {
        // A histogram is only created once there is something to observe.
        if sample.samples.is_empty() {
            return;
        }

        match self.registry.get_or_create_histogram(name) {
            Ok(histogram) => {
                for value in &sample.samples {
                    histogram.record(*value);
                }
                update.increment_histogram_points(sample.samples.len());
            }
            Err(e) => {
                error!(metric_name = %name, error = %e, "Failed to create histogram.");
                update.track_sink_failure();
            }
        }
    }
}
