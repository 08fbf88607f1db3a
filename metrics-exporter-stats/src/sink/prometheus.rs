use metrics::{Gauge, Histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use thiserror::Error;

use super::{RecorderSink, Sink, SinkError};

/// The default histogram buckets of the Prometheus client libraries.
pub const DEFAULT_BUCKETS: [f64; 11] =
    [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Errors that could occur while building a [`PrometheusSink`].
#[derive(Debug, Error)]
pub enum BuildError {
    /// The Prometheus recorder rejected the configuration.
    #[error("failed to build Prometheus recorder: {0}")]
    Prometheus(#[from] metrics_exporter_prometheus::BuildError),
}

/// A [`Sink`] that publishes into a Prometheus recorder.
///
/// The recorder is not installed globally. Instead, the host server renders the current state of
/// every instrument through [`PrometheusSink::render`] (or a cloned [`PrometheusHandle`]) when its
/// scrape endpoint is hit.
pub struct PrometheusSink {
    inner: RecorderSink<PrometheusRecorder>,
    handle: PrometheusHandle,
}

impl PrometheusSink {
    /// Creates a new `PrometheusSink` whose histograms use [`DEFAULT_BUCKETS`].
    ///
    /// # Panics
    ///
    /// Never in practice: the default buckets are not empty.
    pub fn new() -> Self {
        let builder = PrometheusBuilder::new()
            .set_buckets(&DEFAULT_BUCKETS)
            .expect("default buckets should never be empty");
        Self::from_builder(builder)
    }

    /// Creates a new `PrometheusSink` whose histograms use the given buckets.
    ///
    /// # Errors
    ///
    /// If `buckets` is empty, an error is returned.
    pub fn with_buckets(buckets: &[f64]) -> Result<Self, BuildError> {
        let builder = PrometheusBuilder::new().set_buckets(buckets)?;
        Ok(Self::from_builder(builder))
    }

    /// Creates a new `PrometheusSink` from a pre-configured builder.
    ///
    /// Only the recorder is built; any exporter configured on the builder (HTTP listener, push
    /// gateway) is ignored.
    pub fn from_builder(builder: PrometheusBuilder) -> Self {
        let recorder = builder.build_recorder();
        let handle = recorder.handle();

        PrometheusSink { inner: RecorderSink::new(recorder), handle }
    }

    /// Gets a [`PrometheusHandle`] to the underlying recorder.
    pub fn handle(&self) -> PrometheusHandle {
        self.handle.clone()
    }

    /// Renders every instrument in the Prometheus exposition format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

impl Default for PrometheusSink {
    fn default() -> Self {
        PrometheusSink::new()
    }
}

impl Sink for PrometheusSink {
    fn new_gauge(&self, key: &str) -> Result<Gauge, SinkError> {
        self.inner.new_gauge(key)
    }

    fn new_histogram(&self, key: &str) -> Result<Histogram, SinkError> {
        self.inner.new_histogram(key)
    }

    fn upkeep(&self) {
        // Drains recorded histogram samples into their buckets so memory stays bounded between
        // scrapes.
        self.handle.run_upkeep();
    }
}

#[cfg(test)]
mod tests {
    use super::{PrometheusSink, Sink};

    #[test]
    fn test_render_gauge_and_histogram() {
        let sink = PrometheusSink::new();

        let gauge = sink.new_gauge("node_peers").expect("gauge should be created");
        gauge.set(5.0);

        let histogram = sink.new_histogram("rcv_bytes").expect("histogram should be created");
        histogram.record(0.2);
        histogram.record(3.0);
        sink.upkeep();

        let rendered = sink.render();
        assert!(rendered.contains("# TYPE node_peers gauge\n"), "{rendered}");
        assert!(rendered.contains("node_peers 5\n"), "{rendered}");
        assert!(rendered.contains("# TYPE rcv_bytes histogram\n"), "{rendered}");
        assert!(rendered.contains("rcv_bytes_bucket{le=\"0.25\"} 1\n"), "{rendered}");
        assert!(rendered.contains("rcv_bytes_bucket{le=\"+Inf\"} 2\n"), "{rendered}");
        assert!(rendered.contains("rcv_bytes_count 2\n"), "{rendered}");
    }

    #[test]
    fn test_with_buckets_rejects_empty() {
        assert!(PrometheusSink::with_buckets(&[]).is_err());
        assert!(PrometheusSink::with_buckets(&[1.0, 10.0]).is_ok());
    }

    #[test]
    fn test_duplicate_keys_are_rejected() {
        let sink = PrometheusSink::new();

        assert!(sink.new_histogram("send_msgs").is_ok());
        assert!(sink.new_histogram("send_msgs").is_err());
        assert!(sink.new_gauge("send_msgs").is_err());
    }
}
