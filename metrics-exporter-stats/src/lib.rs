//! A [`metrics`]-compatible exporter that periodically publishes aggregated stats snapshots as
//! Prometheus-style gauges and histograms.
//!
//! # Usage
//!
//! The exporter pulls from a [`Snapshotter`], which captures the statistics of the host and
//! decodes them into one [`AggregatedSample`] per metric name, and pushes into a [`Sink`], which
//! creates the instruments those samples are written to:
//!
//! ```no_run
//! # #[cfg(feature = "prometheus")]
//! # {
//! # use std::convert::Infallible;
//! # use std::time::Duration;
//! use metrics_exporter_stats::{
//!     AggregatedSample, ExporterConfig, PrometheusSink, SampleMap, Snapshotter, StatsExporter,
//! };
//!
//! struct Stats;
//!
//! impl Snapshotter for Stats {
//!     type Snapshot = SampleMap;
//!     type Error = Infallible;
//!
//!     fn snapshot(&self) -> SampleMap {
//!         let mut metrics = SampleMap::new();
//!         metrics.insert("node.peers".to_owned(), AggregatedSample::new(3.0, vec![2.0, 3.0]));
//!         let bytes = AggregatedSample::new(512.0, vec![128.0, 512.0]);
//!         metrics.insert("rcv.bytes".to_owned(), bytes);
//!         metrics
//!     }
//!
//!     fn restore(&self, snapshot: SampleMap) -> Result<SampleMap, Infallible> {
//!         Ok(snapshot)
//!     }
//! }
//!
//! let sink = PrometheusSink::new();
//! let handle = sink.handle();
//!
//! let exporter = StatsExporter::new(Stats, sink);
//! exporter
//!     .configure(ExporterConfig::new().with_interval(Duration::from_secs(10)))
//!     .expect("failed to start exporter");
//!
//! // Serve `handle.render()` from a scrape endpoint, then stop publishing on shutdown.
//! # let _ = handle.render();
//! exporter.close();
//! # }
//! ```
//!
//! # Publishing rules
//!
//! Every metric name is [classified](classify) once per cycle:
//!
//! - the node metrics in [`NODE_GAUGES`] are published as gauges, set to the maximum value of the
//!   latest snapshot
//! - metrics in the `rcv` and `send` categories are published as histograms, observing every raw
//!   sample of every snapshot
//! - anything else is ignored
//!
//! Instruments are registered under the [sanitized](sanitize_key_name) metric name, with every
//! `.` replaced by `_`. When two names sanitize to the same key, such as `rcv.a.b` and `rcv.a_b`,
//! the first one seen keeps the instrument and the other is rejected rather than merged into it.
//!
//! A snapshot that fails to decode skips the whole cycle, and an instrument that cannot be created
//! only skips its own metric. Neither stops the exporter: both are logged and counted in the
//! exporter's [telemetry](StatsExporter::telemetry).
//!
//! # Features
//!
//! ## `prometheus` (default)
//!
//! Provides [`PrometheusSink`], which publishes into a `metrics-exporter-prometheus` recorder
//! using the default histogram buckets of the Prometheus client libraries.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod builder;
pub use self::builder::{ExporterConfig, DEFAULT_INTERVAL};

mod common;
pub use self::common::{category, classify, sanitize_key_name, MetricKind, NODE_GAUGES};

mod exporter;
pub use self::exporter::{ConfigureError, StatsExporter, NAME};

mod publisher;

mod registry;
pub use self::registry::Registry;

mod scheduler;

mod sink;
#[cfg(feature = "prometheus")]
pub use self::sink::{BuildError, PrometheusSink, DEFAULT_BUCKETS};
pub use self::sink::{RecorderSink, Sink, SinkError};

mod snapshot;
pub use self::snapshot::{AggregatedSample, SampleMap, Snapshotter};

mod telemetry;
pub use self::telemetry::TelemetrySnapshot;

#[cfg(test)]
mod test_util;
