use std::{collections::HashMap, fmt, sync::Arc};

/// A per-metric summary of one snapshot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AggregatedSample {
    /// The maximum value observed during the snapshot window.
    pub max: f64,

    /// The raw observations of the snapshot window, in the order they were captured.
    ///
    /// May be empty.
    pub samples: Vec<f64>,
}

impl AggregatedSample {
    /// Creates a new `AggregatedSample`.
    pub fn new(max: f64, samples: Vec<f64>) -> Self {
        AggregatedSample { max, samples }
    }
}

/// Restored snapshot contents, mapping metric names to their aggregated sample.
pub type SampleMap = HashMap<String, AggregatedSample>;

/// A source of point-in-time statistics snapshots.
///
/// Taking a snapshot and restoring it are split so that the snapshot itself can stay opaque: the
/// exporter never looks inside [`Snapshotter::Snapshot`], it only hands it back to
/// [`Snapshotter::restore`] straight away.
pub trait Snapshotter: Send + Sync + 'static {
    /// The opaque snapshot type.
    type Snapshot;

    /// The error returned when a snapshot cannot be restored.
    type Error: fmt::Display;

    /// Captures the current statistics.
    fn snapshot(&self) -> Self::Snapshot;

    /// Decodes a snapshot into aggregated samples keyed by metric name.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot is malformed or expired. The exporter treats this as a
    /// reason to skip the current publish cycle, never as a fatal condition.
    fn restore(&self, snapshot: Self::Snapshot) -> Result<SampleMap, Self::Error>;
}

impl<T> Snapshotter for Arc<T>
where
    T: Snapshotter,
{
    type Snapshot = T::Snapshot;
    type Error = T::Error;

    fn snapshot(&self) -> Self::Snapshot {
        (**self).snapshot()
    }

    fn restore(&self, snapshot: Self::Snapshot) -> Result<SampleMap, Self::Error> {
        (**self).restore(snapshot)
    }
}
