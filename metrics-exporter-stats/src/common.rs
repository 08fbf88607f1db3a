/// Node and process level metrics that are published as gauges.
///
/// Gauges are set to the maximum value observed in a snapshot, so only metrics where the latest
/// high-water mark is meaningful belong here.
pub const NODE_GAUGES: [&str; 3] = ["node.peers", "node.conns", "node.subs"];

/// Categories whose metrics are published as histograms.
const HISTOGRAM_CATEGORIES: [&str; 2] = ["rcv", "send"];

/// The kind of instrument a metric is published as.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MetricKind {
    /// Published as a gauge holding the maximum value of the latest snapshot.
    Gauge,
    /// Published as a histogram observing every raw sample of every snapshot.
    Histogram,
    /// Not published.
    Ignored,
}

impl MetricKind {
    /// Returns the name of this kind as used in log events.
    pub const fn as_str(self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
            MetricKind::Ignored => "ignored",
        }
    }
}

/// Classifies a metric name by naming convention.
///
/// Names in [`NODE_GAUGES`] are gauges. Otherwise, names whose category (the first `.`-delimited
/// segment) is `rcv` or `send` are histograms, and everything else is ignored.
pub fn classify(name: &str) -> MetricKind {
    if NODE_GAUGES.contains(&name) {
        return MetricKind::Gauge;
    }

    if HISTOGRAM_CATEGORIES.contains(&category(name)) {
        MetricKind::Histogram
    } else {
        MetricKind::Ignored
    }
}

/// Returns the category of a metric name, which is everything before the first `.`.
pub fn category(name: &str) -> &str {
    name.split_once('.').map_or(name, |(category, _)| category)
}

/// Converts a metric name into the key an instrument is registered under.
///
/// Every `.` is replaced with `_`, so `rcv.bytes` becomes `rcv_bytes`.
pub fn sanitize_key_name(name: &str) -> String {
    name.replace('.', "_")
}
