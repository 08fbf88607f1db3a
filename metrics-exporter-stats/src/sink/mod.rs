use std::{
    collections::{hash_map::Entry, HashMap},
    sync::Arc,
};

use metrics::{Gauge, Histogram, Key, Level, Metadata, Recorder};
use parking_lot::Mutex;
use thiserror::Error;

use crate::common::MetricKind;

#[cfg(feature = "prometheus")]
mod prometheus;

#[cfg(feature = "prometheus")]
#[cfg_attr(docsrs, doc(cfg(feature = "prometheus")))]
pub use self::prometheus::{BuildError, PrometheusSink, DEFAULT_BUCKETS};

static METADATA: Metadata<'static> =
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()));

/// Errors that could occur while creating an instrument.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum SinkError {
    /// The key is not a valid metric name for the sink.
    #[error("invalid metric name '{name}'")]
    InvalidName {
        /// The rejected key.
        name: String,
    },

    /// An instrument was already created under the key.
    #[error("metric '{name}' is already registered as a {existing}")]
    AlreadyRegistered {
        /// The rejected key.
        name: String,

        /// The kind of the existing instrument.
        existing: &'static str,
    },

    /// Two distinct metric names sanitize to the same key.
    #[error("metric '{name}' collides with '{existing}' under key '{key}'")]
    NameCollision {
        /// The rejected metric name.
        name: String,

        /// The key both names sanitize to.
        key: String,

        /// The metric name that claimed the key first.
        existing: String,
    },
}

/// A factory for the instruments that snapshots are published into.
///
/// Instruments are created once per key and then updated for as long as the exporter runs, so a
/// sink is free to treat a second creation request for the same key as an error.
pub trait Sink: Send + Sync {
    /// Creates the gauge for the given sanitized key.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot create an instrument under this key.
    fn new_gauge(&self, key: &str) -> Result<Gauge, SinkError>;

    /// Creates the histogram for the given sanitized key.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot create an instrument under this key.
    fn new_histogram(&self, key: &str) -> Result<Histogram, SinkError>;

    /// Runs periodic maintenance, called once after every successful publish cycle.
    fn upkeep(&self) {}
}

impl<T> Sink for Arc<T>
where
    T: Sink + ?Sized,
{
    fn new_gauge(&self, key: &str) -> Result<Gauge, SinkError> {
        (**self).new_gauge(key)
    }

    fn new_histogram(&self, key: &str) -> Result<Histogram, SinkError> {
        (**self).new_histogram(key)
    }

    fn upkeep(&self) {
        (**self).upkeep();
    }
}

/// A [`Sink`] that registers instruments with a [`Recorder`].
///
/// Recorders usually hand back the existing handle when a key is registered twice. This sink is
/// stricter and follows the rules of a Prometheus client registry instead: keys must be valid
/// Prometheus metric names, and each key can only be registered once, as a single kind.
pub struct RecorderSink<R> {
    recorder: R,
    registered: Mutex<HashMap<String, MetricKind>>,
}

impl<R> RecorderSink<R>
where
    R: Recorder,
{
    /// Creates a new `RecorderSink` wrapping the given recorder.
    pub fn new(recorder: R) -> Self {
        RecorderSink { recorder, registered: Mutex::new(HashMap::new()) }
    }

    /// Returns a reference to the wrapped recorder.
    pub fn recorder(&self) -> &R {
        &self.recorder
    }

    fn claim(&self, key: &str, kind: MetricKind) -> Result<Key, SinkError> {
        if !is_valid_metric_name(key) {
            return Err(SinkError::InvalidName { name: key.to_owned() });
        }

        match self.registered.lock().entry(key.to_owned()) {
            Entry::Occupied(entry) => Err(SinkError::AlreadyRegistered {
                name: key.to_owned(),
                existing: entry.get().as_str(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(kind);
                Ok(Key::from_name(key.to_owned()))
            }
        }
    }
}

impl<R> Sink for RecorderSink<R>
where
    R: Recorder + Send + Sync,
{
    fn new_gauge(&self, key: &str) -> Result<Gauge, SinkError> {
        let key = self.claim(key, MetricKind::Gauge)?;
        Ok(self.recorder.register_gauge(&key, &METADATA))
    }

    fn new_histogram(&self, key: &str) -> Result<Histogram, SinkError> {
        let key = self.claim(key, MetricKind::Histogram)?;
        Ok(self.recorder.register_histogram(&key, &METADATA))
    }
}

/// Checks a key against the Prometheus metric name grammar, `[a-zA-Z_:][a-zA-Z0-9_:]*`.
pub(crate) fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }

    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}
