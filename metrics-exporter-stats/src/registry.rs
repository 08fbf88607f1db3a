//! Live instruments, keyed by sanitized metric name.

use std::{collections::HashMap, sync::Arc};

use metrics::{Gauge, Histogram};
use parking_lot::RwLock;

use crate::common::{sanitize_key_name, MetricKind};
use crate::sink::{Sink, SinkError};

#[derive(Default)]
struct Instruments {
    gauges: HashMap<String, Gauge>,
    histograms: HashMap<String, Histogram>,
    // Key to the metric name that claimed it.
    owners: HashMap<String, String>,
}

impl Instruments {
    fn kind_of(&self, key: &str) -> Option<MetricKind> {
        if self.gauges.contains_key(key) {
            Some(MetricKind::Gauge)
        } else if self.histograms.contains_key(key) {
            Some(MetricKind::Histogram)
        } else {
            None
        }
    }

    fn is_owned_by(&self, key: &str, name: &str) -> bool {
        self.owners.get(key).is_some_and(|owner| owner == name)
    }

    /// Checks that `name` may use `key` as an instrument of the given kind.
    ///
    /// Returns `true` if the instrument already exists.
    fn check(&self, key: &str, name: &str, kind: MetricKind) -> Result<bool, SinkError> {
        let Some(owner) = self.owners.get(key) else {
            return Ok(false);
        };

        if owner != name {
            return Err(SinkError::NameCollision {
                name: name.to_owned(),
                key: key.to_owned(),
                existing: owner.clone(),
            });
        }

        match self.kind_of(key) {
            Some(existing) if existing != kind => Err(SinkError::AlreadyRegistered {
                name: key.to_owned(),
                existing: existing.as_str(),
            }),
            _ => Ok(true),
        }
    }
}

/// A get-or-create store of the instruments a publisher writes to.
///
/// Instruments are registered under the [sanitized](crate::sanitize_key_name) metric name. Every
/// key maps to exactly one instrument, claimed by exactly one metric name, for the lifetime of the
/// registry: instruments are created through the [`Sink`] the first time their name is seen and
/// are never removed or replaced. The sink is therefore asked to create each key at most once.
///
/// ## Concurrency
///
/// The registry is written by a single publisher but can be read at any time, for example by a
/// scrape handler enumerating instruments. Lookups take a read lock and creation takes the write
/// lock, re-checking the map before calling into the sink. Updating an instrument's value only
/// touches the atomic handle and never takes a lock.
pub struct Registry {
    instruments: RwLock<Instruments>,
    sink: Arc<dyn Sink>,
}

impl Registry {
    /// Creates a new, empty `Registry` creating instruments through `sink`.
    pub fn new(sink: Arc<dyn Sink>) -> Self {
        Registry { instruments: RwLock::new(Instruments::default()), sink }
    }

    /// Gets or creates the gauge for the given metric name.
    ///
    /// # Errors
    ///
    /// If the sanitized key is already used by a histogram or by a different metric name, or the
    /// sink fails to create the gauge, an error is returned and nothing is registered.
    pub fn get_or_create_gauge(&self, name: &str) -> Result<Gauge, SinkError> {
        let key = sanitize_key_name(name);
        {
            let instruments = self.instruments.read();
            if instruments.is_owned_by(&key, name) {
                if let Some(gauge) = instruments.gauges.get(&key) {
                    return Ok(gauge.clone());
                }
            }
        }

        // Switch to the write guard and check again, as another caller may have won the race.
        let mut instruments = self.instruments.write();
        if instruments.check(&key, name, MetricKind::Gauge)? {
            if let Some(gauge) = instruments.gauges.get(&key) {
                return Ok(gauge.clone());
            }
        }

        let gauge = self.sink.new_gauge(&key)?;
        instruments.gauges.insert(key.clone(), gauge.clone());
        instruments.owners.insert(key, name.to_owned());
        Ok(gauge)
    }

    /// Gets or creates the histogram for the given metric name.
    ///
    /// # Errors
    ///
    /// If the sanitized key is already used by a gauge or by a different metric name, or the sink
    /// fails to create the histogram, an error is returned and nothing is registered.
    pub fn get_or_create_histogram(&self, name: &str) -> Result<Histogram, SinkError> {
        let key = sanitize_key_name(name);
        {
            let instruments = self.instruments.read();
            if instruments.is_owned_by(&key, name) {
                if let Some(histogram) = instruments.histograms.get(&key) {
                    return Ok(histogram.clone());
                }
            }
        }

        let mut instruments = self.instruments.write();
        if instruments.check(&key, name, MetricKind::Histogram)? {
            if let Some(histogram) = instruments.histograms.get(&key) {
                return Ok(histogram.clone());
            }
        }

        let histogram = self.sink.new_histogram(&key)?;
        instruments.histograms.insert(key.clone(), histogram.clone());
        instruments.owners.insert(key, name.to_owned());
        Ok(histogram)
    }

    /// Visits every gauge stored in this registry.
    ///
    /// Creation is blocked while the visit is in progress.
    pub fn visit_gauges<F>(&self, mut collect: F)
    where
        F: FnMut(&str, &Gauge),
    {
        for (key, gauge) in self.instruments.read().gauges.iter() {
            collect(key, gauge);
        }
    }

    /// Visits every histogram stored in this registry.
    ///
    /// Creation is blocked while the visit is in progress.
    pub fn visit_histograms<F>(&self, mut collect: F)
    where
        F: FnMut(&str, &Histogram),
    {
        for (key, histogram) in self.instruments.read().histograms.iter() {
            collect(key, histogram);
        }
    }

    /// Returns the keys of every gauge, sorted.
    pub fn gauge_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.instruments.read().gauges.keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    /// Returns the keys of every histogram, sorted.
    pub fn histogram_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.instruments.read().histograms.keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    /// Returns the number of instruments in this registry.
    pub fn len(&self) -> usize {
        let instruments = self.instruments.read();
        instruments.gauges.len() + instruments.histograms.len()
    }

    /// Returns `true` if no instrument has been created yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn run_upkeep(&self) {
        self.sink.upkeep();
    }
}
