use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use metrics::{Gauge, GaugeFn, Histogram, HistogramFn};
use parking_lot::Mutex;

use crate::sink::{Sink, SinkError};
use crate::snapshot::{AggregatedSample, SampleMap, Snapshotter};

struct RecordedGauge {
    value: Mutex<Option<f64>>,
    operations: Arc<AtomicUsize>,
}

impl GaugeFn for RecordedGauge {
    fn increment(&self, value: f64) {
        self.operations.fetch_add(1, Ordering::SeqCst);
        let mut current = self.value.lock();
        *current = Some(current.unwrap_or_default() + value);
    }

    fn decrement(&self, value: f64) {
        self.operations.fetch_add(1, Ordering::SeqCst);
        let mut current = self.value.lock();
        *current = Some(current.unwrap_or_default() - value);
    }

    fn set(&self, value: f64) {
        self.operations.fetch_add(1, Ordering::SeqCst);
        *self.value.lock() = Some(value);
    }
}

struct RecordedHistogram {
    values: Mutex<Vec<f64>>,
    operations: Arc<AtomicUsize>,
}

impl HistogramFn for RecordedHistogram {
    fn record(&self, value: f64) {
        self.operations.fetch_add(1, Ordering::SeqCst);
        self.values.lock().push(value);
    }
}

/// A sink that keeps every value it is handed, for assertions.
#[derive(Default)]
pub struct RecordingSink {
    gauges: Mutex<HashMap<String, Arc<RecordedGauge>>>,
    histograms: Mutex<HashMap<String, Arc<RecordedHistogram>>>,
    creations: Mutex<HashMap<String, usize>>,
    failing: HashSet<String>,
    operations: Arc<AtomicUsize>,
    upkeeps: AtomicUsize,
}

impl RecordingSink {
    /// Creates a sink that fails to create instruments for the given keys.
    pub fn failing_on(keys: &[&str]) -> Self {
        RecordingSink {
            failing: keys.iter().map(|key| (*key).to_owned()).collect(),
            ..Default::default()
        }
    }

    /// Returns how many times creation was requested for `key`, failed attempts included.
    pub fn creations(&self, key: &str) -> usize {
        self.creations.lock().get(key).copied().unwrap_or_default()
    }

    /// Returns the last value set on the gauge for `key`.
    pub fn gauge_value(&self, key: &str) -> Option<f64> {
        self.gauges.lock().get(key).and_then(|gauge| *gauge.value.lock())
    }

    /// Returns every value observed by the histogram for `key`.
    pub fn observations(&self, key: &str) -> Option<Vec<f64>> {
        self.histograms.lock().get(key).map(|histogram| histogram.values.lock().clone())
    }

    /// Returns the number of instruments created.
    pub fn instruments(&self) -> usize {
        self.gauges.lock().len() + self.histograms.lock().len()
    }

    /// Returns the total number of updates made through any handle.
    pub fn operations(&self) -> usize {
        self.operations.load(Ordering::SeqCst)
    }

    /// Returns the number of times upkeep ran.
    pub fn upkeeps(&self) -> usize {
        self.upkeeps.load(Ordering::SeqCst)
    }

    fn track_creation(&self, key: &str) -> Result<(), SinkError> {
        *self.creations.lock().entry(key.to_owned()).or_default() += 1;
        if self.failing.contains(key) {
            return Err(SinkError::InvalidName { name: key.to_owned() });
        }
        Ok(())
    }
}

impl Sink for RecordingSink {
    fn new_gauge(&self, key: &str) -> Result<Gauge, SinkError> {
        self.track_creation(key)?;
        let gauge = Arc::new(RecordedGauge {
            value: Mutex::new(None),
            operations: Arc::clone(&self.operations),
        });
        self.gauges.lock().insert(key.to_owned(), Arc::clone(&gauge));
        Ok(Gauge::from_arc(gauge))
    }

    fn new_histogram(&self, key: &str) -> Result<Histogram, SinkError> {
        self.track_creation(key)?;
        let histogram = Arc::new(RecordedHistogram {
            values: Mutex::new(Vec::new()),
            operations: Arc::clone(&self.operations),
        });
        self.histograms.lock().insert(key.to_owned(), Arc::clone(&histogram));
        Ok(Histogram::from_arc(histogram))
    }

    fn upkeep(&self) {
        self.upkeeps.fetch_add(1, Ordering::SeqCst);
    }
}

/// A snapshotter replaying scripted restore results.
///
/// Once the script runs out, the last scripted result is repeated.
pub struct ScriptedSnapshotter {
    script: Mutex<VecDeque<Result<SampleMap, String>>>,
    last: Mutex<Result<SampleMap, String>>,
    latency: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedSnapshotter {
    pub fn new<I>(script: I) -> Self
    where
        I: IntoIterator<Item = Result<SampleMap, String>>,
    {
        ScriptedSnapshotter {
            script: Mutex::new(script.into_iter().collect()),
            last: Mutex::new(Ok(SampleMap::new())),
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Makes every snapshot take at least `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Returns the number of snapshots taken.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns the highest number of snapshots that were ever in progress at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Snapshotter for ScriptedSnapshotter {
    type Snapshot = Result<SampleMap, String>;
    type Error = String;

    fn snapshot(&self) -> Self::Snapshot {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }

        let next = self.script.lock().pop_front();
        let snapshot = match next {
            Some(result) => {
                *self.last.lock() = result.clone();
                result
            }
            None => self.last.lock().clone(),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        snapshot
    }

    fn restore(&self, snapshot: Self::Snapshot) -> Result<SampleMap, Self::Error> {
        snapshot
    }
}

/// Builds a sample map from `(name, max, samples)` entries.
pub fn samples(entries: &[(&str, f64, Vec<f64>)]) -> SampleMap {
    entries
        .iter()
        .map(|(name, max, values)| {
            ((*name).to_owned(), AggregatedSample::new(*max, values.clone()))
        })
        .collect()
}
