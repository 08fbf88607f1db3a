use std::time::Duration;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// The publish interval used when none, or an invalid one, is configured.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

const INTERVAL_OPTION: &str = "interval";

/// Exporter configuration.
///
/// Can be built directly, or read from loosely-typed provider options with
/// [`ExporterConfig::from_options`] or any `serde` deserializer. In every case, an interval that
/// is missing, not a number, or shorter than one millisecond is replaced by [`DEFAULT_INTERVAL`]
/// rather than rejected.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct ExporterConfig {
    #[serde(deserialize_with = "deserialize_interval")]
    interval: Duration,
}

impl ExporterConfig {
    /// Creates a new `ExporterConfig` with the default interval.
    pub fn new() -> Self {
        ExporterConfig { interval: DEFAULT_INTERVAL }
    }

    /// Reads the configuration from provider options.
    ///
    /// The only recognized option is `interval`, a number of milliseconds. Fractional milliseconds
    /// are truncated. Other options are ignored.
    pub fn from_options(options: &Map<String, Value>) -> Self {
        let interval = options
            .get(INTERVAL_OPTION)
            .and_then(interval_from_millis)
            .unwrap_or(DEFAULT_INTERVAL);

        ExporterConfig { interval }
    }

    /// Sets the publish interval.
    ///
    /// The first publish cycle runs one full interval after the exporter is configured. A zero
    /// interval is replaced by [`DEFAULT_INTERVAL`].
    ///
    /// Defaults to 5 seconds.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = if interval.is_zero() { DEFAULT_INTERVAL } else { interval };
        self
    }

    /// Returns the publish interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for ExporterConfig {
    fn default() -> Self {
        ExporterConfig::new()
    }
}

fn interval_from_millis(value: &Value) -> Option<Duration> {
    let millis = value.as_f64()?;
    if !millis.is_finite() || millis < 1.0 {
        return None;
    }

    // Saturates for values beyond `u64::MAX`.
    Some(Duration::from_millis(millis as u64))
}

fn deserialize_interval<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(interval_from_millis(&value).unwrap_or(DEFAULT_INTERVAL))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::{json, Map, Value};

    use super::{ExporterConfig, DEFAULT_INTERVAL};

    fn options(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    #[test]
    fn test_from_options() {
        let test_cases = vec![
            (json!({}), DEFAULT_INTERVAL),
            (json!({ "interval": 250 }), Duration::from_millis(250)),
            (json!({ "interval": 1500.9 }), Duration::from_millis(1500)),
            (json!({ "interval": 1 }), Duration::from_millis(1)),
            (json!({ "interval": "250" }), DEFAULT_INTERVAL),
            (json!({ "interval": true }), DEFAULT_INTERVAL),
            (json!({ "interval": null }), DEFAULT_INTERVAL),
            (json!({ "interval": [250] }), DEFAULT_INTERVAL),
            (json!({ "interval": 0 }), DEFAULT_INTERVAL),
            (json!({ "interval": 0.5 }), DEFAULT_INTERVAL),
            (json!({ "interval": -100 }), DEFAULT_INTERVAL),
            (json!({ "period": 250 }), DEFAULT_INTERVAL),
            (json!({ "interval": 250, "url": "localhost" }), Duration::from_millis(250)),
        ];

        for (input, expected) in test_cases {
            let config = ExporterConfig::from_options(&options(input.clone()));
            assert_eq!(config.interval(), expected, "{input}");
        }
    }

    #[test]
    fn test_deserialize_matches_from_options() {
        let test_cases = vec![
            json!({}),
            json!({ "interval": 250 }),
            json!({ "interval": "fast" }),
            json!({ "interval": -1 }),
        ];

        for input in test_cases {
            let deserialized: ExporterConfig = serde_json::from_value(input.clone()).unwrap();
            assert_eq!(deserialized, ExporterConfig::from_options(&options(input)));
        }
    }

    #[test]
    fn test_with_interval() {
        assert_eq!(ExporterConfig::default().interval(), DEFAULT_INTERVAL);

        let config = ExporterConfig::new().with_interval(Duration::from_millis(10));
        assert_eq!(config.interval(), Duration::from_millis(10));

        let config = ExporterConfig::new().with_interval(Duration::ZERO);
        assert_eq!(config.interval(), DEFAULT_INTERVAL);
    }
}
