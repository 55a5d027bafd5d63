//! Build service metrics.
//!
//! Metric handles are registered against a recorder handed to the builder, so
//! separate builders never share counters. [`LocalRecorder`] keeps values in
//! memory for embedding and tests; without one, a no-op recorder is used.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use metrics::{Counter, Gauge, Histogram, HistogramFn, Key, KeyName, Level, Metadata, Recorder, SharedString, Unit};

pub const REQUESTS_TOTAL: &str = "requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "request_duration_seconds";
pub const OBJECT_STORE_HITS_TOTAL: &str = "object_store_hits_total";
pub const BUILDS_TOTAL: &str = "builds_total";
pub const BUILDS_FAILED_TOTAL: &str = "builds_failed_total";
pub const BUILDS_INVALID_TOTAL: &str = "builds_invalid_total";
pub const BUILD_DURATION_SECONDS: &str = "build_duration_seconds";

/// Handles for every metric the builder emits.
#[derive(Clone)]
pub struct BuildMetrics {
  pub(crate) requests: Counter,
  pub(crate) invalid: Counter,
  pub(crate) store_hits: Counter,
  pub(crate) builds: Counter,
  pub(crate) builds_failed: Counter,
  pub(crate) request_duration: Histogram,
  pub(crate) build_duration: Histogram,
}

impl BuildMetrics {
  pub fn register(recorder: &dyn Recorder) -> Self {
    let metadata = Metadata::new(module_path!(), Level::INFO, Some(module_path!()));

    let counter = |name: &'static str, description: &'static str| {
      recorder.describe_counter(KeyName::from_const_str(name), Some(Unit::Count), description.into());
      recorder.register_counter(&Key::from_static_name(name), &metadata)
    };
    let histogram = |name: &'static str, description: &'static str| {
      recorder.describe_histogram(KeyName::from_const_str(name), Some(Unit::Seconds), description.into());
      recorder.register_histogram(&Key::from_static_name(name), &metadata)
    };

    Self {
      requests: counter(REQUESTS_TOTAL, "The total number of build requests"),
      invalid: counter(
        BUILDS_INVALID_TOTAL,
        "The total number of builds with invalid parameters",
      ),
      store_hits: counter(
        OBJECT_STORE_HITS_TOTAL,
        "The total number of build requests served from the object store",
      ),
      builds: counter(BUILDS_TOTAL, "The total number of builds"),
      builds_failed: counter(BUILDS_FAILED_TOTAL, "The total number of failed builds"),
      request_duration: histogram(REQUEST_DURATION_SECONDS, "Duration of successful build requests"),
      build_duration: histogram(BUILD_DURATION_SECONDS, "Duration of successful builds"),
    }
  }

  pub fn noop() -> Self {
    Self::register(&metrics::NoopRecorder)
  }
}

impl Default for BuildMetrics {
  fn default() -> Self {
    Self::noop()
  }
}

/// Records histogram samples in memory.
#[derive(Debug, Default)]
struct Samples(Mutex<Vec<f64>>);

impl HistogramFn for Samples {
  fn record(&self, value: f64) {
    self.0.lock().unwrap_or_else(PoisonError::into_inner).push(value);
  }
}

/// A recorder that keeps counter values and histogram samples in memory.
#[derive(Debug, Default)]
pub struct LocalRecorder {
  counters: Mutex<HashMap<String, Arc<AtomicU64>>>,
  histograms: Mutex<HashMap<String, Arc<Samples>>>,
}

impl LocalRecorder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Current value of a counter, zero if it was never registered.
  pub fn counter(&self, name: &str) -> u64 {
    self
      .counters
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .get(name)
      .map(|c| c.load(Ordering::Relaxed))
      .unwrap_or(0)
  }

  /// Samples recorded so far for a histogram.
  pub fn samples(&self, name: &str) -> Vec<Duration> {
    self
      .histograms
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .get(name)
      .map(|h| {
        h.0
          .lock()
          .unwrap_or_else(PoisonError::into_inner)
          .iter()
          .map(|secs| Duration::from_secs_f64(*secs))
          .collect()
      })
      .unwrap_or_default()
  }
}

impl Recorder for LocalRecorder {
  fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

  fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

  fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

  fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
    let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
    let counter = counters.entry(key.name().to_string()).or_default();
    Counter::from_arc(Arc::clone(counter))
  }

  fn register_gauge(&self, _key: &Key, _metadata: &Metadata<'_>) -> Gauge {
    Gauge::noop()
  }

  fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
    let mut histograms = self.histograms.lock().unwrap_or_else(PoisonError::into_inner);
    let histogram = histograms.entry(key.name().to_string()).or_default();
    Histogram::from_arc(Arc::clone(histogram))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn counters_are_scoped_to_their_recorder() {
    let first = LocalRecorder::new();
    let second = LocalRecorder::new();

    let a = BuildMetrics::register(&first);
    let _b = BuildMetrics::register(&second);

    a.requests.increment(1);
    a.requests.increment(1);
    a.store_hits.increment(1);

    assert_eq!(first.counter(REQUESTS_TOTAL), 2);
    assert_eq!(first.counter(OBJECT_STORE_HITS_TOTAL), 1);
    assert_eq!(second.counter(REQUESTS_TOTAL), 0);
  }

  #[test]
  fn histograms_record_samples() {
    let recorder = LocalRecorder::new();
    let metrics = BuildMetrics::register(&recorder);

    metrics.build_duration.record(1.5);

    assert_eq!(recorder.samples(BUILD_DURATION_SECONDS), vec![Duration::from_millis(1500)]);
    assert!(recorder.samples(REQUEST_DURATION_SECONDS).is_empty());
  }

  #[test]
  fn noop_metrics_accept_updates() {
    let metrics = BuildMetrics::noop();
    metrics.builds.increment(1);
    metrics.request_duration.record(0.1);
  }
}
