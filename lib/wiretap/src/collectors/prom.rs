//! Collectors backed by the `prometheus` crate.

use prometheus::core::Collector;
use prometheus::{CounterVec, HistogramVec, IntCounterVec, IntGauge};
use tracing::warn;
use wiretap_core::{Counter, Desc, Describe, Gauge, Observer};

/// A `prometheus` metric used as a wiretap collector.
///
/// The label schema is read from the metric's own descriptor, so a vector
/// registered with `&["event"]` can back lifecycle tracing and one registered
/// with `&["code", "method"]` can back outcome counting.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use prometheus::{HistogramOpts, HistogramVec};
/// use wiretap::collectors::Prometheus;
///
/// let trace = HistogramVec::new(HistogramOpts::new("client_trace_seconds", "Trace."), &["event"])?;
/// registry.register(Box::new(trace.clone()))?;
/// let observer = Arc::new(Prometheus::new(trace));
/// ```
#[derive(Debug, Clone)]
pub struct Prometheus<M> {
    metric: M,
}

impl<M> Prometheus<M> {
    /// Wrap a metric.
    pub const fn new(metric: M) -> Self {
        Self { metric }
    }

    /// The wrapped metric.
    pub const fn metric(&self) -> &M {
        &self.metric
    }

    /// Unwrap the metric.
    pub fn into_inner(self) -> M {
        self.metric
    }
}

impl<M: Collector> Describe for Prometheus<M> {
    fn describe(&self) -> Vec<Desc> {
        self.metric
            .desc()
            .into_iter()
            .map(|desc| {
                desc.const_label_pairs.iter().fold(
                    Desc::new(
                        desc.fq_name.as_str(),
                        desc.help.as_str(),
                        desc.variable_labels.iter().map(String::as_str),
                    ),
                    |described, pair| described.with_const_label(pair.get_name(), pair.get_value()),
                )
            })
            .collect()
    }
}

impl Observer for Prometheus<HistogramVec> {
    fn observe(&self, label_values: &[&str], value: f64) {
        match self.metric.get_metric_with_label_values(label_values) {
            Ok(histogram) => histogram.observe(value),
            Err(err) => warn!(error = %err, "observation dropped"),
        }
    }
}

impl Counter for Prometheus<IntCounterVec> {
    fn increment(&self, label_values: &[&str]) {
        match self.metric.get_metric_with_label_values(label_values) {
            Ok(counter) => counter.inc(),
            Err(err) => warn!(error = %err, "increment dropped"),
        }
    }
}

impl Counter for Prometheus<CounterVec> {
    fn increment(&self, label_values: &[&str]) {
        match self.metric.get_metric_with_label_values(label_values) {
            Ok(counter) => counter.inc(),
            Err(err) => warn!(error = %err, "increment dropped"),
        }
    }
}

impl Gauge for Prometheus<IntGauge> {
    fn increment(&self) {
        self.metric.inc();
    }

    fn decrement(&self) {
        self.metric.dec();
    }
}

impl Gauge for Prometheus<prometheus::Gauge> {
    fn increment(&self) {
        self.metric.inc();
    }

    fn decrement(&self) {
        self.metric.dec();
    }
}
