//! Collectors recording through the `metrics` crate facade.
//!
//! Values go to whatever recorder the application installed (Prometheus
//! exporter, `StatsD`, ...). Descriptions are registered when the collector is
//! created.

use metrics::{Label, describe_counter, describe_gauge, describe_histogram};
use tracing::warn;
use wiretap_core::{Counter, Desc, Describe, Gauge, Observer};

/// Label name used by lifecycle trace observers.
const LABEL_EVENT: &str = "event";
/// Label names used by outcome counters.
const LABELS_OUTCOME: [&str; 2] = ["code", "method"];

/// Histogram observer recorded with `metrics::histogram!`.
#[derive(Debug, Clone)]
pub struct MetricsObserver {
    desc: Desc,
}

impl MetricsObserver {
    /// Create an observer partitioned by `labels`, in order.
    pub fn new<I, L>(name: impl Into<String>, help: impl Into<String>, labels: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        let desc = Desc::new(name, help, labels);
        describe_histogram!(desc.fq_name().to_string(), desc.help().to_string());
        Self { desc }
    }

    /// Create an observer partitioned by `event`, as lifecycle tracing expects.
    pub fn lifecycle(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self::new(name, help, [LABEL_EVENT])
    }

    /// Add a constant label to every recorded value.
    #[must_use]
    pub fn with_const_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.desc = self.desc.with_const_label(name, value);
        self
    }
}

impl Describe for MetricsObserver {
    fn describe(&self) -> Vec<Desc> {
        vec![self.desc.clone()]
    }
}

impl Observer for MetricsObserver {
    fn observe(&self, label_values: &[&str], value: f64) {
        if let Some(labels) = labels(&self.desc, label_values) {
            metrics::histogram!(self.desc.fq_name().to_string(), labels).record(value);
        }
    }
}

/// Counter recorded with `metrics::counter!`.
#[derive(Debug, Clone)]
pub struct MetricsCounter {
    desc: Desc,
}

impl MetricsCounter {
    /// Create a counter partitioned by `labels`, in order.
    pub fn new<I, L>(name: impl Into<String>, help: impl Into<String>, labels: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        let desc = Desc::new(name, help, labels);
        describe_counter!(desc.fq_name().to_string(), desc.help().to_string());
        Self { desc }
    }

    /// Create a counter partitioned by `code` and `method`, as outcome counting expects.
    pub fn outcome(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self::new(name, help, LABELS_OUTCOME)
    }
}

impl Describe for MetricsCounter {
    fn describe(&self) -> Vec<Desc> {
        vec![self.desc.clone()]
    }
}

impl Counter for MetricsCounter {
    fn increment(&self, label_values: &[&str]) {
        if let Some(labels) = labels(&self.desc, label_values) {
            metrics::counter!(self.desc.fq_name().to_string(), labels).increment(1);
        }
    }
}

/// Unlabeled gauge recorded with `metrics::gauge!`.
#[derive(Debug, Clone)]
pub struct MetricsGauge {
    name: String,
}

impl MetricsGauge {
    /// Create a gauge.
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Self {
        let name = name.into();
        describe_gauge!(name.clone(), help.into());
        Self { name }
    }
}

impl Gauge for MetricsGauge {
    fn increment(&self) {
        metrics::gauge!(self.name.clone()).increment(1.0);
    }

    fn decrement(&self) {
        metrics::gauge!(self.name.clone()).decrement(1.0);
    }
}

fn labels(desc: &Desc, values: &[&str]) -> Option<Vec<Label>> {
    if values.len() != desc.variable_labels().len() {
        warn!(
            metric = desc.fq_name(),
            expected = desc.variable_labels().len(),
            got = values.len(),
            "label cardinality mismatch, value dropped"
        );
        return None;
    }

    let constant = desc
        .const_labels()
        .iter()
        .map(|pair| Label::new(pair.name.clone(), pair.value.clone()));
    let variable = desc
        .variable_labels()
        .iter()
        .zip(values)
        .map(|(name, value)| Label::new(name.clone(), (*value).to_string()));

    Some(constant.chain(variable).collect())
}
