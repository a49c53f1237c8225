//! Collector capabilities.
//!
//! Metric storage lives outside wiretap. Middleware only needs a narrow view of a
//! collector: what it calls itself ([`Describe`]) and where to send values
//! ([`Observer`], [`Counter`], [`Gauge`]). Collectors are built once by the
//! application and shared with every middleware through an `Arc`; they must be
//! safe to update concurrently.

use serde::{Deserialize, Serialize};

use crate::SchemaError;

/// A `name="value"` label pair as it appears on an encoded sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelPair {
    /// Label name.
    pub name: String,
    /// Label value.
    pub value: String,
}

impl LabelPair {
    /// Create a label pair.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Self-description of a metric family: name, help, and label schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Desc {
    fq_name: String,
    help: String,
    const_labels: Vec<LabelPair>,
    variable_labels: Vec<String>,
}

impl Desc {
    /// Describe a metric partitioned by the given variable labels, in order.
    pub fn new<I, L>(fq_name: impl Into<String>, help: impl Into<String>, variable_labels: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        Self {
            fq_name: fq_name.into(),
            help: help.into(),
            const_labels: Vec::new(),
            variable_labels: variable_labels.into_iter().map(Into::into).collect(),
        }
    }

    /// Add a constant label, reported on every sample.
    #[must_use]
    pub fn with_const_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.const_labels.push(LabelPair::new(name, value));
        self
    }

    /// Fully-qualified metric name.
    #[must_use]
    pub fn fq_name(&self) -> &str {
        &self.fq_name
    }

    /// Help text.
    #[must_use]
    pub fn help(&self) -> &str {
        &self.help
    }

    /// Constant labels.
    #[must_use]
    pub fn const_labels(&self) -> &[LabelPair] {
        &self.const_labels
    }

    /// Variable label names, in the order label values are passed.
    #[must_use]
    pub fn variable_labels(&self) -> &[String] {
        &self.variable_labels
    }

    /// Materialize a sample for this descriptor.
    ///
    /// Exactly one value per variable label is required. The encoded labels
    /// hold constant and variable labels together, sorted by name.
    pub fn sample(&self, value: f64, label_values: &[&str]) -> Result<Sample, SchemaError> {
        if label_values.len() != self.variable_labels.len() {
            return Err(SchemaError::encoding(format!(
                "{} label values for {} variable labels of '{}'",
                label_values.len(),
                self.variable_labels.len(),
                self.fq_name
            )));
        }

        let mut labels: Vec<LabelPair> = self
            .const_labels
            .iter()
            .cloned()
            .chain(
                self.variable_labels
                    .iter()
                    .zip(label_values)
                    .map(|(name, value)| LabelPair::new(name.as_str(), *value)),
            )
            .collect();
        labels.sort_by(|a, b| a.name.cmp(&b.name));

        if let Some(pair) = labels.windows(2).find_map(|w| match w {
            [a, b] if a.name == b.name => Some(a),
            _ => None,
        }) {
            return Err(SchemaError::encoding(format!(
                "duplicate label '{}' on '{}'",
                pair.name, self.fq_name
            )));
        }

        Ok(Sample {
            name: self.fq_name.clone(),
            labels,
            value,
        })
    }
}

/// One encoded observation: the wire record of a metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Metric name.
    pub name: String,
    /// Labels, sorted by name.
    pub labels: Vec<LabelPair>,
    /// Observed value.
    pub value: f64,
}

/// A collector that can describe its label schema.
pub trait Describe {
    /// Descriptors of the metric families this collector reports.
    fn describe(&self) -> Vec<Desc>;

    /// Encode a sample against one of this collector's descriptors.
    ///
    /// The default goes through [`Desc::sample`]. Collectors with their own
    /// encoding rules may override it.
    fn encode_sample(
        &self,
        desc: &Desc,
        value: f64,
        label_values: &[&str],
    ) -> Result<Sample, SchemaError> {
        desc.sample(value, label_values)
    }
}

/// A collector accepting observations (histograms, summaries).
pub trait Observer: Describe + Send + Sync {
    /// Record `value` in the cell selected by `label_values` (declared order).
    fn observe(&self, label_values: &[&str], value: f64);
}

/// A monotonic counter partitioned by labels.
pub trait Counter: Describe + Send + Sync {
    /// Add one to the cell selected by `label_values` (declared order).
    fn increment(&self, label_values: &[&str]);
}

/// An unlabeled gauge.
pub trait Gauge: Send + Sync {
    /// Add one.
    fn increment(&self);

    /// Subtract one.
    fn decrement(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_sorts_const_and_variable_labels() {
        let desc = Desc::new("http_client_trace_seconds", "Trace latencies.", ["event"])
            .with_const_label("client", "billing");

        let sample = desc.sample(0.25, &["DNSDone"]).expect("sample");

        insta::assert_yaml_snapshot!(sample, @r###"
        name: http_client_trace_seconds
        labels:
          - name: client
            value: billing
          - name: event
            value: DNSDone
        value: 0.25
        "###);
    }

    #[test]
    fn sample_rejects_wrong_cardinality() {
        let desc = Desc::new("requests_total", "Requests.", ["code", "method"]);

        let err = desc.sample(0.0, &[""]).expect_err("one value for two labels");
        assert_eq!(
            err,
            SchemaError::encoding("1 label values for 2 variable labels of 'requests_total'")
        );

        assert!(Desc::new("up", "Up.", Vec::<String>::new()).sample(1.0, &[]).is_ok());
    }

    #[test]
    fn sample_rejects_duplicate_labels() {
        let desc = Desc::new("trace_seconds", "Trace.", ["event"]).with_const_label("event", "x");

        let err = desc.sample(0.0, &[""]).expect_err("duplicate");
        assert!(err.to_string().contains("duplicate label 'event'"), "{err}");
    }

    #[test]
    fn desc_accessors() {
        let desc = Desc::new("in_flight", "In flight.", Vec::<&str>::new());
        assert_eq!(desc.fq_name(), "in_flight");
        assert_eq!(desc.help(), "In flight.");
        assert!(desc.const_labels().is_empty());
        assert!(desc.variable_labels().is_empty());
    }
}
