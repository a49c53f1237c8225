//! Label schema validation.
//!
//! Middleware that fills in label values needs to know the collector is partitioned
//! the way it expects. Rather than trusting separate metadata, the collector is asked
//! to describe itself and then to encode a zero-value sample for its descriptor.
//! The sample is written in its wire form and the label names are read back from
//! it, exactly as they would be reported.

use crate::{Describe, Desc, LabelPair, Sample, SchemaError};

/// Value given to every variable label of the checked sample.
const PLACEHOLDER: &str = "\u{1f}wiretap:variable";

/// Check that `collector` is partitioned by the single label `expected`.
///
/// The first reported label must be `expected`. Labels are reported sorted by name,
/// so a constant label sorting before `expected` is rejected.
///
/// # Errors
///
/// - [`SchemaError::NoDescription`] if the collector has no descriptor.
/// - [`SchemaError::MultipleDescriptions`] if it has more than one.
/// - [`SchemaError::Encoding`] if a one-label sample cannot be encoded, which
///   includes collectors declaring zero or several variable labels.
/// - [`SchemaError::UnsupportedLabel`] if the first reported label is not `expected`.
pub fn check_single_label<C>(collector: &C, expected: &str) -> Result<(), SchemaError>
where
    C: Describe + ?Sized,
{
    let desc = only_desc(collector)?;
    let labels = encoded_labels(collector, &desc, 1)?;

    match labels.first() {
        Some(pair) if pair.name == expected => Ok(()),
        Some(pair) => Err(SchemaError::UnsupportedLabel {
            expected: expected.to_string(),
            found: pair.name.clone(),
        }),
        None => Err(SchemaError::encoding("sample carries no labels")),
    }
}

/// Check that `collector` is partitioned by exactly the labels in `expected`.
///
/// Constant labels are ignored: only labels carrying the value passed for them are
/// compared against `expected`. Returns the collector's variable label names in
/// declared order, which is the order label values must be passed in.
///
/// # Errors
///
/// - [`SchemaError::NoDescription`] if the collector has no descriptor.
/// - [`SchemaError::MultipleDescriptions`] if it has more than one.
/// - [`SchemaError::Encoding`] if the collector does not declare `expected.len()`
///   variable labels.
/// - [`SchemaError::UnsupportedLabel`] for the first variable label not in `expected`.
pub fn check_labels<C>(collector: &C, expected: &[&str]) -> Result<Vec<String>, SchemaError>
where
    C: Describe + ?Sized,
{
    let desc = only_desc(collector)?;
    let labels = encoded_labels(collector, &desc, expected.len())?;

    if let Some(pair) = labels
        .iter()
        .filter(|pair| pair.value == PLACEHOLDER)
        .find(|pair| !expected.contains(&pair.name.as_str()))
    {
        return Err(SchemaError::UnsupportedLabel {
            expected: expected.join(", "),
            found: pair.name.clone(),
        });
    }

    Ok(desc.variable_labels().to_vec())
}

fn only_desc<C>(collector: &C) -> Result<Desc, SchemaError>
where
    C: Describe + ?Sized,
{
    let mut descs = collector.describe().into_iter();
    let desc = descs.next().ok_or(SchemaError::NoDescription)?;

    if descs.next().is_some() {
        return Err(SchemaError::MultipleDescriptions);
    }
    Ok(desc)
}

fn encoded_labels<C>(collector: &C, desc: &Desc, arity: usize) -> Result<Vec<LabelPair>, SchemaError>
where
    C: Describe + ?Sized,
{
    let placeholders = vec![PLACEHOLDER; arity];
    let sample = collector.encode_sample(desc, 0.0, &placeholders)?;

    let wire = serde_json::to_vec(&sample).map_err(|err| SchemaError::encoding(err.to_string()))?;
    let written: Sample =
        serde_json::from_slice(&wire).map_err(|err| SchemaError::encoding(err.to_string()))?;

    Ok(written.labels)
}
