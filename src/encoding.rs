//! Feature alignment: turning a validated record into the exact column layout
//! the model was trained on.
//!
//! The pipeline is `project → expand → reindex`:
//!
//! 1. a record projects itself onto its training-time attribute names
//!    ([`TrainingRecord::training_features`]);
//! 2. categorical attributes are one-hot expanded to `<attribute>_<value>`
//!    indicator columns, one per record (single-row encoding);
//! 3. the expanded columns are reindexed against [`TrainingColumns`]: columns
//!    the schema lacks are dropped, schema columns the record lacks are 0.
//!
//! A categorical value whose indicator column is not in the schema therefore
//! contributes nothing, which leaves the model at its baseline category.

use log::{debug, log_enabled, Level};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Numeric(f64),
    Category(&'static str),
}

/// A single attribute under its training-time name.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub name: &'static str,
    pub value: FeatureValue,
}

impl Feature {
    pub fn numeric(name: &'static str, value: f64) -> Self {
        Feature {
            name,
            value: FeatureValue::Numeric(value),
        }
    }

    pub fn category(name: &'static str, value: &'static str) -> Self {
        Feature {
            name,
            value: FeatureValue::Category(value),
        }
    }
}

/// Records that know how they were laid out at training time.
pub trait TrainingRecord {
    fn training_features(&self) -> Vec<Feature>;
}

/// Ordered feature-column names fixed at training time.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingColumns {
    names: Vec<String>,
}

impl TrainingColumns {
    pub fn new(names: Vec<String>) -> Result<Self, String> {
        if names.is_empty() {
            return Err("column list is empty".to_string());
        }
        let mut seen = HashSet::new();
        if let Some(dup) = names.iter().find(|n| !seen.insert(n.as_str())) {
            return Err(format!("column {dup:?} appears more than once"));
        }
        Ok(TrainingColumns { names })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

/// Numeric vector laid out in [`TrainingColumns`] order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        FeatureVector(values)
    }
}

/// One-hot expands categorical features; numeric features pass through.
pub fn one_hot(features: &[Feature]) -> Vec<(String, f64)> {
    features
        .iter()
        .map(|feature| match feature.value {
            FeatureValue::Numeric(value) => (feature.name.to_string(), value),
            FeatureValue::Category(value) => (format!("{}_{}", feature.name, value), 1.0),
        })
        .collect()
}

/// Lays `expanded` out in schema order, zero-filling absent columns and
/// dropping columns the schema does not know.
pub fn reindex(expanded: &[(String, f64)], columns: &TrainingColumns) -> FeatureVector {
    let lookup: HashMap<&str, f64> = expanded
        .iter()
        .map(|(name, value)| (name.as_str(), *value))
        .collect();

    if log_enabled!(Level::Debug) {
        for (name, _) in expanded {
            if columns.position(name).is_none() {
                debug!("Dropping column {name} absent from the training schema");
            }
        }
    }

    columns
        .names()
        .iter()
        .map(|name| lookup.get(name.as_str()).copied().unwrap_or(0.0))
        .collect::<Vec<_>>()
        .into()
}

/// Encodes `record` into a vector of exactly `columns.len()` entries.
pub fn encode<R: TrainingRecord + ?Sized>(record: &R, columns: &TrainingColumns) -> FeatureVector {
    reindex(&one_hot(&record.training_features()), columns)
}
