//! Group labels produced by the quantile split

use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-sample group membership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupLabel {
    High,
    Low,
    Excluded,
}

impl GroupLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupLabel::High => "high",
            GroupLabel::Low => "low",
            GroupLabel::Excluded => "excluded",
        }
    }
}

impl fmt::Display for GroupLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds applied to one marker gene
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerThresholds {
    pub gene_id: String,
    /// Expression below this value is "low"
    pub lower_threshold: f64,
    /// Expression above this value is "high"
    pub upper_threshold: f64,
}

/// Result of a quantile split over all samples of a dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupAssignment {
    /// Sample identifiers, in dataset order
    pub sample_ids: Vec<String>,
    /// One label per sample
    pub labels: Vec<GroupLabel>,
    /// Thresholds per marker gene
    pub thresholds: Vec<MarkerThresholds>,
    pub lower_quantile: f64,
    pub upper_quantile: f64,
}

impl GroupAssignment {
    /// Indices of samples carrying `label`
    pub fn indices(&self, label: GroupLabel) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, &l)| l == label)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn high_indices(&self) -> Vec<usize> {
        self.indices(GroupLabel::High)
    }

    pub fn low_indices(&self) -> Vec<usize> {
        self.indices(GroupLabel::Low)
    }

    /// Indices of samples in either group, in dataset order
    pub fn retained_indices(&self) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, &l)| l != GroupLabel::Excluded)
            .map(|(i, _)| i)
            .collect()
    }

    /// Labels of the retained samples, aligned with `retained_indices()`
    pub fn retained_labels(&self) -> Vec<GroupLabel> {
        self.labels
            .iter()
            .copied()
            .filter(|&l| l != GroupLabel::Excluded)
            .collect()
    }

    pub fn count(&self, label: GroupLabel) -> usize {
        self.labels.iter().filter(|&&l| l == label).count()
    }
}
