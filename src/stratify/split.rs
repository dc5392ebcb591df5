//! High/low split on marker gene quantiles

use serde::{Deserialize, Serialize};

use super::groups::{GroupAssignment, GroupLabel, MarkerThresholds};
use crate::data::ExpressionMatrix;
use crate::error::{AnalysisError, Result};
use crate::stats::{quantile_type7, sorted_finite};

/// Minimum samples per group; the two-group model needs residual df
pub const MIN_GROUP_SIZE: usize = 2;

/// Quantile cutoffs for the split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantileSplit {
    /// Samples below this quantile are "low"
    pub lower: f64,
    /// Samples above this quantile are "high"
    pub upper: f64,
}

impl Default for QuantileSplit {
    fn default() -> Self {
        Self {
            lower: 0.25,
            upper: 0.75,
        }
    }
}

impl QuantileSplit {
    pub fn new(lower: f64, upper: f64) -> Result<Self> {
        let split = Self { lower, upper };
        split.validate()?;
        Ok(split)
    }

    /// Require 0 < lower < upper < 1
    pub fn validate(&self) -> Result<()> {
        if !(self.lower > 0.0 && self.lower < self.upper && self.upper < 1.0) {
            return Err(AnalysisError::InvalidSplit {
                reason: format!(
                    "quantiles must satisfy 0 < lower < upper < 1 (got lower={}, upper={})",
                    self.lower, self.upper
                ),
            });
        }
        Ok(())
    }
}

/// Label every sample high, low or excluded by marker gene expression.
/// R equivalent: quantile(expr, c(lower, upper)) followed by expr > q_up / expr < q_lo
///
/// With several marker genes a sample is high only if it is high for every
/// gene, and low only if it is low for every gene. Thresholds are computed
/// over all samples of `expression`. Strict comparisons keep the groups
/// disjoint because the lower threshold never exceeds the upper one.
pub fn quantile_split(
    expression: &ExpressionMatrix,
    genes: &[String],
    split: &QuantileSplit,
) -> Result<GroupAssignment> {
    split.validate()?;

    if genes.is_empty() {
        return Err(AnalysisError::InvalidSplit {
            reason: "at least one marker gene is required".to_string(),
        });
    }

    let n_samples = expression.n_samples();
    let mut is_high = vec![true; n_samples];
    let mut is_low = vec![true; n_samples];
    let mut thresholds = Vec::with_capacity(genes.len());

    for gene in genes {
        let row = expression.gene_expression(gene)?;
        let values: Vec<f64> = row.to_vec();
        let sorted = sorted_finite(&values);

        let lower_threshold = quantile_type7(&sorted, split.lower);
        let upper_threshold = quantile_type7(&sorted, split.upper);

        log::info!(
            "Marker {}: q{:.2} = {:.4}, q{:.2} = {:.4}",
            gene,
            split.lower,
            lower_threshold,
            split.upper,
            upper_threshold
        );

        for (j, &v) in values.iter().enumerate() {
            is_high[j] &= v > upper_threshold;
            is_low[j] &= v < lower_threshold;
        }

        thresholds.push(MarkerThresholds {
            gene_id: gene.clone(),
            lower_threshold,
            upper_threshold,
        });
    }

    let labels: Vec<GroupLabel> = is_high
        .iter()
        .zip(is_low.iter())
        .map(|(&h, &l)| match (h, l) {
            (true, false) => GroupLabel::High,
            (false, true) => GroupLabel::Low,
            _ => GroupLabel::Excluded,
        })
        .collect();

    let assignment = GroupAssignment {
        sample_ids: expression.sample_ids().to_vec(),
        labels,
        thresholds,
        lower_quantile: split.lower,
        upper_quantile: split.upper,
    };

    let n_high = assignment.count(GroupLabel::High);
    let n_low = assignment.count(GroupLabel::Low);
    log::info!(
        "Quantile split: {} high, {} low, {} excluded",
        n_high,
        n_low,
        assignment.count(GroupLabel::Excluded)
    );

    if n_high == 0 || n_low == 0 {
        return Err(AnalysisError::InvalidSplit {
            reason: format!(
                "split left an empty group ({} high, {} low); widen the quantiles",
                n_high, n_low
            ),
        });
    }
    if n_high < MIN_GROUP_SIZE || n_low < MIN_GROUP_SIZE {
        return Err(AnalysisError::InvalidSplit {
            reason: format!(
                "each group needs at least {} samples ({} high, {} low)",
                MIN_GROUP_SIZE, n_high, n_low
            ),
        });
    }

    Ok(assignment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn matrix(values: Array2<f64>) -> ExpressionMatrix {
        let genes = (1..=values.nrows()).map(|i| format!("g{}", i)).collect();
        let samples = (1..=values.ncols()).map(|i| format!("s{}", i)).collect();
        ExpressionMatrix::new(values, genes, samples).unwrap()
    }

    #[test]
    fn test_single_gene_split() {
        // q25 = 3.25, q75 = 7.75 for 1..10
        let expr = matrix(array![[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]]);
        let a = quantile_split(&expr, &["g1".to_string()], &QuantileSplit::default()).unwrap();
        assert_eq!(a.low_indices(), vec![0, 1, 2]);
        assert_eq!(a.high_indices(), vec![7, 8, 9]);
        assert!((a.thresholds[0].lower_threshold - 3.25).abs() < 1e-12);
        assert!((a.thresholds[0].upper_threshold - 7.75).abs() < 1e-12);
    }

    #[test]
    fn test_multi_gene_intersection() {
        let expr = matrix(array![
            [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0],
            [10.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 1.0],
        ]);
        let genes = vec!["g1".to_string(), "g2".to_string()];
        let a = quantile_split(&expr, &genes, &QuantileSplit::default()).unwrap();
        // s1 low for g1 but high for g2; s10 the reverse
        assert_eq!(a.labels[0], GroupLabel::Excluded);
        assert_eq!(a.labels[9], GroupLabel::Excluded);
        assert_eq!(a.low_indices(), vec![1, 2]);
        assert_eq!(a.high_indices(), vec![7, 8]);
    }

    #[test]
    fn test_groups_disjoint_over_quantile_grid() {
        let values: Vec<f64> = (0..40).map(|i| ((i * 37) % 23) as f64 * 0.5).collect();
        let expr = matrix(Array2::from_shape_vec((1, 40), values).unwrap());
        let genes = vec!["g1".to_string()];

        for lo in 1..9 {
            for up in (lo + 1)..10 {
                let split = QuantileSplit::new(lo as f64 / 10.0, up as f64 / 10.0).unwrap();
                if let Ok(a) = quantile_split(&expr, &genes, &split) {
                    let high = a.high_indices();
                    let low = a.low_indices();
                    assert!(high.iter().all(|i| !low.contains(i)));
                    assert_eq!(
                        high.len() + low.len() + a.count(GroupLabel::Excluded),
                        40
                    );
                }
            }
        }
    }

    #[test]
    fn test_invalid_quantiles() {
        assert!(QuantileSplit::new(0.0, 0.5).is_err());
        assert!(QuantileSplit::new(0.6, 0.4).is_err());
        assert!(QuantileSplit::new(0.3, 0.3).is_err());
        assert!(QuantileSplit::new(0.3, 1.0).is_err());
        assert!(QuantileSplit::new(0.1, 0.9).is_ok());
    }

    #[test]
    fn test_constant_marker_is_error() {
        let expr = matrix(array![[2.0, 2.0, 2.0, 2.0]]);
        assert!(quantile_split(&expr, &["g1".to_string()], &QuantileSplit::default()).is_err());
    }

    #[test]
    fn test_single_sample_groups_rejected() {
        // q25 = 2, q75 = 4: one low and one high sample
        let expr = matrix(array![[1.0, 2.0, 3.0, 4.0, 5.0]]);
        let err = quantile_split(&expr, &["g1".to_string()], &QuantileSplit::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidSplit { .. }));

        let wider = QuantileSplit::new(0.45, 0.55).unwrap();
        let a = quantile_split(&expr, &["g1".to_string()], &wider).unwrap();
        assert_eq!(a.low_indices(), vec![0, 1]);
        assert_eq!(a.high_indices(), vec![3, 4]);
    }

    #[test]
    fn test_unknown_marker_is_error() {
        let expr = matrix(array![[1.0, 2.0, 3.0, 4.0]]);
        assert!(quantile_split(&expr, &["nope".to_string()], &QuantileSplit::default()).is_err());
    }
}
