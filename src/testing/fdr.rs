//! P-value adjustment methods for multiple testing correction
//!
//! Implements Benjamini-Hochberg (the "fdr"/"BH" method used by topTable)
//! and Bonferroni.

use serde::{Deserialize, Serialize};

/// Multiple testing correction method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustMethod {
    /// Benjamini-Hochberg false discovery rate
    #[default]
    #[serde(alias = "fdr", alias = "BH")]
    Bh,
    /// Bonferroni family-wise error rate
    Bonferroni,
}

impl AdjustMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustMethod::Bh => "BH",
            AdjustMethod::Bonferroni => "bonferroni",
        }
    }

    pub fn adjust(&self, pvalues: &[f64]) -> Vec<f64> {
        match self {
            AdjustMethod::Bh => benjamini_hochberg(pvalues),
            AdjustMethod::Bonferroni => bonferroni(pvalues),
        }
    }
}

/// Benjamini-Hochberg step-up adjustment.
/// R equivalent: p.adjust(p, method="BH")
///
/// NaN p-values do not count towards the number of tests and stay NaN.
pub fn benjamini_hochberg(pvalues: &[f64]) -> Vec<f64> {
    let mut adjusted = vec![f64::NAN; pvalues.len()];
    let mut order: Vec<usize> = (0..pvalues.len()).filter(|&i| !pvalues[i].is_nan()).collect();
    let m = order.len() as f64;
    order.sort_by(|&a, &b| pvalues[a].total_cmp(&pvalues[b]));

    // running minimum from the largest p-value down
    let mut running = 1.0f64;
    for (k, &i) in order.iter().enumerate().rev() {
        running = running.min(pvalues[i] * m / (k + 1) as f64);
        adjusted[i] = running;
    }
    adjusted
}

/// Bonferroni family-wise adjustment.
/// R equivalent: p.adjust(p, method="bonferroni")
pub fn bonferroni(pvalues: &[f64]) -> Vec<f64> {
    let m = pvalues.iter().filter(|p| !p.is_nan()).count() as f64;
    pvalues
        .iter()
        .map(|&p| if p.is_nan() { p } else { (p * m).min(1.0) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bh_matches_r() {
        // R: p.adjust(c(0.01, 0.04, 0.03, 0.02), "BH") -> 0.04 0.04 0.04 0.04
        let padj = benjamini_hochberg(&[0.01, 0.04, 0.03, 0.02]);
        for adj in &padj {
            assert!((adj - 0.04).abs() < 1e-12);
        }
        // R: p.adjust(c(0.001, 0.01, 0.05, 0.5), "BH") -> 0.004 0.02 0.0666667 0.5
        let padj = benjamini_hochberg(&[0.001, 0.01, 0.05, 0.5]);
        assert!((padj[0] - 0.004).abs() < 1e-12);
        assert!((padj[1] - 0.02).abs() < 1e-12);
        assert!((padj[2] - 0.2 / 3.0).abs() < 1e-12);
        assert!((padj[3] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_bh_with_nan() {
        let padj = benjamini_hochberg(&[0.01, f64::NAN, 0.03, 0.02]);
        assert!(padj[0].is_finite());
        assert!(padj[1].is_nan());
        assert!((padj[2] - 0.03).abs() < 1e-12);
    }

    #[test]
    fn test_bonferroni() {
        let padj = AdjustMethod::Bonferroni.adjust(&[0.01, 0.2, f64::NAN]);
        assert!((padj[0] - 0.02).abs() < 1e-12);
        assert_eq!(padj[1], 0.4);
        assert!(padj[2].is_nan());
    }
}
