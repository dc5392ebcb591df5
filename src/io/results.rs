//! Differential expression results structure

use serde::{Deserialize, Serialize};

use crate::testing::AdjustMethod;

/// One row of the differential expression table
/// R equivalent: one row of limma::topTable()
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeResult {
    pub gene_id: String,
    /// log2 fold change, high minus low
    pub log_fold_change: f64,
    /// Mean expression over both groups
    pub average_expression: f64,
    /// Moderated t-statistic
    pub t_statistic: f64,
    pub raw_p_value: f64,
    pub adjusted_p_value: f64,
    /// Log-odds of differential expression
    pub b_statistic: f64,
}

/// Filtered and sorted differential expression table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeTable {
    /// Contrast label, e.g. "high-low"
    pub contrast: String,
    pub adjust_method: AdjustMethod,
    pub p_value_cutoff: f64,
    pub lfc_cutoff: f64,
    /// Genes that entered the test, before the cutoffs
    pub n_tested: usize,
    /// Rows passing the cutoffs, ascending adjusted p-value
    pub rows: Vec<DeResult>,
}

impl DeTable {
    /// Number of genes in the table
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn gene_ids(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.gene_id.as_str()).collect()
    }

    /// Up-regulated genes (higher in the high group)
    pub fn upregulated(&self) -> impl Iterator<Item = &DeResult> {
        self.rows.iter().filter(|r| r.log_fold_change > 0.0)
    }

    /// Down-regulated genes (higher in the low group)
    pub fn downregulated(&self) -> impl Iterator<Item = &DeResult> {
        self.rows.iter().filter(|r| r.log_fold_change < 0.0)
    }

    /// Summary statistics
    pub fn summary(&self) -> DeSummary {
        DeSummary {
            contrast: self.contrast.clone(),
            genes_tested: self.n_tested,
            significant: self.rows.len(),
            upregulated: self.upregulated().count(),
            downregulated: self.downregulated().count(),
            p_value_cutoff: self.p_value_cutoff,
            adjust_method: self.adjust_method,
        }
    }
}

/// Summary of a differential expression table
/// R equivalent: summary(decideTests(fit))
#[derive(Debug, Clone, PartialEq)]
pub struct DeSummary {
    pub contrast: String,
    pub genes_tested: usize,
    pub significant: usize,
    pub upregulated: usize,
    pub downregulated: usize,
    pub p_value_cutoff: f64,
    pub adjust_method: AdjustMethod,
}

impl std::fmt::Display for DeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Differential Expression ({})", self.contrast)?;
        writeln!(f, "==============================")?;
        writeln!(f, "Genes tested: {}", self.genes_tested)?;
        writeln!(
            f,
            "Significant (adj.P <= {}, {}): {}",
            self.p_value_cutoff,
            self.adjust_method.as_str(),
            self.significant
        )?;
        writeln!(f, "  Up-regulated: {}", self.upregulated)?;
        writeln!(f, "  Down-regulated: {}", self.downregulated)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(gene: &str, lfc: f64, adj: f64) -> DeResult {
        DeResult {
            gene_id: gene.to_string(),
            log_fold_change: lfc,
            average_expression: 5.0,
            t_statistic: lfc * 3.0,
            raw_p_value: adj / 10.0,
            adjusted_p_value: adj,
            b_statistic: 1.0,
        }
    }

    #[test]
    fn test_summary_counts() {
        let table = DeTable {
            contrast: "high-low".to_string(),
            adjust_method: AdjustMethod::Bh,
            p_value_cutoff: 0.05,
            lfc_cutoff: 0.0,
            n_tested: 100,
            rows: vec![row("A", 2.0, 0.001), row("B", -1.0, 0.01), row("C", 0.5, 0.04)],
        };
        let summary = table.summary();
        assert_eq!(summary.significant, 3);
        assert_eq!(summary.upregulated, 2);
        assert_eq!(summary.downregulated, 1);
        let text = summary.to_string();
        assert!(text.contains("Genes tested: 100"));
        assert!(text.contains("Down-regulated: 1"));
        assert_eq!(table.gene_ids(), vec!["A", "B", "C"]);
    }
}
