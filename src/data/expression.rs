//! Expression matrix representation

use std::collections::{HashMap, HashSet};

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{AnalysisError, Result};

/// Deduplicate names by appending _1, _2, etc. to duplicates (R make.unique behavior)
fn deduplicate_names(names: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for name in &names {
        *seen.entry(name.clone()).or_insert(0) += 1;
    }
    if !seen.values().any(|&c| c > 1) {
        return names;
    }
    seen.clear();
    let mut result = Vec::with_capacity(names.len());
    for name in names {
        let count = seen.entry(name.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            result.push(name);
        } else {
            let new_name = format!("{}_{}", name, *count - 1);
            log::warn!("Duplicate gene name '{}' renamed to '{}'", name, new_name);
            result.push(new_name);
        }
    }
    result
}

/// Gene symbol part of an identifier.
///
/// Cohort matrices often label rows `SYMBOL|ENTREZ` (e.g. `TP53|7157`); the
/// symbol is everything before the first `|`.
pub fn gene_symbol(gene_id: &str) -> &str {
    gene_id.split('|').next().unwrap_or(gene_id).trim()
}

/// An expression matrix (genes x samples)
#[derive(Debug, Clone)]
pub struct ExpressionMatrix {
    /// Expression values (genes x samples)
    values: Array2<f64>,
    /// Gene identifiers
    gene_ids: Vec<String>,
    /// Sample identifiers
    sample_ids: Vec<String>,
}

impl ExpressionMatrix {
    /// Create a new expression matrix
    pub fn new(values: Array2<f64>, gene_ids: Vec<String>, sample_ids: Vec<String>) -> Result<Self> {
        let (n_genes, n_samples) = values.dim();

        if gene_ids.len() != n_genes {
            return Err(AnalysisError::DimensionMismatch {
                expected: format!("{} gene IDs", n_genes),
                got: format!("{} gene IDs", gene_ids.len()),
            });
        }

        if sample_ids.len() != n_samples {
            return Err(AnalysisError::DimensionMismatch {
                expected: format!("{} sample IDs", n_samples),
                got: format!("{} sample IDs", sample_ids.len()),
            });
        }

        if values.is_empty() {
            return Err(AnalysisError::EmptyData {
                reason: "Expression matrix has no genes or no samples".to_string(),
            });
        }

        if let Some(((g, s), _)) = values.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(AnalysisError::InvalidExpressionMatrix {
                reason: format!(
                    "non-finite value for gene '{}' in sample '{}'",
                    gene_ids[g], sample_ids[s]
                ),
            });
        }

        {
            let mut seen = HashSet::new();
            for id in &sample_ids {
                if !seen.insert(id) {
                    return Err(AnalysisError::InvalidExpressionMatrix {
                        reason: format!("duplicate sample ID '{}'", id),
                    });
                }
            }
        }

        let gene_ids = deduplicate_names(gene_ids);

        Ok(Self {
            values,
            gene_ids,
            sample_ids,
        })
    }

    /// Get the number of genes
    pub fn n_genes(&self) -> usize {
        self.values.nrows()
    }

    /// Get the number of samples
    pub fn n_samples(&self) -> usize {
        self.values.ncols()
    }

    /// Get the expression values as a view
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    /// Get gene IDs
    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    /// Get sample IDs
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Get gene index by ID.
    ///
    /// Falls back to matching on the gene symbol so that `TP53` finds `TP53|7157`.
    /// Several rows may share a symbol; the first is used and the rest are
    /// named in a warning.
    pub fn gene_index(&self, gene_id: &str) -> Option<usize> {
        if let Some(idx) = self.gene_ids.iter().position(|id| id == gene_id) {
            return Some(idx);
        }
        let matches: Vec<usize> = (0..self.n_genes())
            .filter(|&i| gene_symbol(&self.gene_ids[i]) == gene_id)
            .collect();
        if matches.len() > 1 {
            let names: Vec<&str> = matches.iter().map(|&i| self.gene_ids[i].as_str()).collect();
            log::warn!(
                "Symbol '{}' matches {} rows ({}); using '{}'",
                gene_id,
                matches.len(),
                names.join(", "),
                names[0]
            );
        }
        matches.first().copied()
    }

    /// Expression row for a gene by ID
    pub fn gene_expression(&self, gene_id: &str) -> Result<ArrayView1<'_, f64>> {
        let idx = self.gene_index(gene_id).ok_or_else(|| AnalysisError::GeneNotFound {
            gene_id: gene_id.to_string(),
        })?;
        Ok(self.values.row(idx))
    }

    /// Mean expression per gene across samples
    pub fn gene_means(&self) -> Vec<f64> {
        let n = self.n_samples() as f64;
        self.values
            .axis_iter(Axis(0))
            .map(|row| row.sum() / n)
            .collect()
    }

    /// Apply log2(x + pseudo_count) in place
    pub fn log2_transform(&mut self, pseudo_count: f64) -> Result<()> {
        if let Some(&min) = self
            .values
            .iter()
            .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        {
            if min + pseudo_count <= 0.0 {
                return Err(AnalysisError::InvalidExpressionMatrix {
                    reason: format!(
                        "log2 transform needs values > {} (minimum found: {})",
                        -pseudo_count, min
                    ),
                });
            }
        }
        self.values.mapv_inplace(|x| (x + pseudo_count).log2());
        Ok(())
    }

    /// Subset to specific samples (in the given order)
    pub fn subset_samples(&self, sample_indices: &[usize]) -> Result<Self> {
        let new_values = self.values.select(Axis(1), sample_indices);
        let new_sample_ids: Vec<String> = sample_indices
            .iter()
            .map(|&i| self.sample_ids[i].clone())
            .collect();

        Self::new(new_values, self.gene_ids.clone(), new_sample_ids)
    }

    /// Subset to specific genes
    pub fn subset_genes(&self, gene_indices: &[usize]) -> Result<Self> {
        let new_values = self.values.select(Axis(0), gene_indices);
        let new_gene_ids: Vec<String> = gene_indices
            .iter()
            .map(|&i| self.gene_ids[i].clone())
            .collect();

        Self::new(new_values, new_gene_ids, self.sample_ids.clone())
    }

    /// Drop genes with mean expression below `min_mean` or zero variance.
    ///
    /// Genes named in `keep` are retained regardless.
    pub fn filter_genes(&self, min_mean: f64, keep: &[String]) -> Result<Self> {
        let keep_idx: HashSet<usize> = keep.iter().filter_map(|g| self.gene_index(g)).collect();
        let means = self.gene_means();

        let retained: Vec<usize> = (0..self.n_genes())
            .filter(|&i| {
                if keep_idx.contains(&i) {
                    return true;
                }
                let row = self.values.row(i);
                let first = row[0];
                let constant = row.iter().all(|&v| v == first);
                !constant && means[i] >= min_mean
            })
            .collect();

        if retained.is_empty() {
            return Err(AnalysisError::EmptyData {
                reason: "No genes passed the expression filter".to_string(),
            });
        }

        log::info!(
            "Gene filter kept {} of {} genes (min mean {}, non-constant)",
            retained.len(),
            self.n_genes(),
            min_mean
        );

        self.subset_genes(&retained)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn ids(prefix: &str, n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("{}{}", prefix, i)).collect()
    }

    #[test]
    fn test_expression_matrix_creation() {
        let values = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let matrix = ExpressionMatrix::new(values, ids("g", 2), ids("s", 3)).unwrap();
        assert_eq!(matrix.n_genes(), 2);
        assert_eq!(matrix.n_samples(), 3);
        assert_eq!(matrix.gene_means(), vec![2.0, 5.0]);
    }

    #[test]
    fn test_non_finite_rejected() {
        let values = array![[1.0, f64::NAN], [4.0, 5.0]];
        assert!(ExpressionMatrix::new(values, ids("g", 2), ids("s", 2)).is_err());
    }

    #[test]
    fn test_duplicate_genes_renamed() {
        let values = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let genes = vec!["A".to_string(), "A".to_string(), "B".to_string()];
        let matrix = ExpressionMatrix::new(values, genes, ids("s", 2)).unwrap();
        assert_eq!(matrix.gene_ids(), &["A", "A_1", "B"]);
    }

    #[test]
    fn test_gene_lookup_by_symbol() {
        let values = array![[1.0, 2.0], [3.0, 4.0]];
        let genes = vec!["TP53|7157".to_string(), "EGFR|1956".to_string()];
        let matrix = ExpressionMatrix::new(values, genes, ids("s", 2)).unwrap();
        assert_eq!(matrix.gene_index("EGFR"), Some(1));
        assert_eq!(matrix.gene_expression("TP53").unwrap()[1], 2.0);
        assert!(matrix.gene_expression("KRAS").is_err());
        assert_eq!(gene_symbol("TP53|7157"), "TP53");
        assert_eq!(gene_symbol("MYC"), "MYC");
    }

    #[test]
    fn test_shared_symbol_uses_first_row() {
        let values = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let genes = vec![
            "SLC35E2|728661".to_string(),
            "MYC|4609".to_string(),
            "SLC35E2|9906".to_string(),
        ];
        let matrix = ExpressionMatrix::new(values, genes, ids("s", 2)).unwrap();
        assert_eq!(matrix.gene_index("SLC35E2"), Some(0));
        assert_eq!(matrix.gene_index("SLC35E2|9906"), Some(2));
        assert_eq!(matrix.gene_expression("SLC35E2").unwrap()[1], 2.0);
    }

    #[test]
    fn test_log2_transform() {
        let values = array![[0.0, 1.0, 3.0]];
        let mut matrix = ExpressionMatrix::new(values, ids("g", 1), ids("s", 3)).unwrap();
        matrix.log2_transform(1.0).unwrap();
        assert_eq!(matrix.values()[[0, 0]], 0.0);
        assert_eq!(matrix.values()[[0, 1]], 1.0);
        assert_eq!(matrix.values()[[0, 2]], 2.0);

        let mut negative = ExpressionMatrix::new(array![[-2.0, 1.0]], ids("g", 1), ids("s", 2)).unwrap();
        assert!(negative.log2_transform(1.0).is_err());
    }

    #[test]
    fn test_filter_genes_keeps_markers() {
        let values = array![
            [5.0, 6.0, 7.0], // kept
            [3.0, 3.0, 3.0], // constant -> dropped
            [0.1, 0.2, 0.0], // low mean -> dropped unless marker
        ];
        let matrix = ExpressionMatrix::new(values, ids("g", 3), ids("s", 3)).unwrap();
        let filtered = matrix.filter_genes(1.0, &["g3".to_string()]).unwrap();
        assert_eq!(filtered.gene_ids(), &["g1", "g3"]);
    }
}
