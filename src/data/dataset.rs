//! AnalysisDataset - expression and clinical data with aligned samples

use super::alignment::{align_samples, SampleMatching};
use super::{ClinicalTable, ExpressionMatrix};
use crate::error::{AnalysisError, Result};

/// Expression matrix and clinical table restricted to shared samples.
///
/// Row `i` of the clinical table describes column `i` of the expression matrix.
#[derive(Debug, Clone)]
pub struct AnalysisDataset {
    expression: ExpressionMatrix,
    clinical: ClinicalTable,
}

impl AnalysisDataset {
    /// Align an expression matrix with its clinical table.
    pub fn align(
        expression: ExpressionMatrix,
        clinical: ClinicalTable,
        matching: SampleMatching,
        sample_types: &[String],
    ) -> Result<Self> {
        let aligned = align_samples(
            expression.sample_ids(),
            clinical.sample_ids(),
            matching,
            sample_types,
        )?;

        log::info!(
            "Aligned {} of {} expression samples with {} clinical records",
            aligned.len(),
            expression.n_samples(),
            clinical.n_samples()
        );

        let expression = expression.subset_samples(&aligned.expression_indices)?;
        let clinical = clinical.subset_samples(&aligned.clinical_indices);

        Ok(Self {
            expression,
            clinical,
        })
    }

    /// Build a dataset whose sample order is already aligned
    pub fn from_aligned(expression: ExpressionMatrix, clinical: ClinicalTable) -> Result<Self> {
        if expression.n_samples() != clinical.n_samples() {
            return Err(AnalysisError::DimensionMismatch {
                expected: format!("{} clinical rows", expression.n_samples()),
                got: format!("{} clinical rows", clinical.n_samples()),
            });
        }
        Ok(Self {
            expression,
            clinical,
        })
    }

    pub fn expression(&self) -> &ExpressionMatrix {
        &self.expression
    }

    pub fn expression_mut(&mut self) -> &mut ExpressionMatrix {
        &mut self.expression
    }

    pub fn clinical(&self) -> &ClinicalTable {
        &self.clinical
    }

    pub fn n_samples(&self) -> usize {
        self.expression.n_samples()
    }

    pub fn n_genes(&self) -> usize {
        self.expression.n_genes()
    }

    /// Replace the expression matrix, keeping samples unchanged
    pub fn set_expression(&mut self, expression: ExpressionMatrix) -> Result<()> {
        if expression.sample_ids() != self.expression.sample_ids() {
            return Err(AnalysisError::SampleAlignment {
                reason: "replacement expression matrix has different samples".to_string(),
            });
        }
        self.expression = expression;
        Ok(())
    }

    /// Restrict clinical variables.
    ///
    /// With a non-empty `keep` list only those variables survive; afterwards,
    /// variables with more than `max_missing_fraction` missing cells are dropped.
    pub fn filter_clinical(&mut self, keep: &[String], max_missing_fraction: f64) -> Result<()> {
        if !keep.is_empty() {
            self.clinical = self.clinical.select_variables(keep)?;
        }
        let dropped = self.clinical.drop_sparse_variables(max_missing_fraction);
        if !dropped.is_empty() {
            log::info!(
                "Dropped {} clinical variables with > {:.0}% missing values",
                dropped.len(),
                max_missing_fraction * 100.0
            );
            log::debug!("Dropped clinical variables: {:?}", dropped);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_align_reorders_clinical() {
        let expression = ExpressionMatrix::new(
            array![[1.0, 2.0, 3.0]],
            vec!["g1".to_string()],
            vec![
                "TCGA-AA-0001-01A".to_string(),
                "TCGA-AA-0002-01A".to_string(),
                "TCGA-AA-0009-01A".to_string(),
            ],
        )
        .unwrap();

        let mut clinical = ClinicalTable::new(vec!["TCGA-AA-0002".to_string(), "TCGA-AA-0001".to_string()]);
        clinical
            .add_variable("stage", vec![Some("II".to_string()), Some("I".to_string())])
            .unwrap();

        let ds = AnalysisDataset::align(expression, clinical, SampleMatching::Prefix(12), &[]).unwrap();
        assert_eq!(ds.n_samples(), 2);
        assert_eq!(ds.expression().sample_ids(), &["TCGA-AA-0001-01A", "TCGA-AA-0002-01A"]);
        assert_eq!(ds.clinical().value("stage", 0), Some("I"));
        assert_eq!(ds.clinical().value("stage", 1), Some("II"));
    }

    #[test]
    fn test_from_aligned_checks_length() {
        let expression = ExpressionMatrix::new(
            array![[1.0, 2.0]],
            vec!["g1".to_string()],
            vec!["a".to_string(), "b".to_string()],
        )
        .unwrap();
        let clinical = ClinicalTable::new(vec!["a".to_string()]);
        assert!(AnalysisDataset::from_aligned(expression, clinical).is_err());
    }
}
