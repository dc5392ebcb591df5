//! quantile_deg: marker-gene stratified differential expression in Rust
//!
//! Samples are split into high and low groups by the expression quantiles of
//! one or more marker genes, compared with a limma-style moderated t-test
//! (linear model, empirical Bayes variance shrinkage, BH correction), and the
//! significant genes are submitted to Enrichr for pathway enrichment. Results
//! are written to an xlsx workbook.
//!
//! # Example
//!
//! ```ignore
//! use quantile_deg::prelude::*;
//!
//! let config = AnalysisConfig::from_file("analysis.toml")?;
//! let dataset = load_dataset(&config)?;
//! let groups = stratify(&dataset, &config.stratify)?;
//! let table = differential_expression(&dataset, &groups, &config.de)?;
//! println!("{}", table.summary());
//! ```

pub mod cli;
pub mod config;
pub mod data;
pub mod enrichment;
pub mod error;
pub mod io;
pub mod linear_model;
pub mod pipeline;
pub mod stats;
pub mod stratify;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::AnalysisConfig;
    pub use crate::data::{AnalysisDataset, ClinicalTable, ExpressionMatrix, SampleMatching};
    pub use crate::enrichment::{EnrichmentService, EnrichmentTerm, EnrichrClient};
    pub use crate::error::{AnalysisError, Result};
    pub use crate::io::{
        read_clinical_table, read_de_sheet, read_expression_matrix, write_de_table,
        write_group_table, write_workbook, DeResult, DeTable, GroupTable,
    };
    pub use crate::linear_model::{contrasts_fit, group_design_matrix, lm_fit};
    pub use crate::pipeline::{differential_expression, load_dataset, run_analysis, stratify, RunSummary};
    pub use crate::stratify::{quantile_split, GroupAssignment, GroupLabel, QuantileSplit};
    pub use crate::testing::{ebayes, top_table, AdjustMethod, EbayesParams, TopTableOptions};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use ndarray::Array2;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_full_pipeline() {
        // Marker gene on row 0; one planted gene tracks the marker groups,
        // every other gene is pure noise.
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        let (n_genes, n_samples) = (500, 48);
        let mut values = Array2::zeros((n_genes, n_samples));
        for s in 0..n_samples {
            values[[0, s]] = s as f64;
        }
        for g in 1..n_genes {
            for s in 0..n_samples {
                values[[g, s]] = 7.0 + rng.gen_range(-1.0..1.0);
            }
        }
        let planted = 250;
        for s in 36..n_samples {
            values[[planted, s]] += 2.5;
        }

        let mut gene_ids: Vec<String> = (0..n_genes).map(|g| format!("GENE{}", g)).collect();
        gene_ids[0] = "MARKER".to_string();
        let expression = ExpressionMatrix::new(
            values,
            gene_ids,
            (0..n_samples).map(|s| format!("S{:02}", s)).collect(),
        )
        .unwrap();

        let split = QuantileSplit::default();
        let groups = quantile_split(&expression, &["MARKER".to_string()], &split).unwrap();
        assert_eq!(groups.count(GroupLabel::High), 12);
        assert_eq!(groups.count(GroupLabel::Low), 12);

        // Test without the marker itself
        let genes: Vec<usize> = (1..n_genes).collect();
        let expression = expression.subset_genes(&genes).unwrap();
        let clinical = ClinicalTable::new(expression.sample_ids().to_vec());
        let dataset = AnalysisDataset::from_aligned(expression, clinical).unwrap();

        let config = AnalysisConfig::default();
        let table = differential_expression(&dataset, &groups, &config.de).unwrap();

        assert!(!table.is_empty());
        assert_eq!(table.rows[0].gene_id, format!("GENE{}", planted));
        assert!(table.rows[0].log_fold_change > 2.0);
        assert!(table.rows[0].b_statistic > 0.0);
        assert!(table.rows.iter().all(|r| r.adjusted_p_value <= 0.05));
        for w in table.rows.windows(2) {
            assert!(w[0].adjusted_p_value <= w[1].adjusted_p_value);
        }
        println!("{}", table.summary());
    }
}
