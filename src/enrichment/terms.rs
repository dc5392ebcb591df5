//! Enrichment term records and gene list preparation

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::data::gene_symbol;
use crate::io::DeTable;

/// One enriched gene set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentTerm {
    /// Gene-set library the term comes from
    pub database: String,
    /// Rank reported by the service
    pub rank: u32,
    /// Category (pathway, GO term) name
    pub term_name: String,
    pub p_value: f64,
    pub adjusted_p_value: f64,
    pub odds_ratio: f64,
    pub combined_score: f64,
    /// Submitted genes that belong to the term
    pub genes: Vec<String>,
}

/// Filtered enrichment result for one database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseEnrichment {
    pub database: String,
    /// Terms returned before filtering
    pub n_tested_terms: usize,
    /// Terms passing the cutoff, ascending adjusted p-value
    pub terms: Vec<EnrichmentTerm>,
}

/// Gene symbols to submit for enrichment.
///
/// Identifiers are reduced to their symbol (`TP53|7157` -> `TP53`); unknown
/// (`?`) and empty symbols are dropped and duplicates removed, keeping the
/// table order.
pub fn enrichment_gene_list(table: &DeTable) -> Vec<String> {
    let mut seen = HashSet::new();
    table
        .rows
        .iter()
        .map(|r| gene_symbol(&r.gene_id))
        .filter(|s| !s.is_empty() && *s != "?")
        .filter(|s| seen.insert(s.to_string()))
        .map(|s| s.to_string())
        .collect()
}

/// Keep terms with adjusted p-value strictly below `fdr_cutoff`, sorted by
/// adjusted p-value, then raw p-value, then name.
pub fn filter_terms(terms: Vec<EnrichmentTerm>, fdr_cutoff: f64) -> Vec<EnrichmentTerm> {
    let mut kept: Vec<EnrichmentTerm> = terms
        .into_iter()
        .filter(|t| t.adjusted_p_value.is_finite() && t.adjusted_p_value < fdr_cutoff)
        .collect();
    kept.sort_by(|a, b| {
        a.adjusted_p_value
            .total_cmp(&b.adjusted_p_value)
            .then(a.p_value.total_cmp(&b.p_value))
            .then_with(|| a.term_name.cmp(&b.term_name))
    });
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::mock::term;
    use crate::io::DeResult;
    use crate::testing::AdjustMethod;

    #[test]
    fn test_gene_list_symbols() {
        let ids = ["TP53|7157", "?|100130426", "MYC|4609", "TP53|7157_1", "EGFR"];
        let table = DeTable {
            contrast: "high-low".to_string(),
            adjust_method: AdjustMethod::Bh,
            p_value_cutoff: 0.05,
            lfc_cutoff: 0.0,
            n_tested: 5,
            rows: ids
                .iter()
                .map(|id| DeResult {
                    gene_id: id.to_string(),
                    log_fold_change: 1.0,
                    average_expression: 1.0,
                    t_statistic: 3.0,
                    raw_p_value: 0.001,
                    adjusted_p_value: 0.01,
                    b_statistic: 0.0,
                })
                .collect(),
        };
        assert_eq!(enrichment_gene_list(&table), vec!["TP53", "MYC", "EGFR"]);
    }

    #[test]
    fn test_filter_terms_sorted() {
        let terms = vec![
            term("db", "b", 0.04),
            term("db", "a", 0.001),
            term("db", "c", 0.05),
            term("db", "d", f64::NAN),
        ];
        let kept = filter_terms(terms, 0.05);
        let names: Vec<&str> = kept.iter().map(|t| t.term_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
