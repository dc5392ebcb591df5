//! Ranked table of differentially expressed genes

use std::cmp::Ordering;

use super::ebayes::ModeratedFit;
use super::fdr::AdjustMethod;
use crate::error::{AnalysisError, Result};
use crate::io::{DeResult, DeTable};

/// Cutoffs applied by [`top_table`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopTableOptions {
    pub adjust_method: AdjustMethod,
    /// Keep genes with adjusted p-value <= this
    pub p_value_cutoff: f64,
    /// Keep genes with |logFC| >= this
    pub lfc_cutoff: f64,
}

impl Default for TopTableOptions {
    fn default() -> Self {
        Self {
            adjust_method: AdjustMethod::Bh,
            p_value_cutoff: 0.05,
            lfc_cutoff: 0.0,
        }
    }
}

/// Extract the significant genes for one coefficient, most significant first.
/// R equivalent: limma::topTable(fit, coef, number=Inf, adjust.method, p.value, lfc)
///
/// Ties in adjusted p-value are broken by raw p-value, then by larger |t|,
/// then by gene id, so the order is fully deterministic.
pub fn top_table(fit: &ModeratedFit, coef: usize, options: &TopTableOptions) -> Result<DeTable> {
    let n_coefs = fit.t.ncols();
    if coef >= n_coefs {
        return Err(AnalysisError::InvalidContrast {
            reason: format!("coefficient {} out of range ({} available)", coef, n_coefs),
        });
    }
    if !(options.p_value_cutoff >= 0.0 && options.p_value_cutoff <= 1.0) {
        return Err(AnalysisError::InvalidInput {
            reason: format!("p-value cutoff must be in [0, 1], got {}", options.p_value_cutoff),
        });
    }
    if !(options.lfc_cutoff >= 0.0) {
        return Err(AnalysisError::InvalidInput {
            reason: format!("logFC cutoff must be >= 0, got {}", options.lfc_cutoff),
        });
    }

    let raw: Vec<f64> = fit.p_value.column(coef).to_vec();
    let adjusted = options.adjust_method.adjust(&raw);

    let mut rows: Vec<DeResult> = (0..fit.fit.n_genes())
        .filter_map(|g| {
            let lfc = fit.fit.coefficients[[g, coef]];
            let adj = adjusted[g];
            if !adj.is_finite() || adj > options.p_value_cutoff || lfc.abs() < options.lfc_cutoff {
                return None;
            }
            Some(DeResult {
                gene_id: fit.fit.gene_ids[g].clone(),
                log_fold_change: lfc,
                average_expression: fit.fit.amean[g],
                t_statistic: fit.t[[g, coef]],
                raw_p_value: raw[g],
                adjusted_p_value: adj,
                b_statistic: fit.lods[[g, coef]],
            })
        })
        .collect();

    rows.sort_by(compare_rows);

    log::info!(
        "{} of {} genes pass adj.P <= {} and |logFC| >= {}",
        rows.len(),
        fit.fit.n_genes(),
        options.p_value_cutoff,
        options.lfc_cutoff
    );

    Ok(DeTable {
        contrast: fit.fit.coef_names[coef].clone(),
        adjust_method: options.adjust_method,
        p_value_cutoff: options.p_value_cutoff,
        lfc_cutoff: options.lfc_cutoff,
        n_tested: fit.fit.n_genes(),
        rows,
    })
}

fn compare_rows(a: &DeResult, b: &DeResult) -> Ordering {
    a.adjusted_p_value
        .total_cmp(&b.adjusted_p_value)
        .then(a.raw_p_value.total_cmp(&b.raw_p_value))
        .then(b.t_statistic.abs().total_cmp(&a.t_statistic.abs()))
        .then_with(|| a.gene_id.cmp(&b.gene_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ExpressionMatrix;
    use crate::linear_model::{contrast_vector, contrasts_fit, group_design_matrix, lm_fit};
    use crate::stratify::GroupLabel;
    use crate::testing::{ebayes, EbayesParams};
    use ndarray::Array2;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn moderated_fit(seed: u64) -> ModeratedFit {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let (n_genes, n_samples) = (300, 12);
        let mut values = Array2::zeros((n_genes, n_samples));
        for g in 0..n_genes {
            for s in 0..n_samples {
                values[[g, s]] = 6.0 + rng.gen_range(-1.0..1.0);
            }
        }
        // genes 0-4 up, 5-9 down in the high group
        for g in 0..10 {
            let shift = if g < 5 { 3.0 } else { -3.0 };
            for s in 0..6 {
                values[[g, s]] += shift;
            }
        }
        let expr = ExpressionMatrix::new(
            values,
            (0..n_genes).map(|g| format!("G{:03}", g)).collect(),
            (0..n_samples).map(|s| format!("S{}", s)).collect(),
        )
        .unwrap();
        let labels: Vec<GroupLabel> = (0..n_samples)
            .map(|s| if s < 6 { GroupLabel::High } else { GroupLabel::Low })
            .collect();
        let (design, info) = group_design_matrix(&labels).unwrap();
        let fit = lm_fit(&expr, &design, &info).unwrap();
        let c = contrast_vector(&info, "high", "low").unwrap();
        let cfit = contrasts_fit(&fit, &c, "high-low").unwrap();
        ebayes(&cfit, &EbayesParams::default()).unwrap()
    }

    #[test]
    fn test_sorted_and_under_cutoff() {
        let eb = moderated_fit(42);
        let table = top_table(&eb, 0, &TopTableOptions::default()).unwrap();
        assert_eq!(table.contrast, "high-low");
        assert!(table.len() >= 10);
        for w in table.rows.windows(2) {
            assert!(w[0].adjusted_p_value <= w[1].adjusted_p_value);
        }
        assert!(table.rows.iter().all(|r| r.adjusted_p_value <= 0.05));
        let top10: Vec<&str> = table.gene_ids().into_iter().take(10).collect();
        for g in 0..10 {
            assert!(top10.contains(&format!("G{:03}", g).as_str()));
        }
        assert!(table.summary().upregulated >= 5);
    }

    #[test]
    fn test_lfc_cutoff_and_bonferroni() {
        let eb = moderated_fit(3);
        let strict = TopTableOptions {
            adjust_method: AdjustMethod::Bonferroni,
            p_value_cutoff: 0.01,
            lfc_cutoff: 2.0,
        };
        let table = top_table(&eb, 0, &strict).unwrap();
        assert!(table.rows.iter().all(|r| r.log_fold_change.abs() >= 2.0));
        assert!(table.rows.iter().all(|r| r.adjusted_p_value <= 0.01));
    }

    #[test]
    fn test_invalid_options() {
        let eb = moderated_fit(1);
        assert!(top_table(&eb, 1, &TopTableOptions::default()).is_err());
        let bad = TopTableOptions {
            p_value_cutoff: 1.5,
            ..Default::default()
        };
        assert!(top_table(&eb, 0, &bad).is_err());
    }

    #[test]
    fn test_tie_ordering() {
        let mk = |id: &str, adj: f64, raw: f64, t: f64| DeResult {
            gene_id: id.to_string(),
            log_fold_change: 1.0,
            average_expression: 1.0,
            t_statistic: t,
            raw_p_value: raw,
            adjusted_p_value: adj,
            b_statistic: 0.0,
        };
        let mut rows = vec![
            mk("B", 0.01, 0.001, 4.0),
            mk("A", 0.01, 0.001, 4.0),
            mk("C", 0.01, 0.001, -5.0),
            mk("D", 0.01, 0.0005, 3.0),
            mk("E", 0.001, 0.0001, 6.0),
        ];
        rows.sort_by(compare_rows);
        let order: Vec<&str> = rows.iter().map(|r| r.gene_id.as_str()).collect();
        assert_eq!(order, vec!["E", "D", "C", "A", "B"]);
    }
}
