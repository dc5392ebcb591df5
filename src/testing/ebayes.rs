//! Empirical Bayes moderation of gene-wise variances
//!
//! Residual variances are treated as draws from a scaled inverse chi-square
//! prior whose scale and degrees of freedom are estimated from all genes by
//! the method of moments on log(s^2). Posterior variances shrink each gene
//! towards the prior, which stabilises t-statistics for small groups.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::pvalue::{calculate_pvalue_t, upper_tail_quantile_t, upper_tail_t};
use crate::error::{AnalysisError, Result};
use crate::linear_model::LinearModelFit;
use crate::stats::{digamma, mean, median, trigamma, trigamma_inverse};

/// Scaled F-distribution prior for residual variances
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariancePrior {
    /// Prior variance (s0^2)
    pub scale: f64,
    /// Prior degrees of freedom (d0); infinite when the variances show no
    /// more spread than sampling error
    pub df: f64,
}

/// Fit a scaled F-distribution to sample variances by moments of log(x).
/// R equivalent: limma::fitFDist(x, df1)
pub fn fit_f_dist(x: &[f64], df1: &[f64]) -> VariancePrior {
    if x.is_empty() {
        return VariancePrior {
            scale: f64::NAN,
            df: f64::NAN,
        };
    }

    let (mut xs, ds): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(df1.iter())
        .filter(|(&v, &d)| v.is_finite() && v > -1e-15 && d.is_finite() && d > 1e-15)
        .map(|(&v, &d)| (v, d))
        .unzip();

    let nok = xs.len();
    if nok == 0 {
        return VariancePrior {
            scale: f64::NAN,
            df: f64::NAN,
        };
    }
    if nok == 1 {
        return VariancePrior {
            scale: xs[0].max(0.0),
            df: 0.0,
        };
    }

    for v in xs.iter_mut() {
        *v = v.max(0.0);
    }
    let mut m = median(&xs);
    if m == 0.0 {
        log::warn!("More than half of residual variances are exactly zero: eBayes unreliable");
        m = 1.0;
    } else if xs.iter().any(|&v| v == 0.0) {
        log::warn!("Zero sample variances detected, have been offset away from zero");
    }
    let floor = 1e-5 * m;

    let e: Vec<f64> = xs
        .iter()
        .zip(ds.iter())
        .map(|(&v, &d)| v.max(floor).ln() - digamma(d / 2.0) + (d / 2.0).ln())
        .collect();
    let emean = mean(&e);
    let mut evar = e.iter().map(|&v| (v - emean).powi(2)).sum::<f64>() / (nok as f64 - 1.0);
    evar -= mean(&ds.iter().map(|&d| trigamma(d / 2.0)).collect::<Vec<_>>());

    if evar > 0.0 {
        let df2 = 2.0 * trigamma_inverse(evar);
        let scale = (emean + digamma(df2 / 2.0) - (df2 / 2.0).ln()).exp();
        VariancePrior { scale, df: df2 }
    } else {
        VariancePrior {
            scale: emean.exp(),
            df: f64::INFINITY,
        }
    }
}

/// Posterior variances under the fitted prior.
/// R equivalent: limma::squeezeVar(var, df)
pub fn squeeze_var(var: &[f64], df: &[f64]) -> (Vec<f64>, VariancePrior) {
    let prior = fit_f_dist(var, df);

    let post = if prior.df.is_infinite() {
        vec![prior.scale; var.len()]
    } else if !prior.df.is_finite() || !prior.scale.is_finite() {
        var.to_vec()
    } else {
        var.iter()
            .zip(df.iter())
            .map(|(&v, &d)| (d * v + prior.df * prior.scale) / (d + prior.df))
            .collect()
    };

    (post, prior)
}

/// Tuning constants of the moderated statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EbayesParams {
    /// Assumed proportion of differentially expressed genes (for the B-statistic)
    pub proportion: f64,
    /// Limits on the prior standard deviation of non-zero log fold changes
    pub stdev_coef_lim: (f64, f64),
}

impl Default for EbayesParams {
    fn default() -> Self {
        Self {
            proportion: 0.01,
            stdev_coef_lim: (0.1, 4.0),
        }
    }
}

/// Linear model fit with moderated statistics
/// R equivalent: MArrayLM after limma::eBayes()
#[derive(Debug, Clone)]
pub struct ModeratedFit {
    pub fit: LinearModelFit,
    pub prior: VariancePrior,
    /// Posterior residual variances
    pub s2_post: Vec<f64>,
    /// Total degrees of freedom per gene
    pub df_total: Vec<f64>,
    /// Moderated t-statistics (genes x coefficients)
    pub t: Array2<f64>,
    /// Two-sided p-values (genes x coefficients)
    pub p_value: Array2<f64>,
    /// Log-odds of differential expression, B-statistic (genes x coefficients)
    pub lods: Array2<f64>,
    /// Prior variance of non-zero coefficients, one per coefficient
    pub var_prior: Vec<f64>,
}

/// Empirical Bayes moderated t-statistics.
/// R equivalent: limma::eBayes(fit)
pub fn ebayes(fit: &LinearModelFit, params: &EbayesParams) -> Result<ModeratedFit> {
    if !(params.proportion > 0.0 && params.proportion < 1.0) {
        return Err(AnalysisError::InvalidInput {
            reason: format!("proportion must be in (0, 1), got {}", params.proportion),
        });
    }
    if fit.df_residual.iter().all(|&d| d <= 0.0) {
        return Err(AnalysisError::InvalidInput {
            reason: "no residual degrees of freedom in linear model fits".to_string(),
        });
    }

    let s2: Vec<f64> = fit.sigma.iter().map(|s| s * s).collect();
    let (s2_post, prior) = squeeze_var(&s2, &fit.df_residual);

    if !prior.scale.is_finite() {
        return Err(AnalysisError::NumericalInstability {
            operation: "ebayes".to_string(),
            details: "could not estimate a variance prior".to_string(),
        });
    }

    log::info!(
        "Variance prior: s0^2 = {:.4e}, d0 = {:.3}",
        prior.scale,
        prior.df
    );

    let df_pooled: f64 = fit.df_residual.iter().filter(|d| d.is_finite()).sum();
    let df_total: Vec<f64> = fit
        .df_residual
        .iter()
        .map(|&d| (d + prior.df).min(df_pooled))
        .collect();

    let (n_genes, n_coefs) = fit.coefficients.dim();
    let mut t = Array2::zeros((n_genes, n_coefs));
    let mut p_value = Array2::zeros((n_genes, n_coefs));
    for g in 0..n_genes {
        for j in 0..n_coefs {
            let stat = fit.coefficients[[g, j]] / fit.stdev_unscaled[[g, j]] / s2_post[g].sqrt();
            t[[g, j]] = stat;
            p_value[[g, j]] = calculate_pvalue_t(stat, df_total[g]);
        }
    }

    // B-statistic
    let var_prior_lim = (
        params.stdev_coef_lim.0.powi(2) / prior.scale,
        params.stdev_coef_lim.1.powi(2) / prior.scale,
    );
    let var_prior: Vec<f64> = (0..n_coefs)
        .map(|j| {
            let tj: Vec<f64> = t.column(j).to_vec();
            let sj: Vec<f64> = fit.stdev_unscaled.column(j).to_vec();
            let v = tmixture_vector(&tj, &sj, &df_total, params.proportion, Some(var_prior_lim));
            if v.is_nan() {
                1.0 / prior.scale
            } else {
                v
            }
        })
        .collect();

    let log_prop = (params.proportion / (1.0 - params.proportion)).ln();
    let infinite_prior = prior.df > 1e6;
    let mut lods = Array2::zeros((n_genes, n_coefs));
    for g in 0..n_genes {
        for j in 0..n_coefs {
            let su2 = fit.stdev_unscaled[[g, j]].powi(2);
            let r = (su2 + var_prior[j]) / su2;
            let t2 = t[[g, j]].powi(2);
            let kernel = if infinite_prior {
                t2 * (1.0 - 1.0 / r) / 2.0
            } else {
                let d = df_total[g];
                (1.0 + d) / 2.0 * ((t2 + d) / (t2 / r + d)).ln()
            };
            lods[[g, j]] = log_prop - r.ln() / 2.0 + kernel;
        }
    }

    Ok(ModeratedFit {
        fit: fit.clone(),
        prior,
        s2_post,
        df_total,
        t,
        p_value,
        lods,
        var_prior,
    })
}

/// Estimate the prior variance of non-zero coefficients from the top t-statistics.
/// R equivalent: limma:::tmixture.vector()
fn tmixture_vector(
    tstat: &[f64],
    stdev_unscaled: &[f64],
    df: &[f64],
    proportion: f64,
    v0_lim: Option<(f64, f64)>,
) -> f64 {
    let rows: Vec<(f64, f64, f64)> = tstat
        .iter()
        .zip(stdev_unscaled.iter())
        .zip(df.iter())
        .filter(|((t, _), _)| !t.is_nan())
        .map(|((&t, &s), &d)| (t.abs(), s, d))
        .collect();

    let ngenes = rows.len();
    let ntarget = (proportion / 2.0 * ngenes as f64).ceil() as usize;
    if ntarget < 1 {
        return f64::NAN;
    }
    let p = (ntarget as f64 / ngenes as f64).max(proportion);

    let max_df = rows.iter().map(|r| r.2).fold(f64::NEG_INFINITY, f64::max);

    // Put every statistic on the max_df scale
    let mut adjusted: Vec<(f64, f64)> = rows
        .iter()
        .map(|&(t, s, d)| {
            if d < max_df {
                let tail = upper_tail_t(t, d);
                let q = upper_tail_quantile_t(tail, max_df);
                (if q.is_finite() { q } else { t }, s)
            } else {
                (t, s)
            }
        })
        .collect();

    adjusted.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    adjusted.truncate(ntarget);

    let v0: Vec<f64> = adjusted
        .iter()
        .enumerate()
        .map(|(i, &(t, s))| {
            let v1 = s * s;
            let p0 = 2.0 * upper_tail_t(t, max_df);
            let ptarget = ((i as f64 + 0.5) / ngenes as f64 - (1.0 - p) * p0) / p;
            let mut v = 0.0;
            if ptarget > p0 {
                let qtarget = upper_tail_quantile_t(ptarget / 2.0, max_df);
                if qtarget.is_finite() && qtarget > 0.0 {
                    v = v1 * ((t / qtarget).powi(2) - 1.0);
                }
            }
            match v0_lim {
                Some((lo, hi)) => v.max(lo).min(hi),
                None => v,
            }
        })
        .collect();

    mean(&v0)
}
