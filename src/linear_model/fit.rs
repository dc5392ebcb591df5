//! Gene-wise ordinary least squares and contrast projection

use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;

use super::design::DesignInfo;
use crate::data::ExpressionMatrix;
use crate::error::{AnalysisError, Result};

/// Gene-wise linear model fit
/// R equivalent: MArrayLM object returned by limma::lmFit()
#[derive(Debug, Clone)]
pub struct LinearModelFit {
    /// Gene identifiers
    pub gene_ids: Vec<String>,
    /// Coefficient names, one per column of `coefficients`
    pub coef_names: Vec<String>,
    /// Estimated coefficients (genes x coefficients)
    pub coefficients: Array2<f64>,
    /// Unscaled standard deviations: sqrt(diag((X'X)^-1)) per gene
    pub stdev_unscaled: Array2<f64>,
    /// Residual standard deviation per gene
    pub sigma: Vec<f64>,
    /// Residual degrees of freedom per gene
    pub df_residual: Vec<f64>,
    /// Average expression per gene over the fitted samples
    pub amean: Vec<f64>,
    /// Unscaled covariance of the coefficients, (X'X)^-1
    pub cov_coefficients: Array2<f64>,
}

impl LinearModelFit {
    pub fn n_genes(&self) -> usize {
        self.gene_ids.len()
    }
}

/// Cholesky solve of a symmetric positive definite system (row-major `a`)
fn solve_symmetric_system(a: &[f64], b: &[f64], n: usize) -> Result<Vec<f64>> {
    let mut l = vec![0.0; n * n];

    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i * n + j];
            for k in 0..j {
                sum -= l[i * n + k] * l[j * n + k];
            }
            if i == j {
                if sum <= 0.0 {
                    return Err(AnalysisError::NumericalInstability {
                        operation: "cholesky".to_string(),
                        details: "X'X is not positive definite".to_string(),
                    });
                }
                l[i * n + j] = sum.sqrt();
            } else {
                l[i * n + j] = sum / l[j * n + j];
            }
        }
    }

    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[i * n + j] * y[j];
        }
        y[i] = sum / l[i * n + i];
    }

    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for j in (i + 1)..n {
            sum -= l[j * n + i] * x[j];
        }
        x[i] = sum / l[i * n + i];
    }
    Ok(x)
}

fn invert_symmetric_matrix(a: &Array2<f64>) -> Result<Array2<f64>> {
    let n = a.nrows();
    let flat: Vec<f64> = a.iter().copied().collect();
    let mut result = Array2::zeros((n, n));
    for i in 0..n {
        let mut e = vec![0.0; n];
        e[i] = 1.0;
        let col = solve_symmetric_system(&flat, &e, n)?;
        for j in 0..n {
            result[[j, i]] = col[j];
        }
    }
    Ok(result)
}

/// Fit a linear model to every gene.
/// R equivalent: limma::lmFit(expr, design)
///
/// The design is shared by all genes and the data has no missing values, so a
/// single (X'X)^-1 serves every fit.
pub fn lm_fit(
    expression: &ExpressionMatrix,
    design: &Array2<f64>,
    info: &DesignInfo,
) -> Result<LinearModelFit> {
    let n_samples = expression.n_samples();
    let n_coefs = design.ncols();

    if design.nrows() != n_samples {
        return Err(AnalysisError::DimensionMismatch {
            expected: format!("{} design rows", n_samples),
            got: format!("{} design rows", design.nrows()),
        });
    }
    if info.coef_names.len() != n_coefs {
        return Err(AnalysisError::InvalidDesignMatrix {
            reason: format!(
                "{} coefficient names for {} design columns",
                info.coef_names.len(),
                n_coefs
            ),
        });
    }
    if n_samples <= n_coefs {
        return Err(AnalysisError::InvalidDesignMatrix {
            reason: format!(
                "no residual degrees of freedom ({} samples, {} coefficients)",
                n_samples, n_coefs
            ),
        });
    }

    let xtx = design.t().dot(design);
    let xtx_inv = invert_symmetric_matrix(&xtx)?;
    // Projection rows: beta = (X'X)^-1 X' y
    let projection = xtx_inv.dot(&design.t());

    let df = (n_samples - n_coefs) as f64;
    let values = expression.values();
    let n_genes = expression.n_genes();

    let per_gene: Vec<(Array1<f64>, f64, f64)> = (0..n_genes)
        .into_par_iter()
        .map(|g| {
            let y = values.row(g);
            let beta = projection.dot(&y);
            let fitted = design.dot(&beta);
            let rss: f64 = y
                .iter()
                .zip(fitted.iter())
                .map(|(&obs, &fit)| (obs - fit).powi(2))
                .sum();
            let amean = y.sum() / n_samples as f64;
            (beta, (rss / df).sqrt(), amean)
        })
        .collect();

    let mut coefficients = Array2::zeros((n_genes, n_coefs));
    let mut sigma = Vec::with_capacity(n_genes);
    let mut amean = Vec::with_capacity(n_genes);
    for (g, (beta, s, a)) in per_gene.into_iter().enumerate() {
        coefficients.row_mut(g).assign(&beta);
        sigma.push(s);
        amean.push(a);
    }

    let unscaled: Array1<f64> = xtx_inv.diag().mapv(f64::sqrt);
    let stdev_unscaled = Array2::from_shape_fn((n_genes, n_coefs), |(_, j)| unscaled[j]);

    log::debug!(
        "lm_fit: {} genes, {} samples, {} coefficients, df={}",
        n_genes,
        n_samples,
        n_coefs,
        df
    );

    Ok(LinearModelFit {
        gene_ids: expression.gene_ids().to_vec(),
        coef_names: info.coef_names.clone(),
        coefficients,
        stdev_unscaled,
        sigma,
        df_residual: vec![df; n_genes],
        amean,
        cov_coefficients: xtx_inv,
    })
}

/// Re-express a fit in terms of a single contrast of its coefficients.
/// R equivalent: limma::contrasts.fit(fit, contrasts)
pub fn contrasts_fit(fit: &LinearModelFit, contrast: &[f64], name: &str) -> Result<LinearModelFit> {
    let n_coefs = fit.coef_names.len();
    if contrast.len() != n_coefs {
        return Err(AnalysisError::InvalidContrast {
            reason: format!(
                "contrast has {} weights, fit has {} coefficients",
                contrast.len(),
                n_coefs
            ),
        });
    }

    let c = Array1::from_vec(contrast.to_vec());
    let estimates = fit.coefficients.dot(&c);
    let variance = c.dot(&fit.cov_coefficients.dot(&c));
    if !(variance > 0.0) {
        return Err(AnalysisError::InvalidContrast {
            reason: "contrast has zero variance".to_string(),
        });
    }

    let n_genes = fit.n_genes();
    Ok(LinearModelFit {
        gene_ids: fit.gene_ids.clone(),
        coef_names: vec![name.to_string()],
        coefficients: estimates.insert_axis(Axis(1)),
        stdev_unscaled: Array2::from_elem((n_genes, 1), variance.sqrt()),
        sigma: fit.sigma.clone(),
        df_residual: fit.df_residual.clone(),
        amean: fit.amean.clone(),
        cov_coefficients: Array2::from_elem((1, 1), variance),
    })
}
