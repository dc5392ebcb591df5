//! Design matrix for the two-group comparison

use ndarray::Array2;

use crate::error::{AnalysisError, Result};
use crate::stratify::GroupLabel;

/// Information about the design matrix
#[derive(Debug, Clone, PartialEq)]
pub struct DesignInfo {
    /// Names of the coefficients, one per column
    pub coef_names: Vec<String>,
}

/// Cell-means design for the retained samples.
/// R equivalent: model.matrix(~0 + group)
///
/// Columns are `high` and `low`; each row has a single 1 in its group's column.
/// Excluded samples must be removed before building the design.
pub fn group_design_matrix(labels: &[GroupLabel]) -> Result<(Array2<f64>, DesignInfo)> {
    let levels = [GroupLabel::High, GroupLabel::Low];

    if labels.iter().any(|&l| l == GroupLabel::Excluded) {
        return Err(AnalysisError::InvalidDesignMatrix {
            reason: "excluded samples cannot enter the design".to_string(),
        });
    }

    let mut design = Array2::zeros((labels.len(), levels.len()));
    for (i, label) in labels.iter().enumerate() {
        let col = levels.iter().position(|l| l == label).unwrap_or(0);
        design[[i, col]] = 1.0;
    }

    check_full_rank(&design)?;

    let info = DesignInfo {
        coef_names: levels.iter().map(|l| l.as_str().to_string()).collect(),
    };
    Ok((design, info))
}

/// Contrast vector for `numerator - denominator`.
/// R equivalent: makeContrasts(numerator - denominator, levels=design)
pub fn contrast_vector(info: &DesignInfo, numerator: &str, denominator: &str) -> Result<Vec<f64>> {
    let find = |name: &str| {
        info.coef_names
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| AnalysisError::InvalidContrast {
                reason: format!(
                    "coefficient '{}' not in design (available: {:?})",
                    name, info.coef_names
                ),
            })
    };

    let num = find(numerator)?;
    let den = find(denominator)?;
    if num == den {
        return Err(AnalysisError::InvalidContrast {
            reason: format!("numerator and denominator are both '{}'", numerator),
        });
    }

    let mut contrast = vec![0.0; info.coef_names.len()];
    contrast[num] = 1.0;
    contrast[den] = -1.0;
    Ok(contrast)
}

/// Check if a design matrix is full rank using QR decomposition with column pivoting.
///
/// The rank counts diagonal elements of R whose absolute value exceeds
/// `max(nrow, ncol) * eps * max(|diag(R)|)`, matching R's `qr()` tolerance.
pub fn check_full_rank(matrix: &Array2<f64>) -> Result<()> {
    let nrow = matrix.nrows();
    let ncol = matrix.ncols();

    if nrow == 0 || ncol == 0 {
        return Err(AnalysisError::InvalidDesignMatrix {
            reason: "design matrix has zero rows or columns".to_string(),
        });
    }

    if qr_rank(matrix) < ncol {
        let has_zero_column = (0..ncol).any(|j| matrix.column(j).iter().all(|&v| v == 0.0));
        let reason = if has_zero_column {
            "design is not full rank: a group has no samples"
        } else {
            "design is not full rank: columns are linearly dependent"
        };
        return Err(AnalysisError::InvalidDesignMatrix {
            reason: reason.to_string(),
        });
    }

    Ok(())
}

/// Numerical rank via Householder QR with column pivoting
fn qr_rank(matrix: &Array2<f64>) -> usize {
    let nrow = matrix.nrows();
    let ncol = matrix.ncols();
    let k = nrow.min(ncol);

    let mut r = matrix.to_owned();
    let mut col_norms_sq: Vec<f64> = (0..ncol)
        .map(|j| r.column(j).iter().map(|&v| v * v).sum())
        .collect();

    for step in 0..k {
        // Pivot the column with the largest remaining norm into place
        let best_col = (step..ncol)
            .max_by(|&a, &b| {
                col_norms_sq[a]
                    .partial_cmp(&col_norms_sq[b])
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(step);
        if best_col != step {
            for i in 0..nrow {
                r.swap([i, step], [i, best_col]);
            }
            col_norms_sq.swap(step, best_col);
        }

        let mut alpha = (step..nrow).map(|i| r[[i, step]] * r[[i, step]]).sum::<f64>().sqrt();
        if alpha < f64::EPSILON * 1e3 {
            break;
        }
        if r[[step, step]] > 0.0 {
            alpha = -alpha;
        }

        let v0 = r[[step, step]] - alpha;
        r[[step, step]] = alpha;

        let v_norm_sq = v0 * v0 + ((step + 1)..nrow).map(|i| r[[i, step]] * r[[i, step]]).sum::<f64>();
        if v_norm_sq.abs() < f64::MIN_POSITIVE {
            continue;
        }
        let tau = 2.0 / v_norm_sq;

        for j in (step + 1)..ncol {
            let dot = v0 * r[[step, j]]
                + ((step + 1)..nrow).map(|i| r[[i, step]] * r[[i, j]]).sum::<f64>();
            let scale = tau * dot;
            r[[step, j]] -= scale * v0;
            for i in (step + 1)..nrow {
                r[[i, j]] -= scale * r[[i, step]];
            }
        }

        for j in (step + 1)..ncol {
            col_norms_sq[j] = (col_norms_sq[j] - r[[step, j]] * r[[step, j]]).max(0.0);
        }
    }

    let max_dim = nrow.max(ncol) as f64;
    let max_abs_diag = (0..k).map(|i| r[[i, i]].abs()).fold(0.0f64, f64::max);
    let tol = max_dim * f64::EPSILON * max_abs_diag;

    (0..k).filter(|&i| r[[i, i]].abs() > tol).count()
}
