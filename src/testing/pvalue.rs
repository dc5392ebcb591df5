//! P-value calculation from test statistics

use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

/// Two-sided p-value from a z-statistic
/// R equivalent: 2 * pnorm(-abs(z))
pub fn calculate_pvalue(z: f64) -> f64 {
    if !z.is_finite() {
        return f64::NAN;
    }
    match Normal::new(0.0, 1.0) {
        Ok(normal) => 2.0 * normal.cdf(-z.abs()),
        Err(_) => f64::NAN,
    }
}

/// Two-sided p-value from a t-statistic with `df` degrees of freedom
/// R equivalent: 2 * pt(-abs(stat), df=df)
///
/// Infinite degrees of freedom fall back to the normal distribution.
pub fn calculate_pvalue_t(stat: f64, df: f64) -> f64 {
    if !stat.is_finite() || !(df > 0.0) {
        return f64::NAN;
    }
    if df.is_infinite() {
        return calculate_pvalue(stat);
    }
    match StudentsT::new(0.0, 1.0, df) {
        Ok(t_dist) => (2.0 * t_dist.cdf(-stat.abs())).min(1.0),
        Err(_) => f64::NAN,
    }
}

/// Upper tail probability P(T > t)
/// R equivalent: pt(t, df, lower.tail=FALSE)
pub fn upper_tail_t(stat: f64, df: f64) -> f64 {
    if df.is_infinite() {
        return Normal::new(0.0, 1.0).map(|n| n.sf(stat)).unwrap_or(f64::NAN);
    }
    StudentsT::new(0.0, 1.0, df)
        .map(|t| t.sf(stat))
        .unwrap_or(f64::NAN)
}

/// Upper tail quantile: t such that P(T > t) = p
/// R equivalent: qt(p, df, lower.tail=FALSE)
pub fn upper_tail_quantile_t(p: f64, df: f64) -> f64 {
    if !(p > 0.0 && p < 1.0) {
        return f64::NAN;
    }
    if df.is_infinite() {
        return Normal::new(0.0, 1.0)
            .map(|n| n.inverse_cdf(1.0 - p))
            .unwrap_or(f64::NAN);
    }
    StudentsT::new(0.0, 1.0, df)
        .map(|t| t.inverse_cdf(1.0 - p))
        .unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pvalue_symmetric() {
        let p1 = calculate_pvalue(2.0);
        let p2 = calculate_pvalue(-2.0);
        assert!((p1 - p2).abs() < 1e-10);
    }

    #[test]
    fn test_pvalue_zero() {
        assert!((calculate_pvalue(0.0) - 1.0).abs() < 1e-10);
        assert!((calculate_pvalue_t(0.0, 5.0) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_pvalue_t_distribution() {
        let p_normal = calculate_pvalue(2.0);
        let p_t_large = calculate_pvalue_t(2.0, 1000.0);
        assert!((p_normal - p_t_large).abs() < 0.001);

        // R: 2*pt(-2, 3) = 0.1393260
        let p_t_small = calculate_pvalue_t(2.0, 3.0);
        assert!((p_t_small - 0.1393260).abs() < 1e-6);
        assert_eq!(calculate_pvalue_t(2.0, f64::INFINITY), p_normal);
    }

    #[test]
    fn test_tail_quantile_inverts_tail() {
        for &df in &[3.0, 12.5, f64::INFINITY] {
            let t = upper_tail_quantile_t(0.01, df);
            assert!((upper_tail_t(t, df) - 0.01).abs() < 1e-6);
        }
    }
}
