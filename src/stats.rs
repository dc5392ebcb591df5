//! Statistical utility functions shared across modules
//!
//! Contains sample quantiles, summary moments, and the polygamma functions
//! needed by the empirical Bayes variance prior.

use std::cmp::Ordering;

/// Sample quantile using R's default definition (type 7).
/// R equivalent: quantile(x, p, type=7)
///
/// `sorted_x` must already be sorted ascending and free of NaN.
/// h = (n-1)*p, result = x[floor(h)] + (h - floor(h)) * (x[ceil(h)] - x[floor(h)])
pub fn quantile_type7(sorted_x: &[f64], p: f64) -> f64 {
    let n = sorted_x.len();
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return sorted_x[0];
    }

    let h = (n as f64 - 1.0) * p;
    let h_floor = h.floor() as usize;
    let h_ceil = h.ceil() as usize;

    let lo = h_floor.min(n - 1);
    let hi = h_ceil.min(n - 1);

    if lo == hi {
        sorted_x[lo]
    } else {
        let frac = h - h_floor as f64;
        sorted_x[lo] + frac * (sorted_x[hi] - sorted_x[lo])
    }
}

/// Sort a copy of the finite values of `x` ascending
pub fn sorted_finite(x: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = x.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}

/// Arithmetic mean, NaN for empty input
pub fn mean(x: &[f64]) -> f64 {
    if x.is_empty() {
        return f64::NAN;
    }
    x.iter().sum::<f64>() / x.len() as f64
}

/// Median of the finite values in `x`
pub fn median(x: &[f64]) -> f64 {
    let sorted = sorted_finite(x);
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Digamma function
pub fn digamma(x: f64) -> f64 {
    statrs::function::gamma::digamma(x)
}

/// Trigamma function (derivative of digamma)
///
/// Recurrence up to x >= 10, then the asymptotic series.
pub fn trigamma(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    if x <= 0.0 && x == x.floor() {
        return f64::INFINITY;
    }
    if x < 0.5 {
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).powi(2) - trigamma(1.0 - x);
    }

    let mut result = 0.0;
    let mut z = x;
    while z < 10.0 {
        result += 1.0 / (z * z);
        z += 1.0;
    }
    let inv = 1.0 / z;
    let inv2 = inv * inv;
    result
        + inv
        + 0.5 * inv2
        + inv * inv2 * (1.0 / 6.0 - inv2 * (1.0 / 30.0 - inv2 * (1.0 / 42.0 - inv2 / 30.0)))
}

/// Tetragamma function, the second derivative of digamma.
/// R equivalent: psigamma(x, deriv=2)
///
/// Defined here for x > 0 only.
pub fn tetragamma(x: f64) -> f64 {
    if !(x > 0.0) {
        return f64::NAN;
    }

    let mut result = 0.0;
    let mut z = x;
    while z < 10.0 {
        result -= 2.0 / (z * z * z);
        z += 1.0;
    }
    let inv = 1.0 / z;
    let inv2 = inv * inv;
    result
        - inv2
        - inv2 * inv
        - 0.5 * inv2 * inv2
        + inv2 * inv2 * inv2 * (1.0 / 6.0 - inv2 * (1.0 / 6.0 - inv2 * 3.0 / 10.0))
}

/// Inverse of the trigamma function.
/// R equivalent: limma::trigammaInverse()
///
/// Newton iteration on 1/trigamma, which is nearly linear, starting from
/// y = 0.5 + 1/x.
pub fn trigamma_inverse(x: f64) -> f64 {
    if x.is_nan() || x < 0.0 {
        return f64::NAN;
    }
    if x == 0.0 {
        return f64::INFINITY;
    }
    if x > 1e7 {
        return 1.0 / x.sqrt();
    }
    if x < 1e-6 {
        return 1.0 / x;
    }

    let mut y = 0.5 + 1.0 / x;
    for iter in 0.. {
        let tri = trigamma(y);
        let dif = tri * (1.0 - tri / x) / tetragamma(y);
        y += dif;
        if -dif / y < 1e-8 {
            break;
        }
        if iter >= 50 {
            log::warn!("trigamma_inverse: iteration limit exceeded for x={}", x);
            break;
        }
    }
    y
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_type7_matches_r() {
        // R: quantile(1:10, c(0.25, 0.5, 0.75))  -> 3.25 5.50 7.75
        let x: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        assert!((quantile_type7(&x, 0.25) - 3.25).abs() < 1e-12);
        assert!((quantile_type7(&x, 0.5) - 5.5).abs() < 1e-12);
        assert!((quantile_type7(&x, 0.75) - 7.75).abs() < 1e-12);
        assert_eq!(quantile_type7(&x, 0.0), 1.0);
        assert_eq!(quantile_type7(&x, 1.0), 10.0);
    }

    #[test]
    fn test_quantile_type7_degenerate() {
        assert!(quantile_type7(&[], 0.5).is_nan());
        assert_eq!(quantile_type7(&[4.2], 0.9), 4.2);
    }

    #[test]
    fn test_moments() {
        let x = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&x) - 5.0).abs() < 1e-12);
        assert!((median(&x) - 4.5).abs() < 1e-12);
    }

    #[test]
    fn test_trigamma() {
        let pi2 = std::f64::consts::PI.powi(2);
        // trigamma(1) = pi^2/6
        assert!((trigamma(1.0) - pi2 / 6.0).abs() < 1e-10);
        // trigamma(0.5) = pi^2/2
        assert!((trigamma(0.5) - pi2 / 2.0).abs() < 1e-10);
        // trigamma(2) = pi^2/6 - 1
        assert!((trigamma(2.0) - (pi2 / 6.0 - 1.0)).abs() < 1e-10);
    }

    #[test]
    fn test_tetragamma() {
        // psigamma(1, 2) = -2 * zeta(3)
        let zeta3 = 1.202_056_903_159_594_3;
        assert!((tetragamma(1.0) + 2.0 * zeta3).abs() < 1e-9);
        // recurrence: psi2(x+1) = psi2(x) + 2/x^3
        let x = 3.7;
        assert!((tetragamma(x + 1.0) - tetragamma(x) - 2.0 / x.powi(3)).abs() < 1e-10);
    }

    #[test]
    fn test_trigamma_inverse_roundtrip() {
        for &y in &[0.05, 0.3, 1.0, 2.5, 10.0, 150.0] {
            let x = trigamma(y);
            let back = trigamma_inverse(x);
            assert!(
                (back - y).abs() / y < 1e-6,
                "trigamma_inverse(trigamma({})) = {}",
                y,
                back
            );
        }
    }
}
