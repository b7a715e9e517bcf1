// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use edm_core::is_missing;

/// Forecast skill summary over the eligible prediction rows.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PredStats {
    /// Rows where both prediction and observation were present.
    pub num_pred: usize,
    /// Pearson correlation between predictions and observations.
    pub rho: f64,
    /// Mean absolute error.
    pub mae: f64,
    /// Root-mean-square error.
    pub rmse: f64,
    /// Directional agreement as a fraction in `[0, 1]`: sign of
    /// `pred[t] - obs[t-1]` against sign of `obs[t] - obs[t-1]`, with exact
    /// zeros excluded from both sides.
    pub perc: f64,
    /// Two-sided Fisher-transform significance of `rho`.
    pub p_val: f64,
}

impl PredStats {
    pub fn empty() -> Self {
        Self {
            num_pred: 0,
            rho: f64::NAN,
            mae: f64::NAN,
            rmse: f64::NAN,
            perc: f64::NAN,
            p_val: f64::NAN,
        }
    }
}

/// Computes skill statistics over rows flagged eligible.
///
/// `eligible` is the requested-and-usable mask; rows with a missing
/// prediction or observation contribute nothing. The directional term
/// additionally needs the previous row's observation.
pub fn compute_stats(observed: &[f64], predicted: &[f64], eligible: &[bool]) -> PredStats {
    debug_assert_eq!(observed.len(), predicted.len());
    debug_assert_eq!(observed.len(), eligible.len());

    let mut num_pred = 0usize;
    let mut sum_obs = 0.0;
    let mut sum_pred = 0.0;
    let mut sum_sq_obs = 0.0;
    let mut sum_sq_pred = 0.0;
    let mut sum_prod = 0.0;
    let mut sum_abs_err = 0.0;
    let mut sum_sq_err = 0.0;
    let mut same_direction = 0usize;
    let mut direction_total = 0usize;

    for t in 0..observed.len() {
        if !eligible[t] {
            continue;
        }
        let obs = observed[t];
        let pred = predicted[t];
        if is_missing(obs) || is_missing(pred) {
            continue;
        }

        num_pred += 1;
        sum_obs += obs;
        sum_pred += pred;
        sum_sq_obs += obs * obs;
        sum_sq_pred += pred * pred;
        sum_prod += obs * pred;
        sum_abs_err += (pred - obs).abs();
        sum_sq_err += (pred - obs) * (pred - obs);

        if t > 0 && !is_missing(observed[t - 1]) {
            let pred_delta = pred - observed[t - 1];
            let obs_delta = obs - observed[t - 1];
            if pred_delta != 0.0 && obs_delta != 0.0 {
                direction_total += 1;
                if (pred_delta > 0.0) == (obs_delta > 0.0) {
                    same_direction += 1;
                }
            }
        }
    }

    if num_pred == 0 {
        return PredStats::empty();
    }

    let n = num_pred as f64;
    let obs_var = sum_sq_obs - sum_obs * sum_obs / n;
    let pred_var = sum_sq_pred - sum_pred * sum_pred / n;
    let covar = sum_prod - sum_obs * sum_pred / n;
    let rho = if obs_var > 0.0 && pred_var > 0.0 {
        covar / (obs_var * pred_var).sqrt()
    } else {
        f64::NAN
    };

    let perc = if direction_total > 0 {
        same_direction as f64 / direction_total as f64
    } else {
        f64::NAN
    };

    PredStats {
        num_pred,
        rho,
        mae: sum_abs_err / n,
        rmse: (sum_sq_err / n).sqrt(),
        perc,
        p_val: fisher_p_value(rho, num_pred),
    }
}

/// Two-sided p-value for a Pearson correlation via the Fisher z transform
/// against the standard normal. Undefined below four points.
pub fn fisher_p_value(rho: f64, num_pred: usize) -> f64 {
    if num_pred < 4 || !rho.is_finite() {
        return f64::NAN;
    }
    let r = rho.clamp(-0.999_999, 0.999_999);
    let z = r.atanh() * ((num_pred - 3) as f64).sqrt();
    erfc(z.abs() / std::f64::consts::SQRT_2)
}

/// Complementary error function, Abramowitz & Stegun 7.1.26 (|error| below
/// 1.5e-7, plenty for reported p-values).
fn erfc(x: f64) -> f64 {
    debug_assert!(x >= 0.0);
    let t = 1.0 / (1.0 + 0.327_591_1 * x);
    let poly = t
        * (0.254_829_592
            + t * (-0.284_496_736 + t * (1.421_413_741 + t * (-1.453_152_027 + t * 1.061_405_429))));
    poly * (-x * x).exp()
}
