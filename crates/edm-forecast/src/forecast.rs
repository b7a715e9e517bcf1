// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::neighbors::Neighbor;
use crate::solver::{predict_with, weighted_least_squares, LinearFit};
use edm_core::{EdmError, MISSING};

/// Floor applied to exponential weights so far-away neighbors never
/// vanish from the ensemble entirely.
const MIN_WEIGHT: f64 = 1.0e-6;

/// Prediction and spread for one row.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RowForecast {
    pub predicted: f64,
    pub variance: f64,
}

impl RowForecast {
    pub fn missing() -> Self {
        Self {
            predicted: MISSING,
            variance: MISSING,
        }
    }
}

/// S-map output for one row: forecast plus the local linear model.
#[derive(Clone, Debug, PartialEq)]
pub struct SmapRowForecast {
    pub forecast: RowForecast,
    /// E slopes followed by the intercept.
    pub coefficients: Vec<f64>,
    /// `(E+1) x (E+1)` coefficient covariance, row-major.
    pub covariance: Vec<f64>,
}

/// Exponential distance-decay weights, `exp(-theta * d / d_mean)` with
/// `d_mean` the mean distance over the selected set. `theta = 0` or a
/// degenerate all-zero neighborhood gives uniform weights.
pub fn neighbor_weights(neighbors: &[Neighbor], theta: f64) -> Vec<f64> {
    if neighbors.is_empty() {
        return vec![];
    }
    if theta == 0.0 {
        return vec![1.0; neighbors.len()];
    }
    let mean: f64 =
        neighbors.iter().map(|n| n.distance).sum::<f64>() / neighbors.len() as f64;
    if !(mean > 0.0) {
        return vec![1.0; neighbors.len()];
    }
    neighbors
        .iter()
        .map(|n| (-theta * n.distance / mean).exp().max(MIN_WEIGHT))
        .collect()
}

/// Simplex projection: weighted average of the neighbors' targets, with the
/// weighted variance of the same set as the spread. Zero usable neighbors
/// yields a missing forecast; missing neighbor targets propagate.
pub fn simplex_forecast(neighbors: &[Neighbor], targets: &[f64], theta: f64) -> RowForecast {
    if neighbors.is_empty() {
        return RowForecast::missing();
    }

    let weights = neighbor_weights(neighbors, theta);
    let weight_sum: f64 = weights.iter().sum();

    let mut predicted = 0.0;
    for (neighbor, &w) in neighbors.iter().zip(weights.iter()) {
        predicted += w * targets[neighbor.row];
    }
    predicted /= weight_sum;

    let mut variance = 0.0;
    for (neighbor, &w) in neighbors.iter().zip(weights.iter()) {
        let delta = targets[neighbor.row] - predicted;
        variance += w * delta * delta;
    }
    variance /= weight_sum;

    RowForecast {
        predicted,
        variance,
    }
}

/// S-map: locally weighted linear regression of neighbor targets on their
/// embedding vectors, evaluated at the prediction vector.
///
/// Returns `Ok(None)` when the local system stays singular after the jitter
/// ladder; the caller records the row as missing and warns once per run.
pub fn smap_forecast(
    pred_vector: &[f64],
    neighbors: &[Neighbor],
    vectors: &[Vec<f64>],
    targets: &[f64],
    theta: f64,
    dim: usize,
) -> Result<Option<SmapRowForecast>, EdmError> {
    let weights = neighbor_weights(neighbors, theta);
    fit_local_model(pred_vector, neighbors, vectors, targets, &weights, dim)
}

/// Reduced-cost unweighted linear fit over the filtered library; shares the
/// S-map degenerate-case policy.
pub fn fast_linear_forecast(
    pred_vector: &[f64],
    neighbors: &[Neighbor],
    vectors: &[Vec<f64>],
    targets: &[f64],
    dim: usize,
) -> Result<Option<SmapRowForecast>, EdmError> {
    let weights = vec![1.0; neighbors.len()];
    fit_local_model(pred_vector, neighbors, vectors, targets, &weights, dim)
}

fn fit_local_model(
    pred_vector: &[f64],
    neighbors: &[Neighbor],
    vectors: &[Vec<f64>],
    targets: &[f64],
    weights: &[f64],
    dim: usize,
) -> Result<Option<SmapRowForecast>, EdmError> {
    let predictors: Vec<&[f64]> = neighbors
        .iter()
        .map(|n| vectors[n.row].as_slice())
        .collect();
    let neighbor_targets: Vec<f64> = neighbors.iter().map(|n| targets[n.row]).collect();

    let Some(LinearFit {
        coefficients,
        residual_variance,
        covariance,
    }) = weighted_least_squares(&predictors, &neighbor_targets, weights, dim)?
    else {
        return Ok(None);
    };

    let predicted = predict_with(&coefficients, pred_vector, dim);
    Ok(Some(SmapRowForecast {
        forecast: RowForecast {
            predicted,
            variance: residual_variance,
        },
        coefficients,
        covariance,
    }))
}

#[cfg(test)]
mod tests {
    use super::{
        fast_linear_forecast, neighbor_weights, simplex_forecast, smap_forecast, RowForecast,
    };
    use crate::neighbors::Neighbor;
    use edm_core::{is_missing, MISSING};

    fn neighbors_at(pairs: &[(usize, f64)]) -> Vec<Neighbor> {
        pairs
            .iter()
            .map(|&(row, distance)| Neighbor { row, distance })
            .collect()
    }

    #[test]
    fn theta_zero_gives_uniform_weights() {
        let neighbors = neighbors_at(&[(0, 1.0), (1, 2.0), (2, 4.0)]);
        assert_eq!(neighbor_weights(&neighbors, 0.0), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn weights_decay_with_distance_relative_to_the_mean() {
        let neighbors = neighbors_at(&[(0, 1.0), (1, 2.0), (2, 3.0)]);
        let weights = neighbor_weights(&neighbors, 1.0);
        // d_mean = 2, so the middle neighbor sits at exp(-1).
        assert!((weights[1] - (-1.0_f64).exp()).abs() < 1e-12);
        assert!(weights[0] > weights[1] && weights[1] > weights[2]);
    }

    #[test]
    fn all_zero_distances_fall_back_to_uniform() {
        let neighbors = neighbors_at(&[(0, 0.0), (1, 0.0)]);
        assert_eq!(neighbor_weights(&neighbors, 3.0), vec![1.0, 1.0]);
    }

    #[test]
    fn simplex_with_uniform_weights_is_the_plain_average() {
        let neighbors = neighbors_at(&[(0, 1.0), (1, 2.0), (2, 3.0)]);
        let targets = vec![3.0, 6.0, 9.0, 100.0];
        let out = simplex_forecast(&neighbors, &targets, 0.0);
        assert!((out.predicted - 6.0).abs() < 1e-12);
        assert!((out.variance - 6.0).abs() < 1e-12);
    }

    #[test]
    fn simplex_weighting_pulls_toward_near_neighbors() {
        let neighbors = neighbors_at(&[(0, 0.1), (1, 5.0)]);
        let targets = vec![1.0, 10.0];
        let weighted = simplex_forecast(&neighbors, &targets, 2.0);
        let uniform = simplex_forecast(&neighbors, &targets, 0.0);
        assert!(weighted.predicted < uniform.predicted);
    }

    #[test]
    fn simplex_with_no_neighbors_is_missing() {
        let out = simplex_forecast(&[], &[1.0], 1.0);
        assert!(is_missing(out.predicted));
        assert!(is_missing(out.variance));
    }

    #[test]
    fn simplex_propagates_missing_neighbor_targets() {
        let neighbors = neighbors_at(&[(0, 1.0), (1, 1.0)]);
        let targets = vec![1.0, MISSING];
        let out = simplex_forecast(&neighbors, &targets, 0.0);
        assert!(is_missing(out.predicted));
    }

    #[test]
    fn smap_theta_zero_is_ordinary_least_squares() {
        // Targets linear in the single embedding coordinate: y = 2x - 1.
        let vectors: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..6).map(|i| 2.0 * i as f64 - 1.0).collect();
        let neighbors = neighbors_at(&[(0, 3.0), (1, 2.0), (2, 1.0), (3, 1.0), (4, 2.0)]);

        let out = smap_forecast(&[10.0], &neighbors, &vectors, &targets, 0.0, 1)
            .expect("solve should not error")
            .expect("system is well posed");
        assert!((out.forecast.predicted - 19.0).abs() < 1e-9);
        assert!((out.coefficients[0] - 2.0).abs() < 1e-9);
        assert!((out.coefficients[1] + 1.0).abs() < 1e-9);
    }

    #[test]
    fn smap_returns_none_for_unrescuable_systems() {
        let vectors = vec![vec![0.0], vec![0.0]];
        let targets = vec![1.0, 2.0];
        let neighbors = neighbors_at(&[]);
        let out = smap_forecast(&[1.0], &neighbors, &vectors, &targets, 0.5, 1)
            .expect("solve should not error");
        assert!(out.is_none());
    }

    #[test]
    fn fast_linear_matches_unweighted_smap() {
        let vectors: Vec<Vec<f64>> = (0..5).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..5).map(|i| 0.5 * i as f64 + 2.0).collect();
        let neighbors = neighbors_at(&[(0, 9.0), (1, 1.0), (2, 4.0), (3, 2.0)]);

        let fast = fast_linear_forecast(&[3.0], &neighbors, &vectors, &targets, 1)
            .expect("solve should not error")
            .expect("system is well posed");
        let smap = smap_forecast(&[3.0], &neighbors, &vectors, &targets, 0.0, 1)
            .expect("solve should not error")
            .expect("system is well posed");
        assert_eq!(fast, smap);
    }

    #[test]
    fn missing_forecast_constructor_is_nan() {
        let missing = RowForecast::missing();
        assert!(is_missing(missing.predicted));
        assert!(is_missing(missing.variance));
    }
}
