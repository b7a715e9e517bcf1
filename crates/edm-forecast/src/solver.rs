// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use edm_core::EdmError;

const JITTER_ATTEMPTS: usize = 6;

/// Solved local linear model for one prediction row.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearFit {
    /// `dim` slope coefficients followed by the intercept.
    pub coefficients: Vec<f64>,
    /// Weighted residual variance over the fitted neighbors.
    pub residual_variance: f64,
    /// `(dim+1) x (dim+1)` coefficient covariance, row-major.
    pub covariance: Vec<f64>,
}

/// Weighted least squares for the local (dim+1)-parameter regression.
///
/// Rows of the design are `w * [x_1 .. x_dim, 1]` against `w * y`, matching
/// the classic S-map formulation. The normal equations are solved by
/// Cholesky; a non-positive-definite system is retried with escalating
/// diagonal jitter, and `None` is returned once the ladder is exhausted so
/// the caller can record the row as missing instead of reporting an invalid
/// number.
pub fn weighted_least_squares(
    predictors: &[&[f64]],
    targets: &[f64],
    weights: &[f64],
    dim: usize,
) -> Result<Option<LinearFit>, EdmError> {
    let num_rows = predictors.len();
    if targets.len() != num_rows || weights.len() != num_rows {
        return Err(EdmError::numerical_issue(format!(
            "regression shape mismatch: {num_rows} predictor rows, {} targets, {} weights",
            targets.len(),
            weights.len()
        )));
    }
    let p = dim + 1;
    if num_rows == 0 {
        return Ok(None);
    }

    // Normal equations on the weighted design: ata = A^T A, atb = A^T b.
    let mut ata = vec![0.0; p * p];
    let mut atb = vec![0.0; p];
    let mut design_row = vec![0.0; p];
    for row in 0..num_rows {
        let w = weights[row];
        for (j, slot) in design_row.iter_mut().take(dim).enumerate() {
            *slot = w * predictors[row][j];
        }
        design_row[dim] = w;
        let b = w * targets[row];
        for i in 0..p {
            for j in 0..=i {
                ata[i * p + j] += design_row[i] * design_row[j];
            }
            atb[i] += design_row[i] * b;
        }
    }
    for i in 0..p {
        for j in i + 1..p {
            ata[i * p + j] = ata[j * p + i];
        }
    }

    // A vanishing or non-finite diagonal cannot be rescued by jitter without
    // inventing coefficients out of nothing.
    let trace: f64 = (0..p).map(|i| ata[i * p + i]).sum();
    if !trace.is_finite() || trace <= 0.0 {
        return Ok(None);
    }
    let base_jitter = (trace / p as f64 * 1.0e-8).max(1.0e-12);

    let mut jitter = 0.0;
    for _attempt in 0..JITTER_ATTEMPTS {
        let mut factor = ata.clone();
        if jitter > 0.0 {
            for i in 0..p {
                factor[i * p + i] += jitter;
            }
        }
        if cholesky_in_place(&mut factor, p).is_ok() {
            let coefficients = solve_from_cholesky(&factor, &atb, p);
            let inverse = invert_from_cholesky(&factor, p);
            return Ok(Some(finish_fit(
                coefficients,
                inverse,
                predictors,
                targets,
                weights,
                dim,
            )));
        }
        jitter = if jitter == 0.0 {
            base_jitter
        } else {
            jitter * 10.0
        };
    }

    Ok(None)
}

fn finish_fit(
    coefficients: Vec<f64>,
    ata_inverse: Vec<f64>,
    predictors: &[&[f64]],
    targets: &[f64],
    weights: &[f64],
    dim: usize,
) -> LinearFit {
    let p = dim + 1;
    let num_rows = predictors.len();

    let mut weight_sum = 0.0;
    let mut weighted_sq_residuals = 0.0;
    let mut scaled_sq_residuals = 0.0;
    for row in 0..num_rows {
        let fitted = predict_with(&coefficients, predictors[row], dim);
        let residual = targets[row] - fitted;
        let w = weights[row];
        weight_sum += w;
        weighted_sq_residuals += w * residual * residual;
        scaled_sq_residuals += (w * residual) * (w * residual);
    }

    let residual_variance = if weight_sum > 0.0 {
        weighted_sq_residuals / weight_sum
    } else {
        f64::NAN
    };

    // Covariance from the scaled design: s^2 (A^T A)^-1 with s^2 estimated
    // on the scaled residuals and num_rows - p degrees of freedom.
    let sigma_sq = if num_rows > p {
        scaled_sq_residuals / (num_rows - p) as f64
    } else {
        f64::NAN
    };
    let covariance = ata_inverse.iter().map(|v| v * sigma_sq).collect();

    LinearFit {
        coefficients,
        residual_variance,
        covariance,
    }
}

/// Evaluates the fitted local model at an embedding vector.
pub fn predict_with(coefficients: &[f64], vector: &[f64], dim: usize) -> f64 {
    let mut out = coefficients[dim];
    for j in 0..dim {
        out += coefficients[j] * vector[j];
    }
    out
}

/// In-place lower Cholesky factorization; fails when the matrix is not
/// positive definite.
pub(crate) fn cholesky_in_place(matrix: &mut [f64], n: usize) -> Result<(), EdmError> {
    for i in 0..n {
        for j in 0..=i {
            let mut sum = matrix[i * n + j];
            for k in 0..j {
                sum -= matrix[i * n + k] * matrix[j * n + k];
            }

            if i == j {
                if !sum.is_finite() || sum <= 0.0 {
                    return Err(EdmError::numerical_issue(
                        "normal equations are not positive definite",
                    ));
                }
                matrix[i * n + i] = sum.sqrt();
            } else {
                matrix[i * n + j] = sum / matrix[j * n + j];
            }
        }

        for j in i + 1..n {
            matrix[i * n + j] = 0.0;
        }
    }
    Ok(())
}

/// Solves `L L^T x = b` given the lower factor.
fn solve_from_cholesky(factor: &[f64], b: &[f64], n: usize) -> Vec<f64> {
    let mut z = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= factor[i * n + k] * z[k];
        }
        z[i] = sum / factor[i * n + i];
    }

    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = z[i];
        for k in i + 1..n {
            sum -= factor[k * n + i] * x[k];
        }
        x[i] = sum / factor[i * n + i];
    }
    x
}

/// Inverts `L L^T` column by column from the lower factor.
fn invert_from_cholesky(factor: &[f64], n: usize) -> Vec<f64> {
    let mut inverse = vec![0.0; n * n];
    let mut unit = vec![0.0; n];
    for col in 0..n {
        unit.iter_mut().for_each(|v| *v = 0.0);
        unit[col] = 1.0;
        let column = solve_from_cholesky(factor, &unit, n);
        for row in 0..n {
            inverse[row * n + col] = column[row];
        }
    }
    inverse
}
