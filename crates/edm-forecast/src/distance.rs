// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::params::Norm;
use edm_core::is_missing;

/// Distance between two embedding vectors under `norm`.
///
/// A missing coordinate in either vector makes the whole distance missing;
/// partial sums are never zero-filled.
pub fn vector_distance(a: &[f64], b: &[f64], norm: Norm) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let mut sum = 0.0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        if is_missing(x) || is_missing(y) {
            return f64::NAN;
        }
        let delta = (x - y).abs();
        sum += match norm {
            Norm::L1 => delta,
            Norm::L2 => delta * delta,
            Norm::P(p) => delta.powf(p),
        };
    }
    match norm {
        Norm::L1 => sum,
        Norm::L2 => sum.sqrt(),
        Norm::P(p) => sum.powf(1.0 / p),
    }
}

/// Lazily filled pairwise-distance matrix.
///
/// NaN doubles as both "not computed" and "missing": entries for pairs with
/// incomplete vectors stay NaN and are recomputed on demand, which is
/// idempotent. The whole cache is invalidated when the vector set or the
/// norm changes.
#[derive(Clone, Debug)]
pub struct DistanceCache {
    num_rows: usize,
    matrix: Vec<f64>,
}

impl DistanceCache {
    pub fn new(num_rows: usize) -> Self {
        Self {
            num_rows,
            matrix: vec![f64::NAN; num_rows * num_rows],
        }
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Drops every cached entry, resizing to a new row count.
    pub fn invalidate(&mut self, num_rows: usize) {
        self.num_rows = num_rows;
        self.matrix.clear();
        self.matrix.resize(num_rows * num_rows, f64::NAN);
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.matrix[i * self.num_rows + j]
    }

    /// Fills any uncomputed entries for the given prediction and library
    /// rows. Distances are symmetric, so both triangles are written.
    pub fn ensure(
        &mut self,
        vectors: &[Vec<f64>],
        norm: Norm,
        pred_rows: &[usize],
        lib_rows: &[usize],
    ) {
        for &i in pred_rows {
            for &j in lib_rows {
                if self.get(i, j).is_nan() {
                    let d = vector_distance(&vectors[i], &vectors[j], norm);
                    self.matrix[i * self.num_rows + j] = d;
                    self.matrix[j * self.num_rows + i] = d;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{vector_distance, DistanceCache};
    use crate::params::Norm;
    use edm_core::MISSING;

    #[test]
    fn l1_sums_absolute_differences() {
        let d = vector_distance(&[1.0, 2.0], &[4.0, 0.0], Norm::L1);
        assert_eq!(d, 5.0);
    }

    #[test]
    fn l2_is_euclidean() {
        let d = vector_distance(&[0.0, 0.0], &[3.0, 4.0], Norm::L2);
        assert!((d - 5.0).abs() < 1e-12);
    }

    #[test]
    fn p_norm_matches_closed_form() {
        let d = vector_distance(&[0.0], &[8.0], Norm::P(3.0));
        assert!((d - 8.0).abs() < 1e-12);

        let d = vector_distance(&[0.0, 0.0], &[1.0, 1.0], Norm::P(3.0));
        assert!((d - 2.0_f64.powf(1.0 / 3.0)).abs() < 1e-12);
    }

    #[test]
    fn missing_coordinate_poisons_the_distance() {
        let d = vector_distance(&[1.0, MISSING], &[1.0, 1.0], Norm::L2);
        assert!(d.is_nan());
        let d = vector_distance(&[1.0, 1.0], &[MISSING, 1.0], Norm::L1);
        assert!(d.is_nan());
    }

    #[test]
    fn cache_fills_symmetric_entries_on_demand() {
        let vectors = vec![vec![0.0], vec![3.0], vec![7.0]];
        let mut cache = DistanceCache::new(3);
        assert!(cache.get(0, 1).is_nan());

        cache.ensure(&vectors, Norm::L2, &[0], &[1, 2]);
        assert_eq!(cache.get(0, 1), 3.0);
        assert_eq!(cache.get(1, 0), 3.0);
        assert_eq!(cache.get(0, 2), 7.0);
        // Pair (1, 2) was not requested.
        assert!(cache.get(1, 2).is_nan());
    }

    #[test]
    fn invalidate_clears_all_entries() {
        let vectors = vec![vec![0.0], vec![1.0]];
        let mut cache = DistanceCache::new(2);
        cache.ensure(&vectors, Norm::L2, &[0], &[1]);
        assert_eq!(cache.get(0, 1), 1.0);

        cache.invalidate(2);
        assert!(cache.get(0, 1).is_nan());
    }
}
