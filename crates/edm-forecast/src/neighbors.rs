// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::distance::DistanceCache;

/// Candidate filtering applied before ranking.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NeighborFilter {
    /// Temporal exclusion window; negative disables cross-validation
    /// exclusion, `>= 0` removes library rows within that index distance of
    /// the prediction row (0 removes exactly the row itself).
    pub exclusion_radius: f64,
    /// Distance cutoff; `<= 0` disables, `> 0` removes candidates farther
    /// than this regardless of rank.
    pub epsilon: f64,
}

impl Default for NeighborFilter {
    fn default() -> Self {
        Self {
            exclusion_radius: -1.0,
            epsilon: -1.0,
        }
    }
}

impl NeighborFilter {
    pub fn cross_validation_enabled(&self) -> bool {
        self.exclusion_radius >= 0.0
    }
}

/// A library row admitted as a forecast neighbor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbor {
    pub row: usize,
    pub distance: f64,
}

/// Filters and ranks library rows for one prediction row.
///
/// Candidates with missing distances are dropped; survivors are ordered by
/// ascending distance, ties broken by ascending row index.
pub fn ranked_neighbors(
    pred_row: usize,
    lib_rows: &[usize],
    distances: &DistanceCache,
    filter: &NeighborFilter,
) -> Vec<Neighbor> {
    let mut out = Vec::with_capacity(lib_rows.len());
    for &row in lib_rows {
        if filter.cross_validation_enabled() {
            let gap = pred_row.abs_diff(row) as f64;
            if gap <= filter.exclusion_radius {
                continue;
            }
        }
        let distance = distances.get(pred_row, row);
        if distance.is_nan() {
            continue;
        }
        if filter.epsilon > 0.0 && distance > filter.epsilon {
            continue;
        }
        out.push(Neighbor { row, distance });
    }
    out.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.row.cmp(&b.row))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::{ranked_neighbors, NeighborFilter};
    use crate::distance::DistanceCache;
    use crate::params::Norm;

    fn cache_for(vectors: &[Vec<f64>], pred: usize, lib: &[usize]) -> DistanceCache {
        let mut cache = DistanceCache::new(vectors.len());
        cache.ensure(vectors, Norm::L2, &[pred], lib);
        cache
    }

    #[test]
    fn neighbors_sort_by_distance_then_row() {
        let vectors = vec![vec![0.0], vec![2.0], vec![1.0], vec![2.0]];
        let lib = [1, 2, 3];
        let cache = cache_for(&vectors, 0, &lib);

        let ranked = ranked_neighbors(0, &lib, &cache, &NeighborFilter::default());
        let rows: Vec<usize> = ranked.iter().map(|n| n.row).collect();
        // Rows 1 and 3 tie at distance 2; ascending row index breaks the tie.
        assert_eq!(rows, vec![2, 1, 3]);
    }

    #[test]
    fn exclusion_radius_removes_exactly_the_window() {
        let vectors: Vec<Vec<f64>> = (0..8).map(|i| vec![i as f64]).collect();
        let lib: Vec<usize> = (0..8).collect();
        let cache = cache_for(&vectors, 4, &lib);

        let filter = NeighborFilter {
            exclusion_radius: 1.0,
            epsilon: -1.0,
        };
        let ranked = ranked_neighbors(4, &lib, &cache, &filter);
        let rows: Vec<usize> = ranked.iter().map(|n| n.row).collect();
        assert!(!rows.contains(&3) && !rows.contains(&4) && !rows.contains(&5));
        assert!(rows.contains(&2) && rows.contains(&6));
    }

    #[test]
    fn radius_zero_removes_only_the_prediction_row() {
        let vectors: Vec<Vec<f64>> = (0..4).map(|i| vec![i as f64]).collect();
        let lib: Vec<usize> = (0..4).collect();
        let cache = cache_for(&vectors, 2, &lib);

        let filter = NeighborFilter {
            exclusion_radius: 0.0,
            epsilon: -1.0,
        };
        let rows: Vec<usize> = ranked_neighbors(2, &lib, &cache, &filter)
            .iter()
            .map(|n| n.row)
            .collect();
        assert_eq!(rows, vec![1, 3, 0]);
    }

    #[test]
    fn negative_radius_keeps_the_self_match() {
        let vectors: Vec<Vec<f64>> = (0..3).map(|i| vec![i as f64]).collect();
        let lib: Vec<usize> = (0..3).collect();
        let cache = cache_for(&vectors, 1, &lib);

        let ranked = ranked_neighbors(1, &lib, &cache, &NeighborFilter::default());
        assert_eq!(ranked[0].row, 1);
        assert_eq!(ranked[0].distance, 0.0);
    }

    #[test]
    fn epsilon_cuts_far_candidates_regardless_of_rank() {
        let vectors = vec![vec![0.0], vec![1.0], vec![5.0]];
        let lib = [1, 2];
        let cache = cache_for(&vectors, 0, &lib);

        let filter = NeighborFilter {
            exclusion_radius: -1.0,
            epsilon: 2.0,
        };
        let rows: Vec<usize> = ranked_neighbors(0, &lib, &cache, &filter)
            .iter()
            .map(|n| n.row)
            .collect();
        assert_eq!(rows, vec![1]);
    }

    #[test]
    fn missing_distances_are_dropped() {
        let vectors = vec![vec![0.0], vec![f64::NAN], vec![2.0]];
        let lib = [1, 2];
        let mut cache = DistanceCache::new(3);
        cache.ensure(&vectors, Norm::L2, &[0], &lib);

        let rows: Vec<usize> = ranked_neighbors(0, &lib, &cache, &NeighborFilter::default())
            .iter()
            .map(|n| n.row)
            .collect();
        assert_eq!(rows, vec![2]);
    }
}
