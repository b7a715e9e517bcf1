// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use edm_core::EdmError;
use edm_forecast::{Method, Norm};

/// Cross-map run configuration.
///
/// One configuration drives many forecasts: for each requested library size
/// the sampler draws libraries and reruns the shared engine, so everything
/// here except `lib_sizes`, the sampling switches, and `seed` maps directly
/// onto a single-forecast parameter.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CrossMapConfig {
    pub method: Method,
    /// Embedding dimension for the lagged library column.
    pub e: usize,
    /// Lag step between embedding coordinates.
    pub tau: usize,
    /// Signed prediction horizon.
    pub tp: i64,
    /// `<= 0` selects the mode default.
    pub num_neighbors: i64,
    pub theta: f64,
    /// Library sizes to sweep; sorted and deduplicated before use.
    pub lib_sizes: Vec<usize>,
    /// Draw random libraries instead of sliding contiguous segments.
    pub random_libs: bool,
    /// Sample library rows with replacement (random libraries only).
    pub replace: bool,
    /// Draws per library size when sampling randomly.
    pub num_samples: usize,
    pub seed: u64,
    pub exclusion_radius: f64,
    pub epsilon: f64,
    pub norm: Norm,
    /// Keep the per-run prediction tables alongside the skill summaries.
    pub save_predictions: bool,
    pub suppress_warnings: bool,
}

impl Default for CrossMapConfig {
    fn default() -> Self {
        Self {
            method: Method::Simplex,
            e: 1,
            tau: 1,
            tp: 0,
            num_neighbors: 0,
            theta: 0.0,
            lib_sizes: vec![],
            random_libs: true,
            replace: false,
            num_samples: 100,
            seed: 0,
            exclusion_radius: -1.0,
            epsilon: -1.0,
            norm: Norm::L2,
            save_predictions: false,
            suppress_warnings: false,
        }
    }
}

impl CrossMapConfig {
    pub fn validate(&self) -> Result<(), EdmError> {
        if self.e == 0 {
            return Err(EdmError::invalid_input(
                "embedding dimension must be at least 1",
            ));
        }
        if self.tau == 0 {
            return Err(EdmError::invalid_input("tau must be at least 1"));
        }
        if self.lib_sizes.is_empty() {
            return Err(EdmError::invalid_input("no library sizes requested"));
        }
        if self.lib_sizes.contains(&0) {
            return Err(EdmError::invalid_input("library sizes must be at least 1"));
        }
        if self.random_libs && self.num_samples == 0 {
            return Err(EdmError::invalid_input(
                "random library sampling requires at least one sample per size",
            ));
        }
        Ok(())
    }

    /// The sweep order: ascending, duplicates removed.
    pub fn normalized_lib_sizes(&self) -> Vec<usize> {
        let mut sizes = self.lib_sizes.clone();
        sizes.sort_unstable();
        sizes.dedup();
        sizes
    }
}
