// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod distance;
pub mod embed;
pub mod engine;
pub mod forecast;
pub mod neighbors;
pub mod params;
pub mod ranges;
pub mod solver;
pub mod stats;

pub use distance::DistanceCache;
pub use embed::TargetSet;
pub use engine::{CoefficientTable, ForecastEngine, ForecastOutput, PredictionTable};
pub use neighbors::NeighborFilter;
pub use params::{EmbeddingSpec, Method, Norm};
pub use ranges::RangeSet;
pub use stats::PredStats;

/// Forecasting engine namespace placeholder.
pub fn crate_name() -> &'static str {
    let _ = edm_core::crate_name();
    "edm-forecast"
}
