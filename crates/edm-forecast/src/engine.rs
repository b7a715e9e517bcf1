// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::distance::DistanceCache;
use crate::embed::{make_targets, make_vectors, TargetSet};
use crate::forecast::{fast_linear_forecast, simplex_forecast, smap_forecast, RowForecast};
use crate::neighbors::{ranked_neighbors, NeighborFilter};
use crate::params::{EmbeddingSpec, Method, Norm};
use crate::ranges::{rows_where, RangeSet};
use crate::stats::{compute_stats, PredStats};
use edm_core::{Block, Diagnostics, EdmError, Warning, MISSING};

/// Row-aligned prediction output over the requested rows.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PredictionTable {
    pub time: Vec<f64>,
    pub observed: Vec<f64>,
    pub predicted: Vec<f64>,
    pub variance: Vec<f64>,
}

/// Per-row S-map coefficients: one column per embedding dimension plus a
/// trailing intercept column.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CoefficientTable {
    pub names: Vec<String>,
    /// One row per requested prediction row; missing rows hold NaN.
    pub rows: Vec<Vec<f64>>,
}

/// Everything one engine run produces.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ForecastOutput {
    pub predictions: PredictionTable,
    pub stats: PredStats,
    /// Same statistics for the unshifted target used as a naive constant
    /// predictor, benchmarking skill above trivial prediction.
    pub const_stats: PredStats,
    /// Present for S-map runs with coefficient saving enabled.
    pub coefficients: Option<CoefficientTable>,
    /// Row-major `(E+1) x (E+1)` covariance per requested row; `None` where
    /// the local fit was missing.
    pub coefficient_covariances: Option<Vec<Option<Vec<f64>>>>,
    pub diagnostics: Diagnostics,
}

/// Tracks which input revision a derived artifact was built from.
#[derive(Clone, Debug)]
struct Artifact<T> {
    value: Option<T>,
    built_at: u64,
}

impl<T> Artifact<T> {
    fn empty() -> Self {
        Self {
            value: None,
            built_at: 0,
        }
    }

    fn is_stale(&self, dependencies: &[u64]) -> bool {
        self.value.is_none() || dependencies.iter().any(|&changed| changed > self.built_at)
    }
}

/// Last-changed revision per engine input.
#[derive(Clone, Copy, Debug, Default)]
struct InputRevisions {
    block: u64,
    embedding: u64,
    target: u64,
    ranges: u64,
    norm: u64,
}

#[derive(Clone, Debug)]
struct Masks {
    lib_rows: Vec<usize>,
    pred_rows: Vec<usize>,
    usable_pred: Vec<bool>,
    requested_pred: Vec<bool>,
}

/// The shared forecasting core: configure with setters, then [`run`].
///
/// Incremental recomputation is a versioned dependency graph rather than
/// scattered dirty flags: every setter bumps a global revision and records
/// it against the inputs it touches; each derived artifact remembers the
/// revision it was built at and is rebuilt exactly when some dependency
/// changed later. Dependencies: vectors need (block, embedding); targets
/// need (block, target column, tp); masks need (ranges, embedding, target);
/// distances need (vectors, norm).
///
/// [`run`]: ForecastEngine::run
#[derive(Clone, Debug)]
pub struct ForecastEngine {
    block: Option<Block>,
    method: Method,
    norm: Norm,
    embedding: Option<EmbeddingSpec>,
    target_column: Option<usize>,
    tp: i64,
    num_neighbors: i64,
    theta: f64,
    filter: NeighborFilter,
    lib_ranges: Option<RangeSet>,
    pred_ranges: Option<RangeSet>,
    save_coefficients: bool,
    suppress_warnings: bool,
    lib_override: Option<Vec<usize>>,

    revision: u64,
    changed: InputRevisions,
    vectors: Artifact<Vec<Vec<f64>>>,
    targets: Artifact<TargetSet>,
    masks: Artifact<Masks>,
    distances: DistanceCache,
    distances_built_at: u64,
}

impl Default for ForecastEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ForecastEngine {
    pub fn new() -> Self {
        Self {
            block: None,
            method: Method::default(),
            norm: Norm::default(),
            embedding: None,
            target_column: None,
            tp: 0,
            num_neighbors: 0,
            theta: 0.0,
            filter: NeighborFilter::default(),
            lib_ranges: None,
            pred_ranges: None,
            save_coefficients: false,
            suppress_warnings: false,
            lib_override: None,
            revision: 0,
            changed: InputRevisions::default(),
            vectors: Artifact::empty(),
            targets: Artifact::empty(),
            masks: Artifact::empty(),
            distances: DistanceCache::new(0),
            distances_built_at: 0,
        }
    }

    fn bump(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    pub fn set_block(&mut self, block: Block) {
        let revision = self.bump();
        self.changed.block = revision;
        self.block = Some(block);
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    pub fn set_norm(&mut self, norm: Norm) {
        let revision = self.bump();
        self.changed.norm = revision;
        self.norm = norm;
    }

    pub fn set_embedding(&mut self, spec: EmbeddingSpec) {
        let revision = self.bump();
        self.changed.embedding = revision;
        self.embedding = Some(spec);
    }

    /// 1-based target column.
    pub fn set_target_column(&mut self, column: usize) {
        let revision = self.bump();
        self.changed.target = revision;
        self.target_column = Some(column);
    }

    /// Signed prediction horizon.
    pub fn set_tp(&mut self, tp: i64) {
        if self.tp != tp {
            let revision = self.bump();
            self.changed.target = revision;
            self.changed.ranges = revision;
        }
        self.tp = tp;
    }

    /// Neighbor count; `<= 0` selects the mode default (`E+1` for simplex,
    /// the whole usable library for S-map and fast linear).
    pub fn set_num_neighbors(&mut self, num_neighbors: i64) {
        self.num_neighbors = num_neighbors;
    }

    pub fn set_theta(&mut self, theta: f64) {
        self.theta = theta;
    }

    /// Negative disables cross-validation exclusion; `>= 0` removes library
    /// rows within that index distance of each prediction row.
    pub fn set_exclusion_radius(&mut self, radius: f64) {
        self.filter.exclusion_radius = radius;
    }

    /// `<= 0` disables the distance cutoff.
    pub fn set_epsilon(&mut self, epsilon: f64) {
        self.filter.epsilon = epsilon;
    }

    pub fn set_lib(&mut self, ranges: RangeSet) {
        let revision = self.bump();
        self.changed.ranges = revision;
        self.lib_ranges = Some(ranges);
    }

    pub fn set_pred(&mut self, ranges: RangeSet) {
        let revision = self.bump();
        self.changed.ranges = revision;
        self.pred_ranges = Some(ranges);
    }

    pub fn set_save_coefficients(&mut self, save: bool) {
        self.save_coefficients = save;
    }

    pub fn set_suppress_warnings(&mut self, suppress: bool) {
        self.suppress_warnings = suppress;
    }

    /// Overrides the usable library with an explicit row subset, as the
    /// cross-map resampler does between runs. `None` restores range-derived
    /// behavior. Rows may repeat (sampling with replacement).
    pub fn set_library_rows(&mut self, rows: Option<Vec<usize>>) {
        self.lib_override = rows;
    }

    /// Resolves staleness and returns the range-derived usable library rows
    /// without forecasting. The resampler uses this as its sampling frame.
    pub fn usable_library_rows(&mut self) -> Result<Vec<usize>, EdmError> {
        self.validate()?;
        self.prepare()?;
        Ok(ready(&self.masks, "masks")?.lib_rows.clone())
    }

    /// Validates configuration, resolves stale artifacts in dependency
    /// order, forecasts every usable prediction row, and summarizes skill.
    pub fn run(&mut self) -> Result<ForecastOutput, EdmError> {
        self.validate()?;
        self.prepare()?;
        self.forecast()
    }

    /// Fatal configuration checks; nothing is computed when any fails.
    fn validate(&self) -> Result<(), EdmError> {
        let block = self
            .block
            .as_ref()
            .ok_or_else(|| EdmError::invalid_input("no block has been set"))?;
        let embedding = self
            .embedding
            .as_ref()
            .ok_or_else(|| EdmError::invalid_input("no embedding has been set"))?;
        embedding.validate(block)?;

        let target = self
            .target_column
            .ok_or_else(|| EdmError::invalid_input("no target column has been set"))?;
        block.column(target)?;

        if self.tp.unsigned_abs() > block.num_rows() as u64 {
            return Err(EdmError::invalid_input(format!(
                "prediction horizon {} reaches outside the {}-row block",
                self.tp,
                block.num_rows()
            )));
        }

        if self.lib_ranges.is_none() {
            return Err(EdmError::invalid_input("no library ranges have been set"));
        }
        if self.pred_ranges.is_none() {
            return Err(EdmError::invalid_input("no prediction ranges have been set"));
        }

        if !self.theta.is_finite() || self.theta < 0.0 {
            return Err(EdmError::invalid_input(format!(
                "theta must be finite and >= 0; got {}",
                self.theta
            )));
        }
        if self.filter.exclusion_radius.is_nan() {
            return Err(EdmError::invalid_input("exclusion radius must not be NaN"));
        }
        if self.filter.epsilon.is_nan() {
            return Err(EdmError::invalid_input("epsilon must not be NaN"));
        }

        if let Some(rows) = &self.lib_override {
            let num_rows = block.num_rows();
            if let Some(&bad) = rows.iter().find(|&&row| row >= num_rows) {
                return Err(EdmError::invalid_input(format!(
                    "library override row {bad} is outside the block (num_rows={num_rows})"
                )));
            }
        }

        Ok(())
    }

    /// Rebuilds exactly the artifacts whose dependencies changed since they
    /// were last built.
    fn prepare(&mut self) -> Result<(), EdmError> {
        let revision = self.revision;
        let block = self
            .block
            .as_ref()
            .ok_or_else(|| EdmError::invalid_input("no block has been set"))?;

        if self
            .vectors
            .is_stale(&[self.changed.block, self.changed.embedding])
        {
            let spec = self
                .embedding
                .as_ref()
                .ok_or_else(|| EdmError::invalid_input("no embedding has been set"))?;
            self.vectors.value = Some(make_vectors(block, spec)?);
            self.vectors.built_at = revision;
        }

        if self
            .targets
            .is_stale(&[self.changed.block, self.changed.target])
        {
            let target = self
                .target_column
                .ok_or_else(|| EdmError::invalid_input("no target column has been set"))?;
            self.targets.value = Some(make_targets(block, target, self.tp)?);
            self.targets.built_at = revision;
        }

        if self.masks.is_stale(&[
            self.changed.ranges,
            self.changed.embedding,
            self.changed.target,
        ]) {
            let span = self
                .embedding
                .as_ref()
                .map(EmbeddingSpec::span)
                .unwrap_or(0);
            let num_rows = block.num_rows();
            let lib_ranges = self
                .lib_ranges
                .as_ref()
                .ok_or_else(|| EdmError::invalid_input("no library ranges have been set"))?;
            let pred_ranges = self
                .pred_ranges
                .as_ref()
                .ok_or_else(|| EdmError::invalid_input("no prediction ranges have been set"))?;

            let lib_mask = lib_ranges.usable_mask(num_rows, span, self.tp);
            let usable_pred = pred_ranges.usable_mask(num_rows, span, self.tp);
            let requested_pred = pred_ranges.requested_mask(num_rows);
            self.masks.value = Some(Masks {
                lib_rows: rows_where(&lib_mask),
                pred_rows: rows_where(&usable_pred),
                usable_pred,
                requested_pred,
            });
            self.masks.built_at = revision;
        }

        let distance_deps = [self.changed.block, self.changed.embedding, self.changed.norm];
        if distance_deps
            .iter()
            .any(|&changed| changed > self.distances_built_at)
            || self.distances.num_rows() != block.num_rows()
        {
            self.distances.invalidate(block.num_rows());
            self.distances_built_at = revision;
        }

        let vectors = ready(&self.vectors, "vectors")?;
        let masks = ready(&self.masks, "masks")?;
        let lib_rows: &[usize] = self.lib_override.as_deref().unwrap_or(&masks.lib_rows);
        self.distances
            .ensure(vectors, self.norm, &masks.pred_rows, lib_rows);

        Ok(())
    }

    fn forecast(&mut self) -> Result<ForecastOutput, EdmError> {
        let block = self
            .block
            .as_ref()
            .ok_or_else(|| EdmError::invalid_input("no block has been set"))?;
        let num_rows = block.num_rows();
        let dim = self
            .embedding
            .as_ref()
            .map(EmbeddingSpec::dimension)
            .unwrap_or(0);

        let vectors = ready(&self.vectors, "vectors")?;
        let targets = ready(&self.targets, "targets")?;
        let masks = ready(&self.masks, "masks")?;
        let lib_rows: Vec<usize> = self
            .lib_override
            .clone()
            .unwrap_or_else(|| masks.lib_rows.clone());

        let mut predicted = vec![MISSING; num_rows];
        let mut variance = vec![MISSING; num_rows];
        let save_model = self.method == Method::Smap && self.save_coefficients;
        let mut coefficients = save_model.then(|| vec![vec![MISSING; dim + 1]; num_rows]);
        let mut covariances: Option<Vec<Option<Vec<f64>>>> =
            save_model.then(|| vec![None; num_rows]);

        let mut insufficient: Option<(usize, usize)> = None;
        let mut singular_rows = 0usize;

        for &row in &masks.pred_rows {
            let candidates = ranked_neighbors(row, &lib_rows, &self.distances, &self.filter);
            match self.method {
                Method::Simplex => {
                    let requested = if self.num_neighbors > 0 {
                        self.num_neighbors as usize
                    } else {
                        dim + 1
                    };
                    let take = requested.min(candidates.len());
                    if take < requested && insufficient.is_none() {
                        insufficient = Some((requested, take));
                    }
                    let RowForecast {
                        predicted: value,
                        variance: spread,
                    } = simplex_forecast(&candidates[..take], &targets.shifted, self.theta);
                    predicted[row] = value;
                    variance[row] = spread;
                }
                Method::Smap | Method::FastLinear => {
                    let selected = if self.num_neighbors > 0 {
                        let take = (self.num_neighbors as usize).min(candidates.len());
                        if take < self.num_neighbors as usize && insufficient.is_none() {
                            insufficient = Some((self.num_neighbors as usize, take));
                        }
                        &candidates[..take]
                    } else {
                        &candidates[..]
                    };
                    if selected.is_empty() {
                        continue;
                    }

                    let fit = if self.method == Method::Smap {
                        smap_forecast(
                            &vectors[row],
                            selected,
                            vectors,
                            &targets.shifted,
                            self.theta,
                            dim,
                        )?
                    } else {
                        fast_linear_forecast(
                            &vectors[row],
                            selected,
                            vectors,
                            &targets.shifted,
                            dim,
                        )?
                    };
                    match fit {
                        Some(out) => {
                            predicted[row] = out.forecast.predicted;
                            variance[row] = out.forecast.variance;
                            if let Some(table) = coefficients.as_mut() {
                                table[row] = out.coefficients;
                            }
                            if let Some(list) = covariances.as_mut() {
                                list[row] = Some(out.covariance);
                            }
                        }
                        None => {
                            singular_rows += 1;
                        }
                    }
                }
            }
        }

        let eligible: Vec<bool> = masks
            .requested_pred
            .iter()
            .zip(masks.usable_pred.iter())
            .map(|(&requested, &usable)| requested && usable)
            .collect();
        let stats = compute_stats(&targets.shifted, &predicted, &eligible);
        let const_stats = compute_stats(&targets.shifted, &targets.constant, &eligible);

        let requested_rows = rows_where(&masks.requested_pred);
        let predictions = PredictionTable {
            time: requested_rows.iter().map(|&r| targets.time[r]).collect(),
            observed: requested_rows
                .iter()
                .map(|&r| targets.shifted[r])
                .collect(),
            predicted: requested_rows.iter().map(|&r| predicted[r]).collect(),
            variance: requested_rows.iter().map(|&r| variance[r]).collect(),
        };
        let coefficients = coefficients.map(|table| CoefficientTable {
            names: coefficient_names(dim),
            rows: requested_rows.iter().map(|&r| table[r].clone()).collect(),
        });
        let coefficient_covariances = covariances
            .map(|list| requested_rows.iter().map(|&r| list[r].clone()).collect());

        let mut diagnostics = Diagnostics::new(self.method.label(), num_rows);
        diagnostics.push_note(format!("embedding_dim={dim}"));
        diagnostics.push_note(format!("theta={}", self.theta));
        diagnostics.push_note(format!(
            "lib_rows={}, pred_rows={}",
            lib_rows.len(),
            masks.pred_rows.len()
        ));
        if !self.suppress_warnings {
            if !self.filter.cross_validation_enabled()
                && overlaps(&lib_rows, &masks.usable_pred)
            {
                diagnostics.warnings.push(Warning::OverlapWithoutExclusion);
            }
            if let Some((requested, available)) = insufficient {
                diagnostics.warnings.push(Warning::InsufficientNeighbors {
                    requested,
                    available,
                });
            }
            if singular_rows > 0 {
                diagnostics.warnings.push(Warning::NearSingularRegression {
                    rows: singular_rows,
                });
            }
        }

        Ok(ForecastOutput {
            predictions,
            stats,
            const_stats,
            coefficients,
            coefficient_covariances,
            diagnostics,
        })
    }
}

fn ready<'a, T>(artifact: &'a Artifact<T>, name: &str) -> Result<&'a T, EdmError> {
    artifact
        .value
        .as_ref()
        .ok_or_else(|| EdmError::numerical_issue(format!("{name} not built before forecast")))
}

fn overlaps(lib_rows: &[usize], usable_pred: &[bool]) -> bool {
    lib_rows
        .iter()
        .any(|&row| usable_pred.get(row).copied().unwrap_or(false))
}

/// Legacy coefficient column naming: `c_1..c_E` slopes, trailing `c_0`
/// intercept.
fn coefficient_names(dim: usize) -> Vec<String> {
    let mut names: Vec<String> = (1..=dim).map(|j| format!("c_{j}")).collect();
    names.push("c_0".to_string());
    names
}
