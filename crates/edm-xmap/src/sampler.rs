// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::config::CrossMapConfig;
use edm_core::{Block, Diagnostics, EdmError, StableRng, Warning};
use edm_forecast::{
    EmbeddingSpec, ForecastEngine, PredStats, PredictionTable, RangeSet,
};

/// Forecast skill at one sampled library size.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LibStats {
    pub lib_size: usize,
    pub stats: PredStats,
}

/// Everything a cross-map sweep produces: one [`LibStats`] row per engine
/// run, optional per-run prediction tables in the same order, and merged
/// diagnostics.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CrossMapOutput {
    pub stats: Vec<LibStats>,
    pub predictions: Option<Vec<PredictionTable>>,
    pub diagnostics: Diagnostics,
}

/// Convergent cross mapping: sweeps library sizes, resampling the usable
/// library and rerunning one shared [`ForecastEngine`] per draw.
///
/// The engine's derived artifacts (embeddings, targets, masks, distances)
/// survive across draws because only the library row subset changes between
/// runs.
#[derive(Clone, Debug)]
pub struct CrossMap {
    engine: ForecastEngine,
    config: CrossMapConfig,
    rng: StableRng,
    num_rows: usize,
}

impl CrossMap {
    /// Embeds the 1-based `lib_column`, cross mapping to the 1-based
    /// `target_column`.
    pub fn new(
        block: Block,
        lib_column: usize,
        target_column: usize,
        lib_ranges: RangeSet,
        pred_ranges: RangeSet,
        config: CrossMapConfig,
    ) -> Result<Self, EdmError> {
        config.validate()?;

        let num_rows = block.num_rows();
        let mut engine = ForecastEngine::new();
        engine.set_block(block);
        engine.set_embedding(EmbeddingSpec::Lagged {
            column: lib_column,
            e: config.e,
            tau: config.tau,
        });
        engine.set_target_column(target_column);
        engine.set_tp(config.tp);
        engine.set_method(config.method);
        engine.set_norm(config.norm);
        engine.set_theta(config.theta);
        engine.set_num_neighbors(config.num_neighbors);
        engine.set_exclusion_radius(config.exclusion_radius);
        engine.set_epsilon(config.epsilon);
        engine.set_suppress_warnings(config.suppress_warnings);
        engine.set_lib(lib_ranges);
        engine.set_pred(pred_ranges);

        let rng = StableRng::new(config.seed);
        Ok(Self {
            engine,
            config,
            rng,
            num_rows,
        })
    }

    /// Runs the full sweep.
    ///
    /// A requested size at or above the usable library admits no variation
    /// unless sampling with replacement, so it runs once on the whole
    /// library and any larger requested sizes are skipped.
    pub fn run(&mut self) -> Result<CrossMapOutput, EdmError> {
        let full_lib = self.engine.usable_library_rows()?;
        let max_lib = full_lib.len();
        if max_lib == 0 {
            return Err(EdmError::invalid_input(
                "no usable library rows after applying ranges and embedding",
            ));
        }

        let lib_sizes = self.config.normalized_lib_sizes();
        let mut stats = Vec::new();
        let mut predictions = self.config.save_predictions.then(Vec::new);
        let mut diagnostics = Diagnostics::new("cross-map", self.num_rows);
        diagnostics.push_note(format!("method={}", self.config.method.label()));
        diagnostics.push_note(format!("max_lib_size={max_lib}"));
        diagnostics.push_note(format!("lib_sizes={lib_sizes:?}"));

        for (position, &lib_size) in lib_sizes.iter().enumerate() {
            let variation_possible = self.config.random_libs && self.config.replace;
            if lib_size >= max_lib && !variation_possible {
                if lib_size > max_lib && !self.config.suppress_warnings {
                    push_unique(
                        &mut diagnostics.warnings,
                        Warning::LibSizeCapped {
                            requested: lib_size,
                            available: max_lib,
                        },
                    );
                }
                self.run_once(
                    full_lib.clone(),
                    max_lib,
                    &mut stats,
                    &mut predictions,
                    &mut diagnostics,
                )?;
                let ignored = lib_sizes.len() - position - 1;
                if ignored > 0 && !self.config.suppress_warnings {
                    push_unique(
                        &mut diagnostics.warnings,
                        Warning::LibSizesExhausted { ignored },
                    );
                }
                break;
            }

            if self.config.random_libs {
                for _ in 0..self.config.num_samples {
                    let rows = if self.config.replace {
                        sample_with_replacement(&mut self.rng, &full_lib, lib_size)?
                    } else {
                        select_without_replacement(&mut self.rng, &full_lib, lib_size)
                    };
                    self.run_once(rows, lib_size, &mut stats, &mut predictions, &mut diagnostics)?;
                }
            } else {
                // Every contiguous window of the usable library, wrapping
                // past the end.
                for start in 0..max_lib {
                    let rows = wrapped_window(&full_lib, start, lib_size);
                    self.run_once(rows, lib_size, &mut stats, &mut predictions, &mut diagnostics)?;
                }
            }
        }

        self.engine.set_library_rows(None);
        Ok(CrossMapOutput {
            stats,
            predictions,
            diagnostics,
        })
    }

    fn run_once(
        &mut self,
        rows: Vec<usize>,
        lib_size: usize,
        stats: &mut Vec<LibStats>,
        predictions: &mut Option<Vec<PredictionTable>>,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), EdmError> {
        self.engine.set_library_rows(Some(rows));
        let out = self.engine.run()?;
        for warning in out.diagnostics.warnings {
            push_unique(&mut diagnostics.warnings, warning);
        }
        stats.push(LibStats {
            lib_size,
            stats: out.stats,
        });
        if let Some(tables) = predictions.as_mut() {
            tables.push(out.predictions);
        }
        Ok(())
    }

}

fn sample_with_replacement(
    rng: &mut StableRng,
    full_lib: &[usize],
    lib_size: usize,
) -> Result<Vec<usize>, EdmError> {
    let mut rows = Vec::with_capacity(lib_size);
    for _ in 0..lib_size {
        rows.push(full_lib[rng.gen_index(full_lib.len())?]);
    }
    Ok(rows)
}

/// Selection sampling (Knuth, TAOCP vol. 2, Algorithm S): one pass over
/// the frame, keeping each row with probability (needed / remaining).
fn select_without_replacement(
    rng: &mut StableRng,
    full_lib: &[usize],
    lib_size: usize,
) -> Vec<usize> {
    let max_lib = full_lib.len();
    let mut rows = Vec::with_capacity(lib_size);
    let mut seen = 0usize;
    while rows.len() < lib_size {
        let remaining = (max_lib - seen) as f64;
        let needed = (lib_size - rows.len()) as f64;
        if rng.gen_f64() * remaining >= needed {
            seen += 1;
        } else {
            rows.push(full_lib[seen]);
            seen += 1;
        }
    }
    rows
}

fn push_unique(warnings: &mut Vec<Warning>, warning: Warning) {
    if !warnings.contains(&warning) {
        warnings.push(warning);
    }
}

/// `lib_size` rows starting at `start`, wrapping to the front of the frame.
fn wrapped_window(full_lib: &[usize], start: usize, lib_size: usize) -> Vec<usize> {
    let max_lib = full_lib.len();
    if start + lib_size <= max_lib {
        full_lib[start..start + lib_size].to_vec()
    } else {
        let mut rows = full_lib[start..].to_vec();
        rows.extend_from_slice(&full_lib[..lib_size - (max_lib - start)]);
        rows
    }
}
