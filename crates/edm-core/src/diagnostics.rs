// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::borrow::Cow;
use std::fmt;

/// Non-fatal operational and numerical conditions observed during a run.
///
/// Warnings never abort a run; they are collected into [`Diagnostics`] unless
/// suppressed by configuration. Errors are never suppressible.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Warning {
    /// A requested library size exceeded the usable library; the run used
    /// everything available.
    LibSizeCapped { requested: usize, available: usize },
    /// The maximum usable library size was reached; larger requested sizes
    /// were skipped.
    LibSizesExhausted { ignored: usize },
    /// Fewer neighbors were usable than requested; the forecast used what
    /// was available.
    InsufficientNeighbors { requested: usize, available: usize },
    /// Library and prediction rows overlap while cross-validation exclusion
    /// is disabled, so a vector can be its own neighbor.
    OverlapWithoutExclusion,
    /// Near-singular local regressions left this many predictions missing.
    NearSingularRegression { rows: usize },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LibSizeCapped {
                requested,
                available,
            } => write!(
                f,
                "library size request {requested} exceeds the {available} usable rows; capped"
            ),
            Self::LibSizesExhausted { ignored } => write!(
                f,
                "maximum library size reached; ignoring {ignored} larger requested size(s)"
            ),
            Self::InsufficientNeighbors {
                requested,
                available,
            } => write!(
                f,
                "requested {requested} neighbors but only {available} were usable"
            ),
            Self::OverlapWithoutExclusion => write!(
                f,
                "library and prediction rows overlap without an exclusion radius"
            ),
            Self::NearSingularRegression { rows } => write!(
                f,
                "near-singular regression left {rows} prediction(s) missing"
            ),
        }
    }
}

/// Structured metadata captured from an engine run.
///
/// Diagnostics are returned with outputs rather than logged; presentation is
/// the host environment's concern.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnostics {
    pub algorithm: Cow<'static, str>,
    pub num_rows: usize,
    pub notes: Vec<String>,
    pub warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new(algorithm: &'static str, num_rows: usize) -> Self {
        Self {
            algorithm: Cow::Borrowed(algorithm),
            num_rows,
            notes: vec![],
            warnings: vec![],
        }
    }

    pub fn push_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
