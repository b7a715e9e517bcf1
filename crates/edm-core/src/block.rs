// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::EdmError;

/// Sentinel for missing observations.
pub const MISSING: f64 = f64::NAN;

/// Returns true when a value is the missing sentinel.
#[inline]
pub fn is_missing(value: f64) -> bool {
    value.is_nan()
}

/// Ordered set of equal-length numeric columns with a row-aligned time axis.
///
/// Columns are addressed externally with 1-based indices, matching the range
/// convention of the engine inputs. The time axis is reporting-only; when no
/// axis is supplied rows are labeled `1.0..=num_rows`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Block {
    columns: Vec<Vec<f64>>,
    names: Vec<String>,
    time: Vec<f64>,
    num_rows: usize,
}

impl Block {
    /// Constructs a validated block from equal-length columns.
    pub fn new(columns: Vec<Vec<f64>>) -> Result<Self, EdmError> {
        let names = (1..=columns.len()).map(|i| format!("col_{i}")).collect();
        Self::with_names(columns, names)
    }

    /// Constructs a validated block with per-column names.
    pub fn with_names(columns: Vec<Vec<f64>>, names: Vec<String>) -> Result<Self, EdmError> {
        if columns.is_empty() {
            return Err(EdmError::invalid_input("block requires at least one column"));
        }
        if names.len() != columns.len() {
            return Err(EdmError::invalid_input(format!(
                "column name count mismatch: got {}, expected {}",
                names.len(),
                columns.len()
            )));
        }

        let num_rows = columns[0].len();
        if num_rows == 0 {
            return Err(EdmError::invalid_input("block columns must be non-empty"));
        }
        for (idx, column) in columns.iter().enumerate() {
            if column.len() != num_rows {
                return Err(EdmError::invalid_input(format!(
                    "column length mismatch: column {} has {} rows, expected {}",
                    idx + 1,
                    column.len(),
                    num_rows
                )));
            }
        }

        let time = (1..=num_rows).map(|i| i as f64).collect();
        Ok(Self {
            columns,
            names,
            time,
            num_rows,
        })
    }

    /// Replaces the default time axis with an explicit one.
    pub fn with_time(mut self, time: Vec<f64>) -> Result<Self, EdmError> {
        if time.len() != self.num_rows {
            return Err(EdmError::invalid_input(format!(
                "time axis length mismatch: got {}, expected {}",
                time.len(),
                self.num_rows
            )));
        }
        self.time = time;
        Ok(self)
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Resolves a 1-based column index, failing outside `1..=num_columns`.
    pub fn column(&self, one_based: usize) -> Result<&[f64], EdmError> {
        if one_based < 1 || one_based > self.columns.len() {
            return Err(EdmError::invalid_input(format!(
                "column index out of range: got {}, expected 1..={}",
                one_based,
                self.columns.len()
            )));
        }
        Ok(&self.columns[one_based - 1])
    }
}
