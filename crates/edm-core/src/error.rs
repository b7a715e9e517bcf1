// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use thiserror::Error;

/// Error type shared across the edm-rs crates.
///
/// Configuration problems are fatal and abort a run before any computation.
/// Missing data is not an error: it propagates as NaN and yields missing
/// predictions. Operational conditions surface as [`crate::Warning`] values
/// instead.
#[derive(Debug, Error)]
pub enum EdmError {
    /// Invalid configuration or input data; no computation was performed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Internal numerical contract violation that cannot be expressed as a
    /// missing row.
    #[error("numerical issue: {0}")]
    NumericalIssue(String),
}

impl EdmError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn numerical_issue(message: impl Into<String>) -> Self {
        Self::NumericalIssue(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::EdmError;

    #[test]
    fn invalid_input_formats_message() {
        let err = EdmError::invalid_input("tp must be finite");
        assert_eq!(err.to_string(), "invalid input: tp must be finite");
    }

    #[test]
    fn numerical_issue_formats_message() {
        let err = EdmError::numerical_issue("non-finite weight sum");
        assert_eq!(err.to_string(), "numerical issue: non-finite weight sum");
    }
}
