// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::params::EmbeddingSpec;
use edm_core::{Block, EdmError, MISSING};

/// Builds one E-dimensional state-space vector per block row.
///
/// Explicit embeddings read the selected columns at the same row. Lag
/// embeddings read one column at `i, i-tau, ..., i-(E-1)*tau`; coordinates
/// that would read before the block are missing. Leading rows keep whatever
/// coordinates are reachable; the range resolver excludes them from use.
pub fn make_vectors(block: &Block, spec: &EmbeddingSpec) -> Result<Vec<Vec<f64>>, EdmError> {
    spec.validate(block)?;
    let num_rows = block.num_rows();

    match spec {
        EmbeddingSpec::Columns(columns) => {
            let sources: Vec<&[f64]> = columns
                .iter()
                .map(|&column| block.column(column))
                .collect::<Result<_, _>>()?;
            Ok((0..num_rows)
                .map(|row| sources.iter().map(|column| column[row]).collect())
                .collect())
        }
        EmbeddingSpec::Lagged { column, e, tau } => {
            let series = block.column(*column)?;
            let mut vectors = vec![vec![MISSING; *e]; num_rows];
            for (row, vector) in vectors.iter_mut().enumerate() {
                for (lag, coord) in vector.iter_mut().enumerate() {
                    if let Some(source) = row.checked_sub(lag * tau) {
                        *coord = series[source];
                    }
                }
            }
            Ok(vectors)
        }
    }
}

/// Target series shifted by the prediction horizon.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetSet {
    /// `shifted[i] = raw[i + tp]` where defined, missing elsewhere.
    pub shifted: Vec<f64>,
    /// Time axis shifted identically to the targets.
    pub time: Vec<f64>,
    /// Unshifted copy, kept as the constant-predictor baseline.
    pub constant: Vec<f64>,
}

/// Shifts the target column by the signed horizon `tp`, padding the vacated
/// side with missing values.
pub fn make_targets(block: &Block, target_column: usize, tp: i64) -> Result<TargetSet, EdmError> {
    let raw = block.column(target_column)?;
    let time = block.time();
    let num_rows = block.num_rows();

    let mut shifted = vec![MISSING; num_rows];
    let mut shifted_time = vec![MISSING; num_rows];
    for row in 0..num_rows {
        let source = row as i64 + tp;
        if source >= 0 && (source as usize) < num_rows {
            shifted[row] = raw[source as usize];
            shifted_time[row] = time[source as usize];
        }
    }

    Ok(TargetSet {
        shifted,
        time: shifted_time,
        constant: raw.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::{make_targets, make_vectors};
    use crate::params::EmbeddingSpec;
    use edm_core::{is_missing, Block};

    fn two_column_block() -> Block {
        Block::new(vec![
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
            vec![10.0, 20.0, 30.0, 40.0, 50.0],
        ])
        .expect("block should build")
    }

    #[test]
    fn explicit_vectors_read_columns_at_the_same_row() {
        let block = two_column_block();
        let vectors = make_vectors(&block, &EmbeddingSpec::Columns(vec![2, 1]))
            .expect("vectors should build");
        assert_eq!(vectors[0], vec![10.0, 1.0]);
        assert_eq!(vectors[4], vec![50.0, 5.0]);
    }

    #[test]
    fn lagged_vectors_read_back_at_multiples_of_tau() {
        let block = two_column_block();
        let spec = EmbeddingSpec::Lagged {
            column: 1,
            e: 3,
            tau: 2,
        };
        let vectors = make_vectors(&block, &spec).expect("vectors should build");

        assert_eq!(vectors[4], vec![5.0, 3.0, 1.0]);
        // Row 1 can reach lag 0 only; deeper lags would read before the block.
        assert_eq!(vectors[1][0], 2.0);
        assert!(is_missing(vectors[1][1]));
        assert!(is_missing(vectors[1][2]));
    }

    #[test]
    fn positive_tp_shifts_head_and_pads_tail() {
        let block = two_column_block();
        let targets = make_targets(&block, 1, 2).expect("targets should build");
        assert_eq!(&targets.shifted[..3], &[3.0, 4.0, 5.0]);
        assert!(is_missing(targets.shifted[3]));
        assert!(is_missing(targets.shifted[4]));
        assert_eq!(&targets.time[..3], &[3.0, 4.0, 5.0]);
    }

    #[test]
    fn negative_tp_shifts_tail_and_pads_head() {
        let block = two_column_block();
        let targets = make_targets(&block, 1, -2).expect("targets should build");
        assert!(is_missing(targets.shifted[0]));
        assert!(is_missing(targets.shifted[1]));
        assert_eq!(&targets.shifted[2..], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn zero_tp_is_identity_and_constant_copy_is_kept() {
        let block = two_column_block();
        let targets = make_targets(&block, 2, 0).expect("targets should build");
        assert_eq!(targets.shifted, vec![10.0, 20.0, 30.0, 40.0, 50.0]);
        assert_eq!(targets.constant, targets.shifted);
    }

    #[test]
    fn target_column_is_validated() {
        let block = two_column_block();
        assert!(make_targets(&block, 3, 0).is_err());
        assert!(make_targets(&block, 0, 0).is_err());
    }
}
