// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use edm_core::{Block, EdmError};

/// Distance norm applied to embedding-space differences.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Norm {
    /// Sum of absolute coordinate differences.
    L1,
    /// Euclidean distance.
    L2,
    /// General p-norm `(sum |delta|^p)^(1/p)`.
    P(f64),
}

impl Norm {
    /// Maps the numeric norm selector: 1 is L1, 2 is L2, any other finite
    /// positive value is a p-norm of that order.
    pub fn from_order(order: f64) -> Result<Self, EdmError> {
        if order == 1.0 {
            Ok(Self::L1)
        } else if order == 2.0 {
            Ok(Self::L2)
        } else if order.is_finite() && order > 0.0 {
            Ok(Self::P(order))
        } else {
            Err(EdmError::invalid_input(format!(
                "norm order must be finite and > 0; got {order}"
            )))
        }
    }
}

impl Default for Norm {
    fn default() -> Self {
        Self::L2
    }
}

/// Prediction method. Invalid selector codes fail construction instead of
/// falling through to a default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Method {
    /// Locally weighted linear regression with distance-decaying weights.
    Smap,
    /// Weighted nearest-neighbor ensemble averaging.
    #[default]
    Simplex,
    /// Unweighted linear fit over the filtered library.
    FastLinear,
}

impl Method {
    /// Maps the legacy numeric selector (1 = S-map, 2 = simplex,
    /// 3 = fast linear).
    pub fn from_code(code: i32) -> Result<Self, EdmError> {
        match code {
            1 => Ok(Self::Smap),
            2 => Ok(Self::Simplex),
            3 => Ok(Self::FastLinear),
            other => Err(EdmError::invalid_input(format!(
                "unknown prediction method selector: {other}"
            ))),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Smap => "smap",
            Self::Simplex => "simplex",
            Self::FastLinear => "fast-linear",
        }
    }
}

/// How state-space vectors are assembled from the block.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EmbeddingSpec {
    /// Vector at row `i` takes the listed 1-based columns at row `i`.
    Columns(Vec<usize>),
    /// Vector at row `i` is `[x[i], x[i-tau], ..., x[i-(e-1)*tau]]` over one
    /// 1-based column.
    Lagged { column: usize, e: usize, tau: usize },
}

impl EmbeddingSpec {
    /// Embedding dimension E.
    pub fn dimension(&self) -> usize {
        match self {
            Self::Columns(columns) => columns.len(),
            Self::Lagged { e, .. } => *e,
        }
    }

    /// Leading rows an embedding vector reaches back over: `(E-1)*tau` for
    /// lag embeddings, zero for explicit columns.
    pub fn span(&self) -> usize {
        match self {
            Self::Columns(_) => 0,
            Self::Lagged { e, tau, .. } => (e.saturating_sub(1)) * tau,
        }
    }

    /// Validates the spec against a block's column count.
    pub fn validate(&self, block: &Block) -> Result<(), EdmError> {
        match self {
            Self::Columns(columns) => {
                if columns.is_empty() {
                    return Err(EdmError::invalid_input(
                        "explicit embedding requires at least one column",
                    ));
                }
                for &column in columns {
                    block.column(column)?;
                }
            }
            Self::Lagged { column, e, tau } => {
                if *e == 0 {
                    return Err(EdmError::invalid_input(
                        "lag embedding requires dimension e >= 1; got 0",
                    ));
                }
                if *tau == 0 {
                    return Err(EdmError::invalid_input(
                        "lag embedding requires tau >= 1; got 0",
                    ));
                }
                block.column(*column)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{EmbeddingSpec, Method, Norm};
    use edm_core::Block;

    #[test]
    fn norm_selector_maps_one_two_and_p() {
        assert_eq!(Norm::from_order(1.0).expect("l1"), Norm::L1);
        assert_eq!(Norm::from_order(2.0).expect("l2"), Norm::L2);
        assert_eq!(Norm::from_order(0.5).expect("p"), Norm::P(0.5));
        assert!(Norm::from_order(0.0).is_err());
        assert!(Norm::from_order(f64::NAN).is_err());
        assert!(Norm::from_order(-3.0).is_err());
    }

    #[test]
    fn method_selector_rejects_unknown_codes() {
        assert_eq!(Method::from_code(1).expect("smap"), Method::Smap);
        assert_eq!(Method::from_code(2).expect("simplex"), Method::Simplex);
        assert_eq!(Method::from_code(3).expect("fast"), Method::FastLinear);
        assert!(Method::from_code(0).is_err());
        assert!(Method::from_code(4).is_err());
    }

    #[test]
    fn embedding_span_and_dimension() {
        let explicit = EmbeddingSpec::Columns(vec![1, 2, 3]);
        assert_eq!(explicit.dimension(), 3);
        assert_eq!(explicit.span(), 0);

        let lagged = EmbeddingSpec::Lagged {
            column: 1,
            e: 3,
            tau: 2,
        };
        assert_eq!(lagged.dimension(), 3);
        assert_eq!(lagged.span(), 4);
    }

    #[test]
    fn embedding_validate_checks_columns() {
        let block = Block::new(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).expect("block");

        assert!(EmbeddingSpec::Columns(vec![1, 2]).validate(&block).is_ok());
        assert!(EmbeddingSpec::Columns(vec![3]).validate(&block).is_err());
        assert!(EmbeddingSpec::Columns(vec![]).validate(&block).is_err());

        let bad_e = EmbeddingSpec::Lagged {
            column: 1,
            e: 0,
            tau: 1,
        };
        assert!(bad_e.validate(&block).is_err());
        let bad_tau = EmbeddingSpec::Lagged {
            column: 1,
            e: 2,
            tau: 0,
        };
        assert!(bad_tau.validate(&block).is_err());
    }
}
