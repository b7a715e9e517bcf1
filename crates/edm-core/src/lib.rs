// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod block;
pub mod diagnostics;
pub mod error;
pub mod rng;

pub use block::{is_missing, Block, MISSING};
pub use diagnostics::{Diagnostics, Warning};
pub use error::EdmError;
pub use rng::StableRng;

/// Core shared types for edm-rs.
pub fn crate_name() -> &'static str {
    "edm-core"
}
