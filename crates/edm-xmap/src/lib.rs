// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod config;
pub mod sampler;

pub use config::CrossMapConfig;
pub use sampler::{CrossMap, CrossMapOutput, LibStats};

/// Cross-map namespace placeholder.
pub fn crate_name() -> &'static str {
    let _ = (edm_core::crate_name(), edm_forecast::crate_name());
    "edm-xmap"
}

#[cfg(test)]
mod tests {
    use super::crate_name;

    #[test]
    fn crate_name_matches_expected() {
        assert_eq!(crate_name(), "edm-xmap");
    }
}
