// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Benchmark namespace placeholder.
pub fn crate_name() -> &'static str {
    let _ = (
        edm_core::crate_name(),
        edm_forecast::crate_name(),
        edm_xmap::crate_name(),
    );
    "edm-bench"
}
