//! Fuzz target for harness.json configuration parsing.
//!
//! Parsing and semantic validation must return errors, never panic.

#![no_main]

use hc_config::{validate_harness, HarnessConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(config) = serde_json::from_slice::<HarnessConfig>(data) {
        let _ = validate_harness(&config);
    }
});
