//! Fuzz target for `ethtool -k` output parsing.

#![no_main]

use hc_core::tools::ethtool::parse_features;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let _ = parse_features("eth0", data);
});
