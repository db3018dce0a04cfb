//! Fuzz target for `ethtool -l` output parsing.

#![no_main]

use hc_core::tools::ethtool::parse_channels;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let _ = parse_channels("eth0", data);
});
