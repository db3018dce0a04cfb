//! Fuzz target for plain `ethtool <device>` output parsing.

#![no_main]

use hc_core::tools::ethtool::parse_link_settings;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let _ = parse_link_settings("eth0", data);
});
