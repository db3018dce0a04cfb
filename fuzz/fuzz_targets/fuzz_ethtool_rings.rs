//! Fuzz target for `ethtool -g` output parsing.
//!
//! Parsing and reading the RX/TX values must fail cleanly on any input.

#![no_main]

use hc_core::tools::ethtool::parse_ring_buffer;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    if let Ok(settings) = parse_ring_buffer("eth0", data) {
        let _ = settings.current_rx();
        let _ = settings.current_tx();
        let _ = settings.max_value("RX");
    }
});
