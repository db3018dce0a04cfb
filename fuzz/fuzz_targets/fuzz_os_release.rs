//! Fuzz target for /etc/os-release classification.

#![no_main]

use hc_common::OsFamily;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Anything unrecognised classifies as Other
    let _ = OsFamily::from_os_release(data);
});
