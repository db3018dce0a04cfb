//! Fuzz target for command line splitting and quoting.
//!
//! A quoted word must split back into exactly that word.

#![no_main]

use hc_core::exec::{shell_quote, split_command_line};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let _ = split_command_line(data);

    if !data.is_empty() {
        let words = split_command_line(&shell_quote(data));
        assert_eq!(words, Some(vec![data.to_string()]));
    }
});
