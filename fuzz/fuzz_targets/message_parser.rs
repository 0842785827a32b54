//! Fuzz target for IRC message parsing
//!
//! Feeds arbitrary text through color stripping and the parser; neither may
//! panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use slirc_client::{FormattedStringExt, Message};
use std::str;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = str::from_utf8(data) {
        if input.len() > 8191 {
            return;
        }

        let _ = input.parse::<Message>();

        let stripped = input.strip_formatting();
        if let Ok(message) = stripped.parse::<Message>() {
            assert!(!message.raw_command.is_empty());
        }
    }
});
