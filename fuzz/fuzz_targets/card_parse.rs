//! Fuzz target for dataset card parsing.
//!
//! This fuzzer feeds arbitrary byte sequences to the card parser, checking
//! for panics, crashes, or hangs.
//!
//! Run with:
//!   cargo +nightly fuzz run card_parse

#![no_main]

use granary::card::DatasetCard;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Cap input size to avoid OOM on very large inputs.
    if data.len() > 1024 * 1024 {
        return;
    }

    if let Ok(text) = std::str::from_utf8(data) {
        // Errors are fine; panics are not.
        let _ = DatasetCard::parse(text);
    }
});
