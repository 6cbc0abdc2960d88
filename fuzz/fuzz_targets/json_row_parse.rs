//! Fuzz target for JSON row conversion.
//!
//! This fuzzer feeds arbitrary byte sequences through the JSON object to
//! example conversion, checking for panics, crashes, or hangs.

#![no_main]

use granary::table::Example;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 1024 * 1024 {
        return;
    }

    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) {
        if let Some(object) = value.as_object() {
            let _ = Example::from_json_object(object);
        }
    }
});
