//! Fuzz target for CSV cell classification.

#![no_main]

use granary::table::io_csv::parse_csv_cell;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 64 * 1024 {
        return;
    }

    if let Ok(cell) = std::str::from_utf8(data) {
        let _ = parse_csv_cell(cell);
    }
});
