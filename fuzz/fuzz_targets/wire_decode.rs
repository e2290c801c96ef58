#![no_main]

use libfuzzer_sys::fuzz_target;
use onions_core::{Config, Record};

fuzz_target!(|data: &[u8]| {
    // Untrusted network input: decoding must never panic, and validation of
    // whatever comes out must only ever reject
    let Ok(text) = std::str::from_utf8(data) else { return };
    if let Ok(record) = Record::from_wire_str(text) {
        let cfg = Config { difficulty: 0, ..Config::default() };
        let _ = record.check_validity(&cfg);
        let _ = record.to_wire_string();
    }
});
