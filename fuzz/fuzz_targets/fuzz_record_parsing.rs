#![no_main]

use libfuzzer_sys::fuzz_target;
use oracle_arena::protocol::Record;

fuzz_target!(|data: &[u8]| {
    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(record) = Record::parse(line) {
        for key in ["nextLoak", "b1", "x", "y", "choice", "ciphertext", "message"] {
            let _ = record.integer(key);
            let _ = record.flexible_unsigned(key);
            let _ = record.hex_bytes(key);
        }
    }
});
