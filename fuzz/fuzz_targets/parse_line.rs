#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(record) = grc_core::parse_line(text) {
            assert!(!record.inputs.is_empty());
            if let Some(steps) = &record.steps {
                assert!(!steps.is_empty());
            }
        }
    }
});
