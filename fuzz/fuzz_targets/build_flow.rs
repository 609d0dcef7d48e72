#![no_main]

use grc_core::Document;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(document) = Document::parse(text) else {
        return;
    };
    // Simplification must only fail on user errors for builder-produced flows.
    if let Err(err) = document.compile(true) {
        assert!(err.is_user_error(), "{err}");
    }
});
