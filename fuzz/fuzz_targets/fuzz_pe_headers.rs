#![no_main]

use dllexports::PeHeaders;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Header reader only; must return an error, never panic
    let _ = PeHeaders::from_slice(data);
});
