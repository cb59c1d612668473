#![no_main]

use dllexports::{Decoder, DecoderConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Smaller image limit keeps each iteration fast
    let decoder = Decoder::new(DecoderConfig {
        max_image_size: 16 * 1024 * 1024,
    });
    let _ = decoder.decode_bytes(data);
});
