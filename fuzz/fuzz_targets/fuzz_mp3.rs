#![no_main]

use std::io::Read;

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes may fail to decode but must never panic.
    if let Ok(mut decoder) = kage_mp3::Decoder::new(data) {
        let mut pcm = Vec::new();
        let _ = decoder.read_to_end(&mut pcm);
    }
});
