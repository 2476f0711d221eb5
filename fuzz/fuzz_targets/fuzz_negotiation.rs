#![no_main]

use cipherline::core::negotiation::{negotiate, Negotiation};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Fuzz spec parsing
    if let Ok(Negotiation::Complete { spec, consumed }) = negotiate(data) {
        // An accepted spec must serialize back to the bytes it was parsed from
        assert_eq!(spec.to_bytes(), &data[..consumed]);
    }
});
