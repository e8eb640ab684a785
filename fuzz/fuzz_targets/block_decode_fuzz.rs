#![no_main]
use libfuzzer_sys::fuzz_target;
use snapkit::block::{self, BlockDecoder};

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must only ever produce errors, never panics.
    if let Ok(out) = block::decode(data) {
        assert_eq!(Ok(out.len()), block::decoded_len(data).map_err(|e| e.kind()));
    }

    // A tight ceiling exercises the TooLarge path.
    let _ = BlockDecoder::with_max_len(1024).decode(data);
});
