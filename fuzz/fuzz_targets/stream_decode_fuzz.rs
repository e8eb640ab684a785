#![no_main]
use libfuzzer_sys::fuzz_target;
use snapkit::StreamReader;
use snapkit::frame::STREAM_MARKER;
use std::io::Read;

fuzz_target!(|data: &[u8]| {
    let mut out = Vec::new();
    let _ = StreamReader::new(data).read_to_end(&mut out);

    // Most raw inputs die at the marker; prepend it to reach the frame loop.
    let mut stream = STREAM_MARKER.to_vec();
    stream.extend_from_slice(data);
    out.clear();
    let _ = StreamReader::new(stream.as_slice()).read_to_end(&mut out);

    // Unverified reads take a different path through the payload checks.
    let mut r = StreamReader::new(stream.as_slice()).verify_checksums(false);
    while let Ok(Some(_)) = r.read_frame() {}
});
