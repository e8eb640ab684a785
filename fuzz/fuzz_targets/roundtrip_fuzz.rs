#![no_main]
use libfuzzer_sys::fuzz_target;
use snapkit::{StreamReader, StreamWriter, block};
use std::io::{Read, Write};

fuzz_target!(|data: &[u8]| {
    let encoded = block::encode(data);
    assert!(encoded.len() <= block::max_encoded_len(data.len()).unwrap());
    assert_eq!(block::decode(&encoded).unwrap(), data);

    // Split the input at a data-driven point to vary write boundaries.
    let split = data.first().map_or(0, |&b| (b as usize * 311) % (data.len() + 1));
    let mut w = StreamWriter::new(Vec::new());
    w.write_all(&data[..split]).unwrap();
    w.write_all(&data[split..]).unwrap();
    let stream = w.into_inner().unwrap();

    let mut out = Vec::new();
    StreamReader::new(stream.as_slice())
        .read_to_end(&mut out)
        .unwrap();
    assert_eq!(out, data);
});
