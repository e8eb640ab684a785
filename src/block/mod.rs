// Raw block format: a varint decoded length followed by literal and copy
// chunks.
//
// This module provides:
// - Chunk tag layouts, emitters and a parser (`tag`)
// - The encoder's match table and match extension (`table`)
// - A reusable greedy block encoder (`encoder`)
// - A bounds-checked block decoder with a length ceiling (`decoder`)

pub mod decoder;
pub mod encoder;
pub mod table;
pub mod tag;

pub use decoder::{BlockDecoder, MAX_DECODED_LEN, decode, decode_into, decoded_len};
pub use encoder::{BlockEncoder, encode, encode_into, max_encoded_len};
pub use tag::{Chunk, Chunks};
