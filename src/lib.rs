//! Snapkit: fast block compression and a checksummed stream format in Rust.
//!
//! The crate provides:
//! - A raw block codec with a greedy single-candidate match finder (`block`)
//! - The framed stream format with `io::Write` / `io::Read` adapters (`frame`)
//! - Stream and file helpers with statistics (`io`)
//! - Varint and zigzag integer codecs (`varint`, `zigzag`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! use std::io::{Read, Write};
//! use snapkit::{StreamReader, StreamWriter};
//!
//! let data = b"hello hello hello hello hello hello";
//!
//! let block = snapkit::block::encode(data);
//! assert_eq!(snapkit::block::decode(&block).unwrap(), data);
//!
//! let mut writer = StreamWriter::new(Vec::new());
//! writer.write_all(data).unwrap();
//! let framed = writer.into_inner().unwrap();
//!
//! let mut decoded = Vec::new();
//! StreamReader::new(framed.as_slice()).read_to_end(&mut decoded).unwrap();
//! assert_eq!(decoded, data);
//! ```

pub mod block;
pub mod error;
pub mod frame;
pub mod io;
pub mod varint;
pub mod zigzag;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::{Error, ErrorKind, Result};
pub use frame::{StreamReader, StreamWriter};
