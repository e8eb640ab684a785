// Error taxonomy shared by the block and frame codecs.
//
// Decoding failures are always surfaced; encoding is total and never
// produces an error of its own.

use std::io;

/// Errors reported by the block decoder and the stream reader/writer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed, truncated or internally inconsistent input, including
    /// checksum mismatches. The payload names the check that failed.
    #[error("corrupt input: {0}")]
    Corrupt(&'static str),

    /// The declared decoded length exceeds the configured ceiling.
    #[error("decoded length {len} exceeds limit {max}")]
    TooLarge { len: u64, max: u64 },

    /// Input uses a construct this implementation does not understand.
    #[error("unsupported input: {0}")]
    Unsupported(String),

    /// Write or flush attempted after the stream was closed.
    #[error("stream already closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Coarse classification of an [`Error`], cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Corrupt,
    TooLarge,
    Unsupported,
    Closed,
    Io,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Corrupt(_) => ErrorKind::Corrupt,
            Self::TooLarge { .. } => ErrorKind::TooLarge,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::Closed => ErrorKind::Closed,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Recover the codec error carried inside an `io::Error` produced by the
    /// `Read`/`Write` implementations of the stream types.
    pub fn from_io(err: &io::Error) -> Option<&Error> {
        err.get_ref()?.downcast_ref::<Error>()
    }

    /// Produce an equivalent error for replay after a terminal failure.
    ///
    /// `io::Error` is not `Clone`, so I/O failures are rebuilt from their
    /// kind and message.
    pub(crate) fn duplicate(&self) -> Error {
        match self {
            Self::Corrupt(msg) => Self::Corrupt(*msg),
            Self::TooLarge { len, max } => Self::TooLarge {
                len: *len,
                max: *max,
            },
            Self::Unsupported(msg) => Self::Unsupported(msg.clone()),
            Self::Closed => Self::Closed,
            Self::Io(e) => Self::Io(io::Error::new(e.kind(), e.to_string())),
        }
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> io::Error {
        match e {
            Error::Io(inner) => inner,
            Error::Closed => io::Error::other(Error::Closed),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
