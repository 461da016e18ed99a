use thiserror::Error;

use crate::{container::Tag, tscc::Depth};

/// The error types that can occur when manipulating this crate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Field(binrw::Error),

    /// A record grew past what its header can represent, the record is lost
    /// and has to be written again with a wide header.
    #[error("record `{tag}` is {size} bytes, which does not fit a 32-bit size field")]
    SizeOverflow { tag: Tag, size: u64 },

    #[error("invalid record type {0:02x?}, expected 4 printable ASCII characters")]
    InvalidTag([u8; 4]),

    #[error("record `{tag}` cannot be written in the {dialect} dialect")]
    UnsupportedRecord { tag: Tag, dialect: &'static str },

    #[error("palette change of {count} entries starting at {first} exceeds 256 entries")]
    PaletteRange { first: usize, count: usize },

    #[error("no record is currently open")]
    NoOpenRecord,

    #[error("record `{0}` holds data and cannot contain other records")]
    NotComposite(Tag),

    #[error("record `{0}` has already been finished")]
    RecordFinished(Tag),

    #[error("frame holds {actual} pixels, expected {expected}")]
    FrameSize { expected: usize, actual: usize },

    #[error("a {width}x{height} frame does not fit in memory")]
    FrameTooLarge { width: usize, height: usize },

    #[error("codec is configured for {codec:?} pixels, got {pixels:?}")]
    DepthMismatch { codec: Depth, pixels: Depth },

    #[error("corrupt stream: {0}")]
    Corrupt(&'static str),

    /// The compressed frame ran past its buffer, pixels decoded so far are kept.
    #[error("corrupt frame at ({x}, {y}): {reason}")]
    CorruptFrame {
        x: usize,
        y: usize,
        reason: &'static str,
    },
}

impl From<binrw::Error> for Error {
    fn from(err: binrw::Error) -> Self {
        match err {
            binrw::Error::Io(err) => Self::Io(err),
            err => Self::Field(err),
        }
    }
}

/// A handy [`std::result::Result`] type alias bounding the [`enum@Error`] struct as `E`.
pub type Result<T = (), E = Error> = std::result::Result<T, E>;
