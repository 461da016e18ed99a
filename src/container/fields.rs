//! Field layouts of the well-known leaf records, everything else is kept as raw bytes.

use binrw::{BinRead, BinWrite};

use super::{Dialect, Tag};
use crate::Result;

/// The parsed content of a well-known leaf record.
#[derive(Debug, Clone, PartialEq)]
pub enum Fields {
    /// QuickTime `ftyp`.
    FileType(FileType),

    /// QuickTime `mvhd`.
    MovieHeader(TimedHeader),

    /// QuickTime `mdhd`.
    MediaHeader(TimedHeader),

    /// QuickTime `hdlr`.
    Handler(Handler),

    /// IFF `BMHD`.
    BitmapHeader(BitmapHeader),

    /// IFF `CMAP`.
    ColorMap(ColorMap),
}

impl Fields {
    /// Parse `body` with the field layout registered for `tag`, if any.
    pub fn parse(dialect: Dialect, tag: Tag, body: &[u8]) -> Option<Result<Self>> {
        let mut body = std::io::Cursor::new(body);

        let fields = match (dialect, tag.as_bytes()) {
            (Dialect::QuickTime, b"ftyp") => FileType::read(&mut body).map(Self::FileType),
            (Dialect::QuickTime, b"mvhd") => TimedHeader::read(&mut body).map(Self::MovieHeader),
            (Dialect::QuickTime, b"mdhd") => TimedHeader::read(&mut body).map(Self::MediaHeader),
            (Dialect::QuickTime, b"hdlr") => Handler::read(&mut body).map(Self::Handler),
            (Dialect::Iff, b"BMHD") => BitmapHeader::read(&mut body).map(Self::BitmapHeader),
            (Dialect::Iff, b"CMAP") => ColorMap::read(&mut body).map(Self::ColorMap),
            _ => return None,
        };

        Some(fields.map_err(Into::into))
    }

    /// Serialize the fields back to the raw record body.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = std::io::Cursor::new(Vec::new());

        match self {
            Self::FileType(inner) => inner.write(&mut bytes)?,
            Self::MovieHeader(inner) | Self::MediaHeader(inner) => inner.write(&mut bytes)?,
            Self::Handler(inner) => inner.write(&mut bytes)?,
            Self::BitmapHeader(inner) => inner.write(&mut bytes)?,
            Self::ColorMap(inner) => inner.write(&mut bytes)?,
        }

        Ok(bytes.into_inner())
    }
}

/// The file type and compatibility brands.
#[derive(Debug, Clone, PartialEq, BinRead, BinWrite)]
#[brw(big)]
pub struct FileType {
    pub major_brand: Tag,
    pub minor_version: u32,

    #[br(parse_with = binrw::helpers::until_eof)]
    pub compatible_brands: Vec<Tag>,
}

/// Times of `mvhd` and `mdhd`, whose width depend on the record version.
#[derive(Debug, Clone, PartialEq, BinRead, BinWrite)]
#[br(import(version: u8))]
pub enum Times {
    #[br(pre_assert(version == 0))]
    Short {
        creation: u32,
        modification: u32,
        timescale: u32,
        duration: u32,
    },

    #[br(pre_assert(version == 1))]
    Long {
        creation: u64,
        modification: u64,
        timescale: u32,
        duration: u64,
    },
}

impl Times {
    pub fn timescale(&self) -> u32 {
        match self {
            Self::Short { timescale, .. } | Self::Long { timescale, .. } => *timescale,
        }
    }

    pub fn duration(&self) -> u64 {
        match self {
            Self::Short { duration, .. } => *duration as u64,
            Self::Long { duration, .. } => *duration,
        }
    }
}

/// A versioned header starting with creation/modification times, a timescale and a duration.
#[derive(Debug, Clone, PartialEq, BinRead, BinWrite)]
#[brw(big)]
pub struct TimedHeader {
    pub version: u8,
    pub flags: [u8; 3],

    #[br(args(version))]
    pub times: Times,

    /// The version-independent remainder, kept verbatim.
    #[br(parse_with = binrw::helpers::until_eof)]
    pub rest: Vec<u8>,
}

/// The media handler description.
#[derive(Debug, Clone, PartialEq, BinRead, BinWrite)]
#[brw(big)]
pub struct Handler {
    pub version: u8,
    pub flags: [u8; 3],
    pub component_type: u32,
    pub component_subtype: Tag,

    /// Manufacturer, flags and the component name, kept verbatim.
    #[br(parse_with = binrw::helpers::until_eof)]
    pub rest: Vec<u8>,
}

/// Compression of an ILBM `BODY`, as stated in its `BMHD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(repr = u8)]
pub enum BitmapCompression {
    None = 0,
    ByteRun1 = 1,
}

/// The bitmap header of an ILBM form.
#[derive(Debug, Clone, PartialEq, BinRead, BinWrite)]
#[brw(big)]
pub struct BitmapHeader {
    pub width: u16,
    pub height: u16,
    pub x: i16,
    pub y: i16,
    pub planes: u8,
    pub masking: u8,
    pub compression: BitmapCompression,
    pub _pad: u8,
    pub transparent_color: u16,
    pub x_aspect: u8,
    pub y_aspect: u8,
    pub page_width: i16,
    pub page_height: i16,
}

/// An ILBM color map, as `r, g, b` triplets.
#[derive(Debug, Clone, PartialEq, BinRead, BinWrite)]
#[brw(big)]
pub struct ColorMap {
    #[br(parse_with = binrw::helpers::until_eof)]
    pub colors: Vec<[u8; 3]>,
}
