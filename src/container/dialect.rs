use binrw::BinWrite;
use strum::{EnumIter, IntoStaticStr};

use super::Tag;

/// The on-wire flavour of a length-prefixed record container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Dialect {
    /// Electronic Arts IFF: `tag | u32 body size | body | pad to even`.
    ///
    /// Group chunks (`FORM`, `LIST`, `CAT `, `PROP`) carry a 4-byte type
    /// right after the size, counted in the size field.
    Iff,

    /// QuickTime atoms: `u32 total size | tag | body`, never padded.
    ///
    /// A size of `1` is followed by a 64-bit size, a size of `0` extends to the end of the parent.
    QuickTime,
}

impl Dialect {
    /// Length of the plain record header.
    pub const HEADER_LEN: u64 = 8;

    /// Length of the QuickTime extended header (`1 | tag | u64 size`).
    pub const EXTENDED_HEADER_LEN: u64 = 16;

    /// The number of header bytes reserved for a record of the provided `layout`.
    pub fn header_len(&self, layout: Layout) -> u64 {
        match (self, layout) {
            (Self::Iff, Layout::Composite) => Self::HEADER_LEN + 4,
            (Self::QuickTime, Layout::Wide) => Self::EXTENDED_HEADER_LEN,
            _ => Self::HEADER_LEN,
        }
    }

    /// Whether odd-sized bodies are followed by a pad byte.
    pub fn pads(&self) -> bool {
        matches!(self, Self::Iff)
    }

    /// Whether a record of the provided `layout` can be written in this dialect.
    pub fn supports(&self, layout: Layout) -> bool {
        !matches!((self, layout), (Self::Iff, Layout::Wide))
    }

    /// The group tags that always open a composite record in this dialect.
    pub fn default_composites(&self) -> &'static [Tag] {
        const IFF: &[Tag] = &[
            Tag::from_raw(*b"FORM"),
            Tag::from_raw(*b"LIST"),
            Tag::from_raw(*b"CAT "),
            Tag::from_raw(*b"PROP"),
        ];
        const QUICKTIME: &[Tag] = &[
            Tag::from_raw(*b"moov"),
            Tag::from_raw(*b"trak"),
            Tag::from_raw(*b"mdia"),
            Tag::from_raw(*b"minf"),
            Tag::from_raw(*b"stbl"),
            Tag::from_raw(*b"dinf"),
            Tag::from_raw(*b"edts"),
            Tag::from_raw(*b"udta"),
            Tag::from_raw(*b"tref"),
            Tag::from_raw(*b"mvex"),
            Tag::from_raw(*b"moof"),
            Tag::from_raw(*b"traf"),
            Tag::from_raw(*b"mfra"),
            Tag::from_raw(*b"gmhd"),
            Tag::from_raw(*b"clip"),
            Tag::from_raw(*b"matt"),
        ];

        match self {
            Self::Iff => IFF,
            Self::QuickTime => QUICKTIME,
        }
    }
}

/// How a record is laid out, chosen when it is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    /// A leaf record holding raw bytes.
    Data,

    /// A record holding other records.
    Composite,

    /// A QuickTime data atom which may outgrow 32-bit sizes, see [`Header::Wide`].
    Wide,
}

/// Record headers as they are back-patched on the wire.
#[derive(Debug, PartialEq, BinWrite)]
#[bw(big)]
pub enum Header {
    /// `tag | u32 size`, the size excludes the header.
    Iff { tag: Tag, size: u32 },

    /// `u32 size | tag`, the size includes the header.
    Atom { size: u32, tag: Tag },

    /// `u32 1 | tag | u64 size`, the size includes the 16-byte header.
    #[bw(magic = b"\0\0\0\x01")]
    Extended { tag: Tag, size: u64 },

    /// An empty `wide` atom, followed by the real 32-bit header of the atom.
    #[bw(magic = b"\0\0\0\x08wide")]
    Wide { size: u32, tag: Tag },
}

impl Header {
    /// Compute the header of a record of `size` total bytes, if it can be represented.
    pub fn for_record(dialect: Dialect, layout: Layout, tag: Tag, size: u64) -> Option<Self> {
        match (dialect, layout) {
            (Dialect::Iff, _) => u32::try_from(size.checked_sub(Dialect::HEADER_LEN)?)
                .ok()
                .map(|size| Self::Iff { tag, size }),
            (Dialect::QuickTime, Layout::Wide) => {
                // The inner atom starts after the 8-byte `wide` atom.
                match u32::try_from(size.saturating_sub(Dialect::HEADER_LEN)) {
                    Ok(size) => Some(Self::Wide { size, tag }),
                    Err(_) => Some(Self::Extended { tag, size }),
                }
            }
            (Dialect::QuickTime, _) => u32::try_from(size)
                .ok()
                .map(|size| Self::Atom { size, tag }),
        }
    }

    /// The number of bytes this header spans on the wire.
    pub fn len(&self) -> u64 {
        match self {
            Self::Iff { .. } | Self::Atom { .. } => Dialect::HEADER_LEN,
            Self::Extended { .. } | Self::Wide { .. } => Dialect::EXTENDED_HEADER_LEN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_bytes(header: &Header) -> Vec<u8> {
        let mut bytes = Vec::new();
        header
            .write(&mut std::io::Cursor::new(&mut bytes))
            .expect("in-memory write");

        bytes
    }

    #[test]
    fn it_lays_out_iff_headers() {
        let header = Header::for_record(Dialect::Iff, Layout::Data, Tag::from_raw(*b"TEST"), 11);

        assert_eq!(
            header,
            Some(Header::Iff {
                tag: Tag::from_raw(*b"TEST"),
                size: 3
            })
        );
        assert_eq!(
            to_bytes(&header.expect("header")),
            [0x54, 0x45, 0x53, 0x54, 0, 0, 0, 3]
        );
    }

    #[test]
    fn it_lays_out_wide_headers() {
        let tag = Tag::from_raw(*b"mdat");

        let small = Header::for_record(Dialect::QuickTime, Layout::Wide, tag, 16 + 2)
            .expect("wide header");
        assert_eq!(
            to_bytes(&small),
            [0, 0, 0, 8, b'w', b'i', b'd', b'e', 0, 0, 0, 10, b'm', b'd', b'a', b't']
        );

        let huge = Header::for_record(Dialect::QuickTime, Layout::Wide, tag, 0x1_0000_0010)
            .expect("extended header");
        assert_eq!(
            to_bytes(&huge),
            [0, 0, 0, 1, b'm', b'd', b'a', b't', 0, 0, 0, 1, 0, 0, 0, 0x10]
        );
    }

    #[test]
    fn it_refuses_oversized_plain_headers() {
        let tag = Tag::from_raw(*b"mdat");

        assert!(Header::for_record(Dialect::QuickTime, Layout::Data, tag, u32::MAX as u64).is_some());
        assert!(
            Header::for_record(Dialect::QuickTime, Layout::Data, tag, u32::MAX as u64 + 1)
                .is_none()
        );
        assert!(
            Header::for_record(Dialect::Iff, Layout::Data, tag, u32::MAX as u64 + 9).is_none()
        );
    }
}
