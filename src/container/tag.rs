use binrw::{BinRead, BinWrite};

use crate::{Error, Result};

/// A 4-character ASCII record type, such as `moov` or `FORM`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, BinRead, BinWrite)]
pub struct Tag([u8; 4]);

impl Tag {
    pub const FREE: Tag = Tag(*b"free");

    /// Build a tag from raw bytes, checking that every byte is printable ASCII.
    pub fn new(bytes: [u8; 4]) -> Result<Self> {
        if bytes.iter().all(|byte| (0x20..=0x7e).contains(byte)) {
            Ok(Self(bytes))
        } else {
            Err(Error::InvalidTag(bytes))
        }
    }

    /// Build a tag from raw bytes read off a stream, without validation.
    ///
    /// Real-world files carry non-ASCII types (`©nam` and friends), the reader keeps them verbatim.
    pub const fn from_raw(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    pub fn to_u32(self) -> u32 {
        u32::from_be_bytes(self.0)
    }
}

impl std::str::FromStr for Tag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut bytes = [0u8; 4];
        if s.len() != bytes.len() {
            let mut padded = [0u8; 4];
            for (dst, src) in padded.iter_mut().zip(s.bytes()) {
                *dst = src;
            }

            return Err(Error::InvalidTag(padded));
        }

        bytes.copy_from_slice(s.as_bytes());
        Self::new(bytes)
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in self.0 {
            if byte.is_ascii_graphic() || byte == b' ' {
                write!(f, "{}", byte as char)?;
            } else {
                write!(f, "\\x{byte:02x}")?;
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Tag(\"{self}\")")
    }
}
