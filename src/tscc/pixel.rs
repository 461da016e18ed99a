use strum::EnumIter;

/// The bit depth of the pixels carried by a TechSmith stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, EnumIter)]
pub enum Depth {
    /// 8-bit palette indices.
    #[default]
    Indexed8,

    /// 15-bit `0RRRRRGGGGGBBBBB` colors, stored on 16 bits.
    ///
    /// Streams and containers call this depth `16`, which is what [`Depth::bits`] returns.
    Rgb555,

    /// 24-bit `0x00RRGGBB` colors.
    Rgb24,
}

impl Depth {
    /// The depth as it is declared in streams and containers.
    pub fn bits(&self) -> u16 {
        match self {
            Self::Indexed8 => 8,
            Self::Rgb555 => 16,
            Self::Rgb24 => 24,
        }
    }

    /// The depth matching a declared bit count, `15` and `16` both mean [`Depth::Rgb555`].
    pub fn from_bits(bits: u16) -> Option<Self> {
        match bits {
            8 => Some(Self::Indexed8),
            15 | 16 => Some(Self::Rgb555),
            24 => Some(Self::Rgb24),
            _ => None,
        }
    }

    /// Number of bytes of a pixel on the wire.
    pub fn bytes(&self) -> usize {
        match self {
            Self::Indexed8 => 1,
            Self::Rgb555 => 2,
            Self::Rgb24 => 3,
        }
    }
}

/// An in-memory pixel representation and its wire form.
pub trait Pixel: Copy + PartialEq + std::fmt::Debug {
    /// The stream depth this representation encodes to.
    const DEPTH: Depth;

    /// Number of bytes of a pixel on the wire.
    const BYTES: usize;

    /// Append the wire form of the pixel to `out`.
    fn put(self, out: &mut Vec<u8>);

    /// Read a pixel from exactly [`Pixel::BYTES`] bytes.
    fn get(bytes: &[u8]) -> Self;
}

impl Pixel for u8 {
    const DEPTH: Depth = Depth::Indexed8;
    const BYTES: usize = 1;

    fn put(self, out: &mut Vec<u8>) {
        out.push(self);
    }

    fn get(bytes: &[u8]) -> Self {
        bytes[0]
    }
}

impl Pixel for u16 {
    const DEPTH: Depth = Depth::Rgb555;
    const BYTES: usize = 2;

    fn put(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn get(bytes: &[u8]) -> Self {
        u16::from_le_bytes([bytes[0], bytes[1]])
    }
}

/// Stored as `B G R`, the top byte is dropped.
impl Pixel for u32 {
    const DEPTH: Depth = Depth::Rgb24;
    const BYTES: usize = 3;

    fn put(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes()[..3]);
    }

    fn get(bytes: &[u8]) -> Self {
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0])
    }
}

/// Expand a `0RRRRRGGGGGBBBBB` color to `0x00RRGGBB`, replicating the top bits into the low ones.
pub fn expand_555(v: u16) -> u32 {
    let v = v as u32;

    ((v & 0x7c00) << 9)
        | ((v & 0x7000) << 4)
        | ((v & 0x03e0) << 6)
        | ((v & 0x0380) << 1)
        | ((v & 0x001f) << 3)
        | ((v & 0x001c) >> 2)
}

/// Expand a `RRRRRGGGGGGBBBBB` color to `0x00RRGGBB`, replicating the top bits into the low ones.
pub fn expand_565(v: u16) -> u32 {
    let (r, g, b) = ((v >> 11) as u32, ((v >> 5) & 0x3f) as u32, (v & 0x1f) as u32);

    (r << 3 | r >> 2) << 16 | (g << 2 | g >> 4) << 8 | (b << 3 | b >> 2)
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn it_keeps_the_declared_depth_of_555() {
        assert_eq!(Depth::Rgb555.bits(), 16);
        assert_eq!(Depth::from_bits(15), Some(Depth::Rgb555));

        for depth in Depth::iter() {
            assert_eq!(Depth::from_bits(depth.bits()), Some(depth));
        }
        assert_eq!(Depth::from_bits(32), None);
    }

    #[test]
    fn it_writes_little_endian_pixels() {
        let mut out = Vec::new();
        0x1234u16.put(&mut out);
        0x00abcdefu32.put(&mut out);

        assert_eq!(out, [0x34, 0x12, 0xef, 0xcd, 0xab]);
        assert_eq!(u16::get(&out[..2]), 0x1234);
        assert_eq!(u32::get(&out[2..]), 0xabcdef);
    }

    #[test]
    fn it_expands_to_full_range() {
        assert_eq!(expand_555(0x7fff), 0xffffff);
        assert_eq!(expand_555(0x7c00), 0xff0000);
        assert_eq!(expand_555(0x0010), 0x000084);
        assert_eq!(expand_555(0), 0);

        assert_eq!(expand_565(0xffff), 0xffffff);
        assert_eq!(expand_565(0x07e0), 0x00ff00);
        assert_eq!(expand_565(0x0010), 0x000084);
    }
}
