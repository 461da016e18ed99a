use binrw::{BinRead, BinWrite};

use crate::{container::fields::ColorMap, Error, Result};

/// Number of entries in a palette.
pub const LEN: usize = 256;

/// A 256-entry color table, expanding 8-bit indices to `0x00RRGGBB` colors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: [u32; LEN],
}

impl Default for Palette {
    /// A grayscale ramp, from black at `0` to white at `255`.
    fn default() -> Self {
        Self {
            colors: std::array::from_fn(|idx| idx as u32 * 0x010101),
        }
    }
}

/// A partial palette update: `first | count (0 = 256) | flags | count × u32 color`.
#[derive(Debug, BinRead, BinWrite)]
#[brw(big)]
struct Change {
    first: u8,

    #[br(map(|count: u8| if count == 0 { LEN as u16 } else { count as u16 }))]
    #[bw(map(|count: &u16| *count as u8))]
    count: u16,

    /// Ignored on read, written as zero.
    flags: u16,

    /// Colors in their top 24 bits, the low byte is a per-entry flag.
    #[br(count = count)]
    entries: Vec<u32>,
}

impl Palette {
    /// The color of the entry at `index`, as `0x00RRGGBB`.
    pub fn rgb(&self, index: u8) -> u32 {
        self.colors[index as usize]
    }

    pub fn colors(&self) -> &[u32; LEN] {
        &self.colors
    }

    /// Replace the leading entries with `colors`, extra colors past 256 are ignored.
    pub fn set(&mut self, colors: &[u32]) {
        for (entry, color) in self.colors.iter_mut().zip(colors) {
            *entry = color & 0xff_ffff;
        }
    }

    /// Replace the leading entries with colors built from separate channel arrays.
    pub fn set_channels(&mut self, r: &[u8], g: &[u8], b: &[u8]) {
        for (entry, ((r, g), b)) in self.colors.iter_mut().zip(r.iter().zip(g).zip(b)) {
            *entry = (*r as u32) << 16 | (*g as u32) << 8 | *b as u32;
        }
    }

    /// Apply a palette change record, returning the range of updated entries.
    pub fn decode_change(&mut self, bytes: &[u8]) -> Result<std::ops::Range<usize>> {
        let change = Change::read(&mut std::io::Cursor::new(bytes))
            .map_err(|_| Error::Corrupt("truncated palette change"))?;

        let (first, count) = (change.first as usize, change.count as usize);
        if first + count > LEN {
            return Err(Error::PaletteRange { first, count });
        }

        for (entry, quad) in self.colors[first..].iter_mut().zip(&change.entries) {
            *entry = quad >> 8;
        }

        tracing::trace!("Updated {count} palette entries starting at {first}");

        Ok(first..first + count)
    }

    /// Serialize `count` entries starting at `first` as a palette change record.
    pub fn encode_change(&self, first: usize, count: usize) -> Result<Vec<u8>> {
        if count == 0 || first + count > LEN {
            return Err(Error::PaletteRange { first, count });
        }

        let change = Change {
            first: first as u8,
            count: count as u16,
            flags: 0,
            entries: self.colors[first..first + count]
                .iter()
                .map(|color| color << 8)
                .collect(),
        };

        let mut bytes = std::io::Cursor::new(Vec::with_capacity(4 + count * 4));
        change.write(&mut bytes)?;

        Ok(bytes.into_inner())
    }
}

impl From<&ColorMap> for Palette {
    fn from(map: &ColorMap) -> Self {
        let mut palette = Self::default();
        for (entry, [r, g, b]) in palette.colors.iter_mut().zip(&map.colors) {
            *entry = (*r as u32) << 16 | (*g as u32) << 8 | *b as u32;
        }

        palette
    }
}

impl From<&Palette> for ColorMap {
    fn from(palette: &Palette) -> Self {
        Self {
            colors: palette
                .colors
                .iter()
                .map(|color| [(color >> 16) as u8, (color >> 8) as u8, *color as u8])
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_defaults_to_a_gray_ramp() {
        let palette = Palette::default();

        assert_eq!(palette.rgb(0), 0);
        assert_eq!(palette.rgb(0x80), 0x808080);
        assert_eq!(palette.rgb(255), 0xffffff);
    }

    #[test]
    fn it_applies_partial_changes() {
        let mut palette = Palette::default();

        let range = palette
            .decode_change(&[0x10, 2, 0xff, 0xff, 0x12, 0x34, 0x56, 0x01, 0xab, 0xcd, 0xef, 0x00])
            .expect("change");

        assert_eq!(range, 0x10..0x12);
        assert_eq!(palette.rgb(0x10), 0x123456);
        assert_eq!(palette.rgb(0x11), 0xabcdef);
        assert_eq!(palette.rgb(0x12), 0x121212);
    }

    #[test]
    fn it_reads_zero_as_a_full_change() {
        let mut source = Palette::default();
        source.set(&[0xff0000; LEN]);

        let bytes = source.encode_change(0, LEN).expect("encode");
        assert_eq!(&bytes[..4], [0, 0, 0, 0]);
        assert_eq!(bytes.len(), 4 + LEN * 4);

        let mut palette = Palette::default();
        assert_eq!(palette.decode_change(&bytes).expect("decode"), 0..LEN);
        assert_eq!(palette, source);
    }

    #[test]
    fn it_rejects_out_of_range_changes() {
        let mut palette = Palette::default();

        let mut bytes = vec![0xff, 2, 0, 0];
        bytes.extend_from_slice(&[0; 8]);
        assert!(matches!(
            palette.decode_change(&bytes),
            Err(Error::PaletteRange {
                first: 255,
                count: 2
            })
        ));
        assert!(matches!(
            palette.decode_change(&[0, 2, 0, 0, 1, 2, 3, 4]),
            Err(Error::Corrupt(_))
        ));
        assert!(palette.encode_change(250, 7).is_err());
        assert_eq!(palette, Palette::default());
    }

    #[test]
    fn it_sets_separate_channels() {
        let mut palette = Palette::default();
        palette.set_channels(&[1, 2], &[3, 4], &[5]);

        assert_eq!(palette.rgb(0), 0x010305);
        assert_eq!(palette.rgb(1), 0x010101);
    }

    #[test]
    fn it_converts_color_maps() {
        let map = ColorMap {
            colors: vec![[0x12, 0x34, 0x56]],
        };

        let palette = Palette::from(&map);
        assert_eq!(palette.rgb(0), 0x123456);
        assert_eq!(ColorMap::from(&palette).colors[..2], [[0x12, 0x34, 0x56], [1, 1, 1]]);
    }
}
