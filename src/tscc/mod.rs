//! The TechSmith screen-capture codec (`tscc`).
//!
//! Each frame is a stream of run-length opcodes over scanlines, stored bottom row first,
//! deflated with zlib:
//! - `count (1..=255) | pixel`: repeat `pixel` `count` times,
//! - `0 | 0`: end of line,
//! - `0 | 1`: end of bitmap,
//! - `0 | 2 | dx | dy`: move the cursor over unchanged pixels,
//! - `0 | n (3..=255) | n pixels`: literal run, padded to an even length for 8-bit pixels.
//!
//! Delta frames leave the pixels they skip untouched, so decoding one requires
//! the previously decoded frame to still be in the output buffer.

use std::io::{Read, Write};

use derive_more::BitOr;
use flate2::{read::ZlibDecoder, write::ZlibEncoder};

use crate::{palette::Palette, Error, Result};

mod config;
pub use config::Config;

pub mod pixel;
pub use pixel::{Depth, Pixel};

pub mod decode;
pub mod encode;

const ESCAPE: u8 = 0x00;
const EOL: u8 = 0x00;
const EOB: u8 = 0x01;
const SKIP: u8 = 0x02;

/// Payloads this short carry no change at all.
const UNCHANGED_LEN: usize = 2;

/// Per-frame hints provided by the caller when encoding.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, BitOr)]
pub struct FrameFlags(u8);

impl FrameFlags {
    pub const NONE: Self = Self(0);

    /// Encode the frame as a key frame, regardless of the key frame interval.
    pub const KEYFRAME: Self = Self(1 << 0);

    /// The caller knows the frame is identical to the previous one.
    pub const SAME_DATA: Self = Self(1 << 1);

    /// The frame is dropped and produces no payload.
    pub const DISCARD: Self = Self(1 << 2);

    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// A borrowed, top-down and row-major frame.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'p, P> {
    pub width: usize,
    pub height: usize,
    pub pixels: &'p [P],
}

/// A compressed frame payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub data: Vec<u8>,
    pub key_frame: bool,
}

/// The reusable opcode buffer, sized for the worst case of a frame before encoding it.
#[derive(Debug, Default)]
pub struct Scratch {
    buf: Vec<u8>,
}

impl Scratch {
    /// Capacity reserved for an opcode stream of a `width` × `height` frame of `depth` pixels,
    /// or [`None`] when it does not fit a `usize`.
    ///
    /// Any key or delta stream fits: a pixel never costs more than one opcode byte on top
    /// of itself, and each row adds at most its end of line plus a partial skip on each axis.
    pub fn capacity_for(width: usize, height: usize, depth: Depth) -> Option<usize> {
        let pixels = width.checked_mul(height)?;
        let rows = height.checked_mul(2)?.checked_add(2)?;

        let declared = match depth.bytes() {
            1 => pixels.checked_mul(2)?.checked_add(rows)?,
            bytes => pixels
                .checked_mul(bytes)?
                .checked_add(3 * (width / 255 + 1))?
                .checked_add(rows)?,
        };
        let worst = pixels
            .checked_mul(depth.bytes() + 1)?
            .checked_add(height.checked_mul(10)?)?
            .checked_add(4 * (height / 255 + 1) + 2)?;

        Some(declared.max(worst))
    }

    /// Clear the buffer, growing it when it is smaller than needed for the provided frame size.
    pub fn ensure(&mut self, width: usize, height: usize, depth: Depth) -> Result {
        let capacity = Self::capacity_for(width, height, depth)
            .ok_or(Error::FrameTooLarge { width, height })?;

        self.buf.clear();
        self.buf.reserve_exact(capacity);

        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }
}

/// A TechSmith encoder and decoder, holding the palette and the scratch buffer across frames.
#[derive(Debug, Default)]
pub struct Codec {
    config: Config,
    palette: Palette,
    scratch: Scratch,
    since_key: Option<u32>,
}

impl Codec {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The palette used to expand 8-bit frames when decoding them to 24-bit.
    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn palette_mut(&mut self) -> &mut Palette {
        &mut self.palette
    }

    pub fn scratch(&self) -> &Scratch {
        &self.scratch
    }

    /// Encode `frame` into a compressed payload, as a delta against `prev` when possible.
    ///
    /// Returns [`None`] for frames flagged with [`FrameFlags::DISCARD`].
    pub fn encode_frame<P: Pixel>(
        &mut self,
        frame: &Frame<'_, P>,
        prev: Option<&[P]>,
        flags: FrameFlags,
    ) -> Result<Option<Encoded>> {
        if flags.contains(FrameFlags::DISCARD) {
            tracing::trace!("Discarding a {}x{} frame", frame.width, frame.height);

            return Ok(None);
        }

        self.check_depth(P::DEPTH)?;
        let len = frame_len(frame.width, frame.height)?;
        for actual in std::iter::once(frame.pixels.len()).chain(prev.map(<[P]>::len)) {
            check_len(len, actual)?;
        }

        let interval = self.config.key_frame_interval;
        let forced = self
            .since_key
            .map_or(true, |since| interval > 0 && since + 1 >= interval);

        self.scratch.ensure(frame.width, frame.height, P::DEPTH)?;
        let ops = &mut self.scratch.buf;

        let key_frame = match prev {
            Some(prev) if !forced && !flags.contains(FrameFlags::KEYFRAME) => {
                if flags.contains(FrameFlags::SAME_DATA) {
                    encode::same(ops);
                } else {
                    encode::delta(ops, frame.pixels, prev, frame.width);
                }

                false
            }
            _ => {
                encode::key(ops, frame.pixels, frame.width);

                true
            }
        };

        self.since_key = match (key_frame, self.since_key) {
            (false, Some(since)) => Some(since + 1),
            _ => Some(0),
        };

        let mut encoder = ZlibEncoder::new(Vec::with_capacity(ops.len() / 2), self.config.compression);
        encoder.write_all(ops)?;
        let data = encoder.finish()?;

        tracing::debug!(
            "Encoded a {}x{} {} frame, {} opcode bytes deflated to {}",
            frame.width,
            frame.height,
            if key_frame { "key" } else { "delta" },
            ops.len(),
            data.len()
        );

        Ok(Some(Encoded { data, key_frame }))
    }

    /// Decode an 8-bit payload into palette indices.
    pub fn decode_indexed(
        &mut self,
        data: &[u8],
        width: usize,
        height: usize,
        out: &mut [u8],
    ) -> Result<bool> {
        let Self {
            config, scratch, ..
        } = self;

        Self::decode_with(config, scratch, data, width, height, out, |index: u8| index)
    }

    /// Decode a 16-bit payload into `0RRRRRGGGGGBBBBB` pixels.
    pub fn decode_rgb555(
        &mut self,
        data: &[u8],
        width: usize,
        height: usize,
        out: &mut [u16],
    ) -> Result<bool> {
        let Self {
            config, scratch, ..
        } = self;

        Self::decode_with(config, scratch, data, width, height, out, |pixel: u16| pixel)
    }

    /// Decode a payload of any depth into `0x00RRGGBB` pixels, 8-bit pixels are expanded through the palette.
    pub fn decode_rgb(
        &mut self,
        data: &[u8],
        width: usize,
        height: usize,
        out: &mut [u32],
    ) -> Result<bool> {
        let Self {
            config,
            palette,
            scratch,
            ..
        } = self;

        match config.depth {
            Depth::Indexed8 => Self::decode_with(config, scratch, data, width, height, out, |index: u8| {
                palette.rgb(index)
            }),
            Depth::Rgb555 => {
                Self::decode_with(config, scratch, data, width, height, out, pixel::expand_555)
            }
            Depth::Rgb24 => {
                Self::decode_with(config, scratch, data, width, height, out, |pixel: u32| pixel)
            }
        }
    }

    /// Decode a 16-bit payload holding `RRRRRGGGGGGBBBBB` pixels into `0x00RRGGBB` pixels.
    ///
    /// The stream layout is the one of [`Depth::Rgb555`] frames, only the expansion differs.
    pub fn decode_rgb565(
        &mut self,
        data: &[u8],
        width: usize,
        height: usize,
        out: &mut [u32],
    ) -> Result<bool> {
        let Self {
            config, scratch, ..
        } = self;

        Self::decode_with(config, scratch, data, width, height, out, pixel::expand_565)
    }

    /// Decode a payload of the configured depth, reporting whether it was a key frame.
    ///
    /// Payloads of two bytes or less, and payloads that only hold the end of the bitmap,
    /// leave `out` untouched and are reported as delta frames. Corrupt payloads leave
    /// the pixels decoded before the corruption in `out`.
    fn decode_with<P: Pixel, O: Copy>(
        config: &Config,
        scratch: &mut Scratch,
        data: &[u8],
        width: usize,
        height: usize,
        out: &mut [O],
        expand: impl Fn(P) -> O,
    ) -> Result<bool> {
        if P::DEPTH != config.depth {
            return Err(Error::DepthMismatch {
                codec: config.depth,
                pixels: P::DEPTH,
            });
        }
        check_len(frame_len(width, height)?, out.len())?;

        if data.len() <= UNCHANGED_LEN {
            return Ok(false);
        }

        scratch.buf.clear();
        if ZlibDecoder::new(data).read_to_end(&mut scratch.buf).is_err() {
            tracing::warn!("Dropping a frame of {} bytes with an invalid deflate stream", data.len());

            return Err(Error::CorruptFrame {
                x: 0,
                y: 0,
                reason: "invalid deflate stream",
            });
        }

        if scratch.buf.len() <= UNCHANGED_LEN {
            return Ok(false);
        }

        tracing::trace!(
            "Inflated {} payload bytes to {} opcode bytes",
            data.len(),
            scratch.buf.len()
        );

        decode::decode(&scratch.buf, width, out, expand, config.only_key_frames).map_err(|err| {
            tracing::warn!("Keeping a partially decoded {width}x{height} frame: {err}");

            err
        })
    }

    fn check_depth(&self, depth: Depth) -> Result {
        if depth != self.config.depth {
            return Err(Error::DepthMismatch {
                codec: self.config.depth,
                pixels: depth,
            });
        }

        Ok(())
    }
}

fn frame_len(width: usize, height: usize) -> Result<usize> {
    width
        .checked_mul(height)
        .ok_or(Error::FrameTooLarge { width, height })
}

fn check_len(expected: usize, actual: usize) -> Result {
    if expected != actual {
        return Err(Error::FrameSize { expected, actual });
    }

    Ok(())
}
