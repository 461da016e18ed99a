//! Opcode stream interpreter, after the deflate pass.

use std::ops::Range;

use super::{pixel::Pixel, EOB, EOL, ESCAPE, SKIP};
use crate::{Error, Result};

/// Interpret the opcode stream `ops` into the top-down `out` frame of `width` pixels per row,
/// converting each wire pixel with `expand`.
///
/// Pixels that are not covered by the stream are left untouched, so `out` must hold
/// the previous frame when decoding a delta frame. Returns whether the stream was
/// a key frame, that is whether it contained no skip opcode.
///
/// With `only_key_frames`, decoding stops at the first skip opcode and returns `false`.
pub fn decode<P: Pixel, O: Copy>(
    ops: &[u8],
    width: usize,
    out: &mut [O],
    expand: impl Fn(P) -> O,
    only_key_frames: bool,
) -> Result<bool> {
    let height = if width > 0 { out.len() / width } else { 0 };
    let (mut x, mut y, mut pos) = (0, 0, 0);
    let mut key_frame = true;

    // The cursor counts rows from the bottom of the frame.
    let span = |x: usize, y: usize, len: usize| -> Option<Range<usize>> {
        (y < height && x + len <= width).then(|| {
            let start = (height - 1 - y) * width + x;

            start..start + len
        })
    };
    let corrupt = |x, y, reason| Error::CorruptFrame { x, y, reason };

    while let Some(&op) = ops.get(pos) {
        pos += 1;

        if op != ESCAPE {
            let count = op as usize;
            let pixel = ops
                .get(pos..pos + P::BYTES)
                .ok_or_else(|| corrupt(x, y, "repeat past the end of the stream"))?;
            let range = span(x, y, count)
                .ok_or_else(|| corrupt(x, y, "repeat past the frame bounds"))?;

            out[range].fill(expand(P::get(pixel)));
            pos += P::BYTES;
            x += count;

            continue;
        }

        let &code = ops
            .get(pos)
            .ok_or_else(|| corrupt(x, y, "escape at the end of the stream"))?;
        pos += 1;

        match code {
            EOL => {
                x = 0;
                y += 1;
            }
            EOB => break,
            SKIP => {
                let Some(&[dx, dy]) = ops.get(pos..pos + 2) else {
                    return Err(corrupt(x, y, "skip past the end of the stream"));
                };
                pos += 2;

                key_frame = false;
                if only_key_frames {
                    return Ok(false);
                }

                x += dx as usize;
                y += dy as usize;
            }
            count => {
                let count = count as usize;
                let len = count * P::BYTES;
                let pixels = ops
                    .get(pos..pos + len)
                    .ok_or_else(|| corrupt(x, y, "literal past the end of the stream"))?;
                let range = span(x, y, count)
                    .ok_or_else(|| corrupt(x, y, "literal past the frame bounds"))?;

                for (pixel, bytes) in out[range].iter_mut().zip(pixels.chunks_exact(P::BYTES)) {
                    *pixel = expand(P::get(bytes));
                }

                pos += len;
                if P::BYTES == 1 && count % 2 == 1 {
                    pos += 1;
                }
                x += count;
            }
        }
    }

    Ok(key_frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tscc::{encode, pixel::expand_555};

    fn decode_same<P: Pixel>(ops: &[u8], width: usize, out: &mut [P]) -> Result<bool> {
        decode(ops, width, out, |pixel: P| pixel, false)
    }

    #[test]
    fn it_decodes_a_small_key_frame() {
        let mut out = [0u8; 4];

        let key = decode_same(&[1, 2, 1, 2, 0, 0, 1, 1, 1, 1, 0, 0, 0, 1], 2, &mut out)
            .expect("decode");

        assert!(key);
        assert_eq!(out, [1, 1, 2, 2]);
    }

    #[test]
    fn it_skips_padding_of_odd_literals() {
        let mut out = [0u8; 7];

        decode_same(&[0, 3, 1, 2, 3, 0, 4, 7, 0, 0, 0, 1], 7, &mut out).expect("decode");

        assert_eq!(out, [1, 2, 3, 7, 7, 7, 7]);
    }

    #[test]
    fn it_applies_deltas_over_the_previous_frame() {
        let mut out = [3u8; 16];

        let key = decode_same(&[0, 2, 2, 1, 1, 5, 0, 0, 0, 1], 4, &mut out).expect("decode");

        assert!(!key);
        assert_eq!(out[2 * 4 + 2], 5);
        assert_eq!(out.iter().filter(|pixel| **pixel == 3).count(), 15);
    }

    #[test]
    fn it_stops_at_skips_for_key_frames_only() {
        let mut out = [3u8; 16];

        let key = decode(&[0, 2, 2, 1, 1, 5, 0, 0, 0, 1], 4, &mut out, |p: u8| p, true)
            .expect("decode");

        assert!(!key);
        assert_eq!(out, [3; 16]);
    }

    #[test]
    fn it_expands_pixels_inline() {
        let mut ops = Vec::new();
        encode::key(&mut ops, &[0x7fffu16, 0x7c00, 0x001f], 3);

        let mut out = [0u32; 3];
        decode(&ops, 3, &mut out, expand_555, false).expect("decode");

        assert_eq!(out, [0xffffff, 0xff0000, 0x0000ff]);
    }

    #[test]
    fn it_reports_corrupt_streams_and_keeps_partial_output() {
        let mut out = [0u8; 4];

        let err = decode_same(&[2, 9, 0, 0, 3, 8], 2, &mut out).expect_err("overflow");
        assert!(matches!(
            err,
            Error::CorruptFrame { x: 0, y: 1, .. }
        ));
        assert_eq!(out, [0, 0, 9, 9]);

        assert!(decode_same(&[0, 5, 1, 2], 2, &mut out).is_err());
        assert!(decode_same(&[4], 2, &mut out).is_err());
        assert!(decode_same(&[0, 0, 0, 0, 1, 1], 2, &mut out).is_err());
    }

    #[test]
    fn it_accepts_streams_without_an_end() {
        let mut out = [0u8; 2];

        assert!(decode_same(&[2, 6], 2, &mut out).expect("decode"));
        assert_eq!(out, [6, 6]);
    }
}
