//! Opcode stream encoders, before the deflate pass.
//!
//! Pixel slices are top-down and row-major, rows are emitted bottom row first.

use super::{pixel::Pixel, EOB, EOL, ESCAPE, SKIP};

/// Shortest run worth a repeat opcode.
const MIN_REPEAT: usize = 3;

/// Longest run of a repeat or a literal opcode, literals are kept even for 8-bit pixels.
const MAX_REPEAT: usize = 255;
const MAX_LITERAL: usize = 254;

/// Unchanged spans shorter than this are re-emitted as literals inside a changed span.
const MIN_SKIP: usize = 4;

/// Encode a key frame, which does not depend on any previous frame.
pub fn key<P: Pixel>(out: &mut Vec<u8>, pixels: &[P], width: usize) {
    if width > 0 {
        for row in pixels.chunks_exact(width).rev() {
            let mut start = 0;
            let mut x = 0;

            while x < row.len() {
                let run = repeat_len(&row[x..]);

                if run >= MIN_REPEAT {
                    literal(out, &row[start..x]);
                    repeat(out, run, row[x]);
                    start = x + run;
                }

                x += run;
            }

            literal(out, &row[start..]);
            out.extend_from_slice(&[ESCAPE, EOL]);
        }
    }

    out.extend_from_slice(&[ESCAPE, EOB]);
}

/// Encode a delta frame against `prev`, only emitting the pixels that changed.
pub fn delta<P: Pixel>(out: &mut Vec<u8>, pixels: &[P], prev: &[P], width: usize) {
    if width > 0 {
        let mut vertical = 0;

        for (row, prev) in pixels
            .chunks_exact(width)
            .zip(prev.chunks_exact(width))
            .rev()
        {
            let mut x = unchanged_len(row, prev);
            if x == width {
                vertical += 1;

                continue;
            }

            skip(out, x, vertical);
            vertical = 0;

            let mut start = x;
            while x < width {
                let unchanged = unchanged_len(&row[x..], &prev[x..]);
                let run = repeat_len(&row[x..]);

                if unchanged < MIN_SKIP && x + unchanged < width && run < MIN_REPEAT {
                    x += 1;

                    continue;
                }

                literal(out, &row[start..x]);

                if x + unchanged == width {
                    x = width;
                } else if unchanged >= run {
                    skip(out, unchanged, 0);
                    x += unchanged;
                } else {
                    repeat(out, run, row[x]);
                    x += run;
                }

                start = x;
            }

            literal(out, &row[start..x]);
            out.extend_from_slice(&[ESCAPE, EOL]);
        }
    }

    out.extend_from_slice(&[ESCAPE, EOB]);
}

/// Encode a frame identical to the previous one.
pub fn same(out: &mut Vec<u8>) {
    out.extend_from_slice(&[ESCAPE, EOB]);
}

fn repeat_len<P: Pixel>(pixels: &[P]) -> usize {
    pixels
        .iter()
        .take(MAX_REPEAT)
        .take_while(|pixel| **pixel == pixels[0])
        .count()
}

fn unchanged_len<P: Pixel>(pixels: &[P], prev: &[P]) -> usize {
    pixels
        .iter()
        .zip(prev)
        .take_while(|(pixel, prev)| pixel == prev)
        .count()
}

fn repeat<P: Pixel>(out: &mut Vec<u8>, count: usize, pixel: P) {
    out.push(count as u8);
    pixel.put(out);
}

fn skip(out: &mut Vec<u8>, mut dx: usize, mut dy: usize) {
    while dx > 0 || dy > 0 {
        let (x, y) = (dx.min(u8::MAX as usize), dy.min(u8::MAX as usize));
        out.extend_from_slice(&[ESCAPE, SKIP, x as u8, y as u8]);

        dx -= x;
        dy -= y;
    }
}

fn literal<P: Pixel>(out: &mut Vec<u8>, pixels: &[P]) {
    for chunk in pixels.chunks(MAX_LITERAL) {
        if chunk.len() < MIN_REPEAT {
            for pixel in chunk {
                repeat(out, 1, *pixel);
            }

            continue;
        }

        out.extend_from_slice(&[ESCAPE, chunk.len() as u8]);
        for pixel in chunk {
            pixel.put(out);
        }

        if P::BYTES == 1 && chunk.len() % 2 == 1 {
            out.push(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_encodes_key_frames_bottom_up() {
        let mut out = Vec::new();
        key(&mut out, &[1u8, 1, 2, 2], 2);

        assert_eq!(out, [1, 2, 1, 2, 0, 0, 1, 1, 1, 1, 0, 0, 0, 1]);
    }

    #[test]
    fn it_mixes_repeats_and_padded_literals() {
        let mut out = Vec::new();
        key(&mut out, &[1u8, 2, 3, 7, 7, 7, 7], 7);

        assert_eq!(out, [0, 3, 1, 2, 3, 0, 4, 7, 0, 0, 0, 1]);

        let mut out = Vec::new();
        key(&mut out, &[1u16, 2, 3], 3);

        assert_eq!(out, [0, 3, 1, 0, 2, 0, 3, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn it_splits_long_runs() {
        let mut out = Vec::new();
        key(&mut out, &[9u8; 300], 300);

        assert_eq!(out, [255, 9, 45, 9, 0, 0, 0, 1]);

        let row = (0..300).map(|x| x as u16).collect::<Vec<_>>();
        let mut out = Vec::new();
        key(&mut out, &row, 300);

        assert_eq!(&out[..2], [0, 254]);
        assert_eq!(&out[2 + 254 * 2..2 + 254 * 2 + 2], [0, 46]);
    }

    #[test]
    fn it_only_emits_changed_pixels() {
        let prev = [0u8; 16];
        let mut pixels = prev;
        pixels[2 * 4 + 2] = 5;

        let mut out = Vec::new();
        delta(&mut out, &pixels, &prev, 4);

        assert_eq!(out, [0, 2, 2, 1, 1, 5, 0, 0, 0, 1]);
    }

    #[test]
    fn it_coalesces_long_skips() {
        let prev = vec![0u8; 600 * 300];
        let mut pixels = prev.clone();
        pixels[0] = 1;

        let mut out = Vec::new();
        delta(&mut out, &pixels, &prev, 600);

        assert_eq!(
            out,
            [0, 2, 0, 255, 0, 2, 0, 44, 1, 1, 0, 0, 0, 1],
        );
    }

    #[test]
    fn it_skips_unchanged_spans_inside_a_row() {
        let prev = [0u8; 12];
        let pixels = [1u8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2];

        let mut out = Vec::new();
        delta(&mut out, &pixels, &prev, 12);

        assert_eq!(out, [1, 1, 0, 2, 10, 0, 1, 2, 0, 0, 0, 1]);
    }

    #[test]
    fn it_emits_a_lone_end_for_same_frames() {
        let mut out = Vec::new();
        same(&mut out);

        assert_eq!(out, [0, 1]);
    }
}
