//! The Byte-Run1 (PackBits) run-length codec, as used by ILBM bodies.
//!
//! Each run starts with a signed header byte `n`:
//! - `0..=127`: copy the next `n + 1` bytes literally,
//! - `-127..=-1`: repeat the next byte `-n + 1` times,
//! - `-128`: no-op.

use itertools::Itertools;

use crate::{Error, Result};

/// The longest run a single header can describe.
const MAX_RUN: usize = 128;

/// Shorter repeats are folded into literal runs, a 2-byte repeat costs as much as it saves.
const MIN_REPEAT: usize = 3;

/// Run-length encode `data`.
///
/// The output carries no length, the decoder needs to know the decoded size in advance.
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / MAX_RUN + 1);
    let mut literal = Vec::with_capacity(MAX_RUN);

    for (mut count, &byte) in data.iter().dedup_with_count() {
        while count >= MIN_REPEAT {
            flush(&mut out, &mut literal);

            let run = count.min(MAX_RUN);
            out.push((1 - run as i16) as u8);
            out.push(byte);

            count -= run;
        }

        for _ in 0..count {
            literal.push(byte);

            if literal.len() == MAX_RUN {
                flush(&mut out, &mut literal);
            }
        }
    }

    flush(&mut out, &mut literal);

    out
}

fn flush(out: &mut Vec<u8>, literal: &mut Vec<u8>) {
    if literal.is_empty() {
        return;
    }

    out.push((literal.len() - 1) as u8);
    out.append(literal);
}

/// Decode `data` until `out` is full, returning the number of input bytes consumed.
///
/// Runs overflowing `out` are truncated to fit, input ending before `out` is full
/// is reported as [`Error::Corrupt`], with the bytes decoded so far left in `out`.
pub fn decode(data: &[u8], out: &mut [u8]) -> Result<usize> {
    let (mut src, mut dst) = (0, 0);

    while dst < out.len() {
        let &header = data
            .get(src)
            .ok_or(Error::Corrupt("byte-run ended before its output"))?;
        src += 1;

        match header as i8 {
            -128 => {}
            n @ 0..=127 => {
                let len = (n as usize + 1).min(out.len() - dst);
                let literal = data
                    .get(src..src + len)
                    .ok_or(Error::Corrupt("literal run past the end of the input"))?;

                out[dst..dst + len].copy_from_slice(literal);
                src += n as usize + 1;
                dst += len;
            }
            n => {
                let len = (1 - n as isize) as usize;
                let len = len.min(out.len() - dst);
                let &byte = data
                    .get(src)
                    .ok_or(Error::Corrupt("repeat run past the end of the input"))?;

                out[dst..dst + len].fill(byte);
                src += 1;
                dst += len;
            }
        }
    }

    Ok(src.min(data.len()))
}

/// Decode `data` into a freshly allocated buffer of `len` bytes.
pub fn decode_to_vec(data: &[u8], len: usize) -> Result<Vec<u8>> {
    let mut out = vec![0; len];
    decode(data, &mut out)?;

    Ok(out)
}
