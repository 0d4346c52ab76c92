//! Context-map decoding: run-length-encoded symbols over an inverse
//! move-to-front transform.
//!
//! Grounded on `yeast.c`'s context-map reader, which layers an RLE pass
//! (symbols `1..=rlemax` mean "`2^symbol + extra` zeros", reusing the prefix
//! code's own alphabet rather than a side channel) under an inverse MTF pass
//! applied to the whole decoded array afterward.

use crate::bitstream::BitReader;
use crate::error::{safety_check, YeastResult};
use crate::prefix_reader::read_prefix_code;

/// Reads a context map of `length` entries over `num_trees` possible values.
///
/// Layout: one bit selecting `rlemax` (0 directly, or 4 more bits giving
/// `1+r`), a prefix code over alphabet `num_trees + rlemax` (the real values
/// shifted up by `rlemax` RLE escape symbols), then `length` decoded
/// raw-or-run symbols expanding to exactly `length` entries, optionally
/// followed by an inverse MTF pass.
pub fn read_context_map(r: &mut BitReader, length: usize, num_trees: usize) -> YeastResult<Vec<u8>> {
    let rlemax = if r.read_bit()? == 0 {
        0
    } else {
        1 + r.read_bits(4)?
    } as usize;

    let code = read_prefix_code(r, num_trees + rlemax)?;
    let mut out = Vec::with_capacity(length);

    while out.len() < length {
        let sym = code.decode(r)? as usize;
        if sym == 0 {
            out.push(0);
        } else if sym <= rlemax {
            let extra = r.read_bits(sym as u32)?;
            let run = (1u32 << sym) + extra;
            safety_check!(out.len() + run as usize <= length, "context map RLE run overruns length");
            for _ in 0..run {
                out.push(0);
            }
        } else {
            safety_check!(sym - rlemax < num_trees, "context map symbol out of range");
            out.push((sym - rlemax) as u8);
        }
    }

    let imtf = r.read_bit()? != 0;
    if imtf {
        inverse_move_to_front(&mut out);
    }

    Ok(out)
}

/// Replaces each entry with the value at that index in a move-to-front list
/// seeded as `[0, 1, 2, ...]`. Each lookup rotates the resolved value to
/// front position, shifting every entry ahead of it back by one (not a
/// two-element swap with the old front value).
fn inverse_move_to_front(values: &mut [u8]) {
    let mut mtf: Vec<u8> = (0..=255u16).map(|v| v as u8).collect();
    for v in values.iter_mut() {
        let idx = *v as usize;
        let resolved = mtf[idx];
        mtf.copy_within(0..idx, 1);
        mtf[0] = resolved;
        *v = resolved;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_bits(bits: &[(u32, u32)]) -> Vec<u8> {
        let mut buf = 0u64;
        let mut nbits = 0u32;
        let mut out = Vec::new();
        for &(value, n) in bits {
            buf |= (value as u64) << nbits;
            nbits += n;
            while nbits >= 8 {
                out.push((buf & 0xFF) as u8);
                buf >>= 8;
                nbits -= 8;
            }
        }
        if nbits > 0 {
            out.push((buf & 0xFF) as u8);
        }
        out
    }

    #[test]
    fn context_map_respects_leading_rlemax_and_run_length_formula() {
        // rlemax selector bit=1, then 4 bits value=1 -> rlemax = 1+1 = 2.
        // num_trees=3 -> alphabet = num_trees + rlemax = 5 (ceil(log2(5)) =
        // 3-bit simple-descriptor symbol fields). A prefix-code alphabet
        // built from a hardcoded `num_trees + 16` size would instead expect
        // 5-bit symbol fields here and misparse this bitstream entirely.
        //
        // Simple descriptor (hskip=1), 3 symbols {0, 2, 4} (shape
        // ThreeSymbols: lengths 1,2,2 -> symbol 0 -> codeword "0", symbol 2
        // -> "10", symbol 4 -> "11"):
        //   symbol 0: literal entry 0
        //   symbol 2 (<= rlemax): RLE run = (1<<2) + readBits(2)
        //   symbol 4 (> rlemax): literal entry = 4 - rlemax = 2
        let data = encode_bits(&[
            (1, 1), (1, 4), // rlemax = 2
            (1, 2), (2, 2), // hskip=1 (simple), nsym-1=2 -> nsym=3
            (0, 3), (2, 3), (4, 3), // symbols 0, 2, 4
            (0, 1), // decode symbol 0 -> literal 0
            (1, 1), (0, 1), // decode symbol 2 -> RLE
            (1, 2), // extra=1 -> run = 4 + 1 = 5
            (1, 1), (1, 1), // decode symbol 4 -> literal entry 2
            (0, 1), // decode symbol 0 -> literal 0
            (0, 1), // imtf = 0
        ]);
        let mut r = BitReader::new(&data);
        let out = read_context_map(&mut r, 8, 3).unwrap();
        assert_eq!(out, vec![0, 0, 0, 0, 0, 0, 2, 0]);
    }

    #[test]
    fn imtf_boundary_scenario_one() {
        let mut v = vec![0u8, 1, 2, 0];
        inverse_move_to_front(&mut v);
        assert_eq!(v, vec![0, 1, 2, 2]);
    }

    #[test]
    fn imtf_boundary_scenario_two() {
        let mut v = vec![1u8, 0, 2, 1];
        inverse_move_to_front(&mut v);
        assert_eq!(v, vec![1, 1, 2, 1]);
    }

    #[test]
    fn imtf_rotates_rather_than_swaps() {
        // A full rotate shifts every entry ahead of the resolved index back
        // by one; a two-element swap only trades the resolved slot with
        // front. These diverge as soon as an index >= 2 is looked up twice.
        let mut v = vec![2u8, 1];
        inverse_move_to_front(&mut v);
        assert_eq!(v, vec![2, 0]);
    }
}
