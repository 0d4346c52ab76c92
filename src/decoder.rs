//! Top-level driver: window-size preamble, meta-block loop, and the two
//! decode entry points (allocate vs. compare).
//!
//! Grounded on `yeast.c`'s outermost `decode()` function.

use crate::alphabet::DistanceRing;
use crate::bitstream::BitReader;
use crate::error::{safety_check, YeastResult};
use crate::metablock::decode_meta_block;
use crate::sink::{AllocatingSink, ComparingSink, Sink};

/// Reads the one-to-seven-bit WBITS preamble and returns the window size in
/// bytes (`2^wbits - 16`).
fn read_window_size(r: &mut BitReader) -> YeastResult<usize> {
    let wbits = if r.read_bit()? == 0 {
        16
    } else {
        let b1 = r.read_bits(3)?;
        if b1 != 0 {
            17 + b1
        } else {
            let b2 = r.read_bits(3)?;
            if b2 != 0 {
                8 + b2
            } else {
                17
            }
        }
    };
    safety_check!(wbits != 9, "reserved window size 9");
    safety_check!((10..=24).contains(&wbits), "window size out of range");
    Ok((1usize << wbits) - 16)
}

fn run(r: &mut BitReader, sink: &mut dyn Sink) -> YeastResult<()> {
    let wsize = read_window_size(r)?;
    let mut ring = DistanceRing::new();
    loop {
        let is_last = decode_meta_block(r, sink, &mut ring, wsize)?;
        log::trace!("meta-block decoded, output len now {}", sink.len());
        if is_last {
            return Ok(());
        }
    }
}

/// Decodes `compressed` into a freshly allocated buffer.
pub fn decode(compressed: &[u8]) -> YeastResult<Vec<u8>> {
    let mut r = BitReader::new(compressed);
    let mut sink = AllocatingSink::new();
    run(&mut r, &mut sink)?;
    Ok(sink.into_inner())
}

/// Decodes `compressed`, comparing every produced byte against `expected`
/// instead of retaining it. Returns `Ok(())` only if the full expected
/// buffer was produced and matched exactly.
pub fn decode_compare(compressed: &[u8], expected: &[u8]) -> YeastResult<()> {
    let mut r = BitReader::new(compressed);
    let mut sink = ComparingSink::new(expected);
    run(&mut r, &mut sink)?;
    safety_check!(sink.len() == expected.len(), "decoded output shorter than expected buffer");
    Ok(())
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
    fn empty_last_meta_block_end_to_end() {
        // wbits preamble: bit 0 -> wbits=16. Then isLast=1, isEmpty=1.
        let data = encode_bits(&[(0, 1), (1, 1), (1, 1)]);
        let out = decode(&data).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn reserved_window_size_nine_is_rejected() {
        // bit1=1, b1=3 bits value 0 -> falls to b2 path; b2=1 -> wbits = 8+1 = 9, reserved.
        let data = encode_bits(&[(1, 1), (0, 3), (1, 3)]);
        let mut r = BitReader::new(&data);
        assert!(read_window_size(&mut r).is_err());
    }
}
