//! Meta-block decoding: header state machine plus the command loop that
//! turns insert-and-copy symbols into output bytes.
//!
//! Grounded on `yeast.c`'s meta-block reader, the single largest routine in
//! the reference decoder. Kept as one state struct threaded through a
//! header phase and a data phase, the same two-phase split `yeast.c` uses.

use crate::alphabet::{
    block_length, block_type_count, distance_context_id, insert_and_copy, literal_context_id,
    DistanceRing, LiteralContextMode,
};
use crate::bitstream::BitReader;
use crate::context_map::read_context_map;
use crate::error::{safety_check, YeastError, YeastResult};
use crate::prefix_code::PrefixCode;
use crate::prefix_reader::read_prefix_code;
use crate::sink::Sink;
use crate::static_dict;

/// Tracks one of the three per-meta-block alphabets' block-type cycling.
struct BlockTracker {
    num_types: u32,
    current: u32,
    previous: u32,
    remaining: u32,
    type_code: Option<PrefixCode>,
    length_code: Option<PrefixCode>,
}

impl BlockTracker {
    fn single_type() -> Self {
        Self {
            num_types: 1,
            current: 0,
            previous: 0,
            remaining: u32::MAX,
            type_code: None,
            length_code: None,
        }
    }

    fn read(r: &mut BitReader) -> YeastResult<Self> {
        let num_types = block_type_count(r)?;
        if num_types == 1 {
            return Ok(Self::single_type());
        }
        let type_code = read_prefix_code(r, num_types as usize + 2)?;
        let length_code = read_prefix_code(r, 26)?;
        let initial_len = block_length(r, length_code.decode(r)?)?;
        Ok(Self {
            num_types,
            current: 0,
            previous: 0,
            remaining: initial_len,
            type_code: Some(type_code),
            length_code: Some(length_code),
        })
    }

    /// Advances to the next block (reading a new type and length) if the
    /// current block is exhausted. No-op for single-type alphabets.
    fn advance_if_needed(&mut self, r: &mut BitReader) -> YeastResult<()> {
        if self.remaining != 0 || self.num_types == 1 {
            return Ok(());
        }
        let type_code = self.type_code.as_ref().unwrap();
        let t = type_code.decode(r)?;
        let new_type = if t > 1 {
            (t - 2) as u32
        } else if t == 1 {
            (self.current + 1) % self.num_types
        } else {
            self.previous
        };
        self.previous = self.current;
        self.current = new_type;
        let length_code = self.length_code.as_ref().unwrap();
        self.remaining = block_length(r, length_code.decode(r)?)?;
        Ok(())
    }

    fn tick(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
    }
}

pub struct MetaBlockState {
    literal: BlockTracker,
    iac: BlockTracker,
    distance: BlockTracker,

    postfix: u32,
    direct: u32,
    distance_alphabet_size: usize,

    literal_modes: Vec<LiteralContextMode>,
    literal_context_map: Vec<u8>,
    distance_context_map: Vec<u8>,

    literal_codes: Vec<PrefixCode>,
    iac_codes: Vec<PrefixCode>,
    distance_codes: Vec<PrefixCode>,
}

impl MetaBlockState {
    fn read_header(r: &mut BitReader) -> YeastResult<Self> {
        let literal = BlockTracker::read(r)?;
        let iac = BlockTracker::read(r)?;
        let distance = BlockTracker::read(r)?;

        let postfix = r.read_bits(2)?;
        let n_direct = r.read_bits(4)?;
        let direct = n_direct << postfix;
        let distance_alphabet_size = (16 + direct + (48 << postfix)) as usize;

        let mut literal_modes = Vec::with_capacity(literal.num_types as usize);
        for _ in 0..literal.num_types {
            literal_modes.push(LiteralContextMode::from_bits(r.read_bits(2)?));
        }

        let num_lit_codes = block_type_count(r)?;
        let literal_context_map = if num_lit_codes > 1 {
            read_context_map(r, literal.num_types as usize * 64, num_lit_codes as usize)?
        } else {
            vec![0u8; literal.num_types as usize * 64]
        };

        let num_dist_codes = block_type_count(r)?;
        let distance_context_map = if num_dist_codes > 1 {
            read_context_map(r, distance.num_types as usize * 4, num_dist_codes as usize)?
        } else {
            vec![0u8; distance.num_types as usize * 4]
        };

        let mut literal_codes = Vec::with_capacity(num_lit_codes as usize);
        for _ in 0..num_lit_codes {
            literal_codes.push(read_prefix_code(r, 256)?);
        }

        let mut iac_codes = Vec::with_capacity(iac.num_types as usize);
        for _ in 0..iac.num_types {
            iac_codes.push(read_prefix_code(r, 704)?);
        }

        let mut distance_codes = Vec::with_capacity(num_dist_codes as usize);
        for _ in 0..num_dist_codes {
            distance_codes.push(read_prefix_code(r, distance_alphabet_size)?);
        }

        Ok(Self {
            literal,
            iac,
            distance,
            postfix,
            direct,
            distance_alphabet_size,
            literal_modes,
            literal_context_map,
            distance_context_map,
            literal_codes,
            iac_codes,
            distance_codes,
        })
    }
}

/// Result of reading a meta-block header: either real compressed/uncompressed
/// content, or one of the two header-only terminal forms.
enum MetaBlockHeader {
    EmptyLast,
    Uncompressed { len: u32 },
    MetadataSkip { len: u32 },
    Compressed { mlen: u32, state: MetaBlockState },
}

fn read_mlen_nibbles(r: &mut BitReader, nibbles: u32) -> YeastResult<u32> {
    let bits = nibbles * 4;
    let raw = r.read_bits(bits)?;
    if nibbles > 4 {
        // mnibblesSel selected 2 (nibbles=6): top nibble must be non-zero.
        safety_check!((raw >> (bits - 4)) != 0, "unneeded leading nibble in length field");
    }
    Ok(raw + 1)
}

fn read_header(r: &mut BitReader, is_last_known: Option<bool>) -> YeastResult<(bool, MetaBlockHeader)> {
    let is_last = match is_last_known {
        Some(v) => v,
        None => r.read_bit()? != 0,
    };

    if is_last {
        let is_empty = r.read_bit()? != 0;
        if is_empty {
            return Ok((true, MetaBlockHeader::EmptyLast));
        }
    }

    let mnibbles_sel = r.read_bits(2)?;
    if mnibbles_sel == 3 {
        let reserved = r.read_bit()?;
        safety_check!(reserved == 0, "reserved metadata bit set");
        let mskipbytes = r.read_bits(2)?;
        let len = if mskipbytes == 0 {
            0
        } else {
            let raw = r.read_bits(mskipbytes * 8)?;
            if mskipbytes > 1 {
                safety_check!((raw >> ((mskipbytes - 1) * 8)) != 0, "unneeded leading byte in metadata length");
            }
            raw + 1
        };
        r.align_to_byte()?;
        return Ok((is_last, MetaBlockHeader::MetadataSkip { len }));
    }

    let mlen = read_mlen_nibbles(r, mnibbles_sel + 4)?;

    if !is_last {
        let is_uncompressed = r.read_bit()? != 0;
        if is_uncompressed {
            r.align_to_byte()?;
            return Ok((is_last, MetaBlockHeader::Uncompressed { len: mlen }));
        }
    }

    let state = MetaBlockState::read_header(r)?;
    Ok((is_last, MetaBlockHeader::Compressed { mlen, state }))
}

/// Decodes exactly one meta-block, writing bytes to `sink`. Returns whether
/// this was the last meta-block in the stream.
pub fn decode_meta_block(r: &mut BitReader, sink: &mut dyn Sink, ring: &mut DistanceRing, wsize: usize) -> YeastResult<bool> {
    let (is_last, header) = read_header(r, None)?;

    match header {
        MetaBlockHeader::EmptyLast => Ok(true),
        MetaBlockHeader::MetadataSkip { len } => {
            r.read_aligned_bytes(len as usize)?;
            Ok(is_last)
        }
        MetaBlockHeader::Uncompressed { len } => {
            let bytes = r.read_aligned_bytes(len as usize)?;
            sink.copy_slice(bytes)?;
            Ok(is_last)
        }
        MetaBlockHeader::Compressed { mlen, mut state } => {
            run_data_loop(r, sink, ring, wsize, mlen, &mut state)?;
            Ok(is_last)
        }
    }
}

fn run_data_loop(
    r: &mut BitReader,
    sink: &mut dyn Sink,
    ring: &mut DistanceRing,
    wsize: usize,
    mlen: u32,
    state: &mut MetaBlockState,
) -> YeastResult<()> {
    let base = sink.len();
    let target = base + mlen as usize;

    while sink.len() < target {
        state.iac.advance_if_needed(r)?;
        let iac_code = &state.iac_codes[state.iac.current as usize];
        let s = iac_code.decode(r)?;
        state.iac.tick();

        let split = insert_and_copy(r, s)?;

        for _ in 0..split.insert_length {
            safety_check!(sink.len() < target, "insertion overruns meta-block length");
            state.literal.advance_if_needed(r)?;

            let p1 = if sink.len() > 0 { sink.byte_at(sink.len() - 1) } else { 0 };
            let p2 = if sink.len() > 1 { sink.byte_at(sink.len() - 2) } else { 0 };
            let mode = state.literal_modes[state.literal.current as usize];
            let ctx = literal_context_id(p1, p2, mode);
            let map_idx = (state.literal.current as usize) * 64 + ctx as usize;
            let code_idx = state.literal_context_map[map_idx] as usize;
            let byte = state.literal_codes[code_idx].decode(r)? as u8;
            sink.push(byte)?;
            state.literal.tick();
        }

        if sink.len() >= target {
            return Ok(());
        }

        let copy_length = split.copy_length;
        let max = sink.len().min(wsize);

        let distance = if split.reuse_last_distance {
            ring.head() as i64
        } else {
            state.distance.advance_if_needed(r)?;
            let dctx = distance_context_id(copy_length);
            let map_idx = (state.distance.current as usize) * 4 + dctx as usize;
            let code_idx = state.distance_context_map[map_idx] as usize;
            let d = state.distance_codes[code_idx].decode(r)?;
            state.distance.tick();
            let dist = ring.resolve(r, d as u32, state.direct, state.postfix)?;
            safety_check!(dist > 0, "signed distance underflowed to non-positive value");
            if (dist as u64) <= max as u64 {
                ring.update(d as u32, dist as u32);
            }
            dist
        };

        if (distance as u64) > max as u64 {
            safety_check!((4..=24).contains(&copy_length), "static dictionary copy length out of range");
            let id = distance as u64 - max as u64 - 1;
            let ndbits = static_dict::ndbits(copy_length as usize)?;
            let mask = (1u64 << ndbits) - 1;
            let index = (id & mask) as u32;
            let xform_idx = (id >> ndbits) as usize;
            safety_check!(xform_idx < static_dict::NUM_TRANSFORMS, "transform index out of range");
            let word = static_dict::dict_lookup(copy_length as usize, index)?;
            let transform = static_dict::transform(xform_idx)?;
            let mut out = Vec::with_capacity(37);
            static_dict::apply_transform(transform, word, &mut out)?;
            safety_check!(sink.len() + out.len() <= target, "static dictionary copy overruns meta-block length");
            sink.copy_slice(&out)?;
        } else {
            safety_check!(sink.len() + copy_length as usize <= target, "in-window copy overruns meta-block length");
            sink.copy_back(distance as usize, copy_length as usize)?;
        }
    }

    if sink.len() != target {
        return Err(YeastError::MalformedStream("meta-block did not produce exactly mlen bytes"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::AllocatingSink;

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
    fn empty_last_meta_block() {
        // isLast=1, isEmpty=1
        let data = encode_bits(&[(1, 1), (1, 1)]);
        let mut r = BitReader::new(&data);
        let mut sink = AllocatingSink::new();
        let mut ring = DistanceRing::new();
        let is_last = decode_meta_block(&mut r, &mut sink, &mut ring, 1 << 20).unwrap();
        assert!(is_last);
        assert_eq!(sink.len(), 0);
    }

    #[test]
    fn uncompressed_one_byte_meta_block() {
        // isLast=0, mnibblesSel=0 (4 nibbles), mlen-1=0 (16 bits of zero), isUncompressed=1,
        // 4 zero padding bits to reach the next byte boundary, then byte 'A'.
        let data = encode_bits(&[(0, 1), (0, 2), (0, 16), (1, 1), (0, 4), (b'A' as u32, 8)]);
        let mut r = BitReader::new(&data);
        let mut sink = AllocatingSink::new();
        let mut ring = DistanceRing::new();
        let is_last = decode_meta_block(&mut r, &mut sink, &mut ring, 1 << 20).unwrap();
        assert!(!is_last);
        assert_eq!(sink.into_inner(), b"A".to_vec());
    }
}
