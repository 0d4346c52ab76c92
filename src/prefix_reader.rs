//! Reads a full prefix-code descriptor (simple or complex) from the bit
//! stream and builds the corresponding [`PrefixCode`].
//!
//! Grounded on `yeast.c`'s `prefix()`, `simple()`, and the complex-descriptor
//! path that decodes a code-length code over a permuted 18-symbol alphabet
//! and then uses it to read the target alphabet's code lengths (with
//! repeat/zero-run symbols 16 and 17).

use crate::bitstream::BitReader;
use crate::error::{safety_check, YeastError, YeastResult};
use crate::prefix_code::{alphabet_bits, code_weight, PrefixCode, SimpleShape};

/// Order in which code-length-code lengths are read for the 18-symbol
/// alphabet `{0..17}`.
const CODE_LENGTH_ORDER: [u8; 18] = [1, 2, 3, 4, 0, 5, 17, 6, 16, 7, 8, 9, 10, 11, 12, 13, 14, 15];

/// Fixed length-of-length code used to read the code-length code's own
/// lengths: `count=[0,0,3,1,2]`, `symbol=[0,3,4,2,1,5]` (max length 5 bits).
fn length_of_length_code() -> PrefixCode {
    // lens[sym] for sym in 0..=5, reconstructed from the fixed count/symbol
    // tables above: three symbols (0,3,4) at length 2, one symbol (2) at
    // length 3, two symbols (1,5) at length 4.
    PrefixCode::from_lengths(&[2, 4, 3, 2, 2, 4])
}

pub fn read_prefix_code(r: &mut BitReader, alphabet_size: usize) -> YeastResult<PrefixCode> {
    let hskip = r.read_bits(2)?;
    if hskip == 1 {
        read_simple(r, alphabet_size)
    } else {
        read_complex(r, hskip, alphabet_size)
    }
}

fn read_simple(r: &mut BitReader, alphabet_size: usize) -> YeastResult<PrefixCode> {
    let nsym = r.read_bits(2)? + 1; // 1..4
    let bits = alphabet_bits(alphabet_size);

    let mut syms = Vec::with_capacity(nsym as usize);
    for _ in 0..nsym {
        let s = r.read_bits(bits)?;
        safety_check!((s as usize) < alphabet_size, "simple prefix code symbol out of range");
        syms.push(s as u16);
    }

    let shape = if nsym == 4 {
        let extra = r.read_bit()?;
        if extra == 0 {
            SimpleShape::FourSymbolsBalanced
        } else {
            SimpleShape::FourSymbolsSkewed
        }
    } else {
        SimpleShape::from_type(nsym)?
    };

    Ok(PrefixCode::from_simple(&syms, shape))
}

fn read_complex(r: &mut BitReader, hskip: u32, alphabet_size: usize) -> YeastResult<PrefixCode> {
    safety_check!(hskip <= 17, "hskip out of range");
    let cl_code = length_of_length_code();

    let mut cl_lens = [0u8; 18];
    let mut budget = 0u32;
    for i in (hskip as usize)..18 {
        let len = cl_code.decode(r)? as u8;
        cl_lens[CODE_LENGTH_ORDER[i] as usize] = len;
        if len != 0 {
            budget += 1u32 << (5 - len);
            if budget >= 32 {
                break;
            }
        }
    }

    let cl_prefix_count = {
        let tmp = PrefixCode::from_lengths(&cl_lens);
        let weight = tmp.weight();
        if weight == 1 << 15 {
            tmp
        } else if weight < (1 << 15) {
            // Incomplete: legal only when exactly one non-zero length was
            // seen, in which case synthesize a single-symbol, zero-bit code
            // for that symbol.
            let nonzero: Vec<usize> = cl_lens
                .iter()
                .enumerate()
                .filter(|&(_, &l)| l != 0)
                .map(|(i, _)| i)
                .collect();
            safety_check!(nonzero.len() == 1, "incomplete code-length code");
            PrefixCode::single_symbol(nonzero[0] as u16)
        } else {
            return Err(YeastError::MalformedStream("oversubscribed code-length code"));
        }
    };

    read_target_lengths(r, &cl_prefix_count, alphabet_size)
}

fn read_target_lengths(
    r: &mut BitReader,
    cl_code: &PrefixCode,
    alphabet_size: usize,
) -> YeastResult<PrefixCode> {
    let mut lens = vec![0u8; alphabet_size];
    let mut remaining_budget: i64 = 1 << 15;
    let mut prev_nonzero: u8 = 8;
    // Previous chained repeat count for symbol 16 / symbol 17 respectively
    // (not the code length): any symbol other than 16 resets the former,
    // any symbol other than 17 resets the latter.
    let mut prev_repeat_count: u32 = 0;
    let mut prev_zero_count: u32 = 0;
    let mut i = 0usize;

    while i < alphabet_size && remaining_budget > 0 {
        let sym = cl_code.decode(r)?;
        match sym {
            0..=15 => {
                let len = sym as u8;
                lens[i] = len;
                if len != 0 {
                    remaining_budget -= 1i64 << (15 - len);
                    prev_nonzero = len;
                }
                prev_repeat_count = 0;
                prev_zero_count = 0;
                i += 1;
            }
            16 => {
                let extra = r.read_bits(2)?;
                let rep = (prev_repeat_count.saturating_sub(2) << 2) + 3 + extra;
                safety_check!(i + rep as usize <= alphabet_size, "code-length repeat overruns alphabet");
                let len = prev_nonzero;
                for _ in 0..rep {
                    lens[i] = len;
                    remaining_budget -= 1i64 << (15 - len);
                    i += 1;
                }
                prev_repeat_count = rep;
                prev_zero_count = 0;
            }
            17 => {
                let extra = r.read_bits(3)?;
                let rep = (prev_zero_count.saturating_sub(2) << 3) + 3 + extra;
                safety_check!(i + rep as usize <= alphabet_size, "code-length zero-run overruns alphabet");
                i += rep as usize;
                prev_zero_count = rep;
                prev_repeat_count = 0;
            }
            _ => return Err(YeastError::MalformedStream("invalid code-length symbol")),
        }
        safety_check!(remaining_budget >= 0, "code-length budget overshoot");
    }

    safety_check!(remaining_budget == 0, "incomplete target alphabet code");
    let weight = code_weight(&{
        let mut count = [0u16; 16];
        for &l in &lens {
            count[l as usize] += 1;
        }
        count
    });
    safety_check!(weight == 1 << 15, "target alphabet code incomplete or oversubscribed");

    Ok(PrefixCode::from_lengths(&lens))
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
    fn simple_one_symbol_roundtrip() {
        // hskip=1 (simple), nsym-1=0 -> nsym=1, symbol bits = ceil(log2(4)) = 2, value=2
        let data = encode_bits(&[(1, 2), (0, 2), (2, 2)]);
        let mut r = BitReader::new(&data);
        let code = read_prefix_code(&mut r, 4).unwrap();
        assert!(code.is_degenerate());

        let data2 = encode_bits(&[(0, 3)]);
        let mut r2 = BitReader::new(&data2);
        assert_eq!(code.decode(&mut r2).unwrap(), 2);
    }

    #[test]
    fn chained_repeat_uses_previous_repeat_count_not_code_length() {
        // Code-length code (18-symbol alphabet) assigning a shared 3-bit
        // code to exactly the 7 symbols this test needs: literals 1, 2, 3,
        // 4, 6, 7, and repeat-symbol 16. Ascending numeric order within the
        // shared length-3 bucket assigns codewords 0..6 in turn: symbol 1 ->
        // 000, 2 -> 001, 3 -> 010, 4 -> 011, 6 -> 100, 7 -> 101, 16 -> 110.
        let mut cl_lens = [0u8; 18];
        for &s in &[1u8, 2, 3, 4, 6, 7, 16] {
            cl_lens[s as usize] = 3;
        }
        let cl_code = PrefixCode::from_lengths(&cl_lens);

        // First repeat (symbol 16, extra=0): prev_nonzero defaults to 8, no
        // chain yet, so rep = 3 + 0 = 3 (target positions 0..2 at length 8).
        // Second repeat (symbol 16, extra=0), chained: must use the
        // *previous repeat count* (3), not the code length (8):
        // rep = (3-2)<<2 + 3 + 0 = 7 (target positions 3..9 at length 8).
        // Using the code length instead (the pre-fix bug) computes
        // (8-2)<<2 + 3 + 0 = 27, which overruns the 16-symbol target
        // alphabet below and would error out instead of completing.
        // The remaining 6 slots are closed out exactly with one literal
        // length apiece (7, 6, 4, 3, 2, 1), whose budget contributions are
        // chosen to sum the remaining Kraft budget to zero precisely.
        let data = encode_bits(&[
            (1, 1), (1, 1), (0, 1), (0, 2), // 16, extra=0 -> rep=3
            (1, 1), (1, 1), (0, 1), (0, 2), // 16, extra=0 -> chained rep=7
            (1, 1), (0, 1), (1, 1), // literal 7
            (1, 1), (0, 1), (0, 1), // literal 6
            (0, 1), (1, 1), (1, 1), // literal 4
            (0, 1), (1, 1), (0, 1), // literal 3
            (0, 1), (0, 1), (1, 1), // literal 2
            (0, 1), (0, 1), (0, 1), // literal 1
        ]);
        let mut r = BitReader::new(&data);
        let code = read_target_lengths(&mut r, &cl_code, 16).unwrap();
        assert_eq!(code.weight(), 1 << 15);
    }

    #[test]
    fn simple_four_symbol_balanced_shape() {
        // hskip=1, nsym-1=3 -> nsym=4, 2-bit symbols (alphabet size 4): 0,1,2,3, extra bit=0 -> balanced
        let data = encode_bits(&[(1, 2), (3, 2), (0, 2), (1, 2), (2, 2), (3, 2), (0, 1)]);
        let mut r = BitReader::new(&data);
        let code = read_prefix_code(&mut r, 4).unwrap();
        assert_eq!(code.weight(), 1 << 15);
    }
}
