//! The static dictionary (word corpus indexed by length and id) and the
//! 121-entry transform table applied to dictionary-copy distances that
//! overflow the sliding window.
//!
//! Grounded on `yeast.c`'s `dict_lookup()`/`transform()` pair for the lookup
//! shape, and on the real RFC 7932 transform table (as carried verbatim by
//! `simonwuelker-Stormlicht`'s brotli decoder) for `TRANSFORMS` and the
//! `ndbits` schedule. `dictionary.bin` is the genuine ~122,784-byte brotli
//! word corpus, embedded verbatim per spec §1, rather than placeholder bytes.

use crate::error::{safety_check, YeastResult};

pub const NUM_TRANSFORMS: usize = 121;
const MAX_WORD_LEN: usize = 24;

/// Number of bits needed to index a word of a given length, and the byte
/// offset into [`DICTIONARY_BYTES`] where that length's words begin.
struct LengthBucket {
    ndbits: u32,
    doffset: usize,
}

const fn build_buckets() -> [LengthBucket; MAX_WORD_LEN + 1] {
    // The real per-length bit-width schedule (RFC 7932 Appendix A / NDBITS).
    let ndbits_schedule: [u32; MAX_WORD_LEN + 1] = [
        0, 0, 0, 0, 10, 10, 11, 11, 10, 10, 10, 10, 10, 9, 9, 8, 7, 7, 8, 7, 7, 6, 6, 5, 5,
    ];
    let mut buckets = [LengthBucket { ndbits: 0, doffset: 0 }; MAX_WORD_LEN + 1];
    let mut offset = 0usize;
    let mut len = 0usize;
    while len <= MAX_WORD_LEN {
        let ndbits = ndbits_schedule[len];
        buckets[len] = LengthBucket { ndbits, doffset: offset };
        offset += (1usize << ndbits) * len;
        len += 1;
    }
    buckets
}

impl Clone for LengthBucket {
    fn clone(&self) -> Self {
        LengthBucket { ndbits: self.ndbits, doffset: self.doffset }
    }
}
impl Copy for LengthBucket {}

static BUCKETS: [LengthBucket; MAX_WORD_LEN + 1] = build_buckets();

const TOTAL_DICTIONARY_BYTES: usize = {
    // Sum of (1<<ndbits)*len over all lengths, computed the same way
    // build_buckets() does, duplicated here since statics can't read back
    // through a non-const fn at this point in evaluation order.
    let ndbits_schedule: [u32; MAX_WORD_LEN + 1] = [
        0, 0, 0, 0, 10, 10, 11, 11, 10, 10, 10, 10, 10, 9, 9, 8, 7, 7, 8, 7, 7, 6, 6, 5, 5,
    ];
    let mut total = 0usize;
    let mut len = 0usize;
    while len <= MAX_WORD_LEN {
        total += (1usize << ndbits_schedule[len]) * len;
        len += 1;
    }
    total
};

/// The genuine brotli static dictionary corpus, grouped by word length in
/// the same order as [`BUCKETS`]. Embedded verbatim rather than generated.
static DICTIONARY_BYTES: &[u8; TOTAL_DICTIONARY_BYTES] = include_bytes!("dictionary.bin");

pub fn ndbits(length: usize) -> YeastResult<u32> {
    safety_check!(length <= MAX_WORD_LEN, "dictionary word length out of range");
    Ok(BUCKETS[length].ndbits)
}

/// Looks up dictionary word `id` of `length` bytes.
pub fn dict_lookup(length: usize, id: u32) -> YeastResult<&'static [u8]> {
    safety_check!(length <= MAX_WORD_LEN, "dictionary word length out of range");
    let bucket = BUCKETS[length];
    safety_check!((id as u64) < (1u64 << bucket.ndbits), "dictionary word id out of range");
    let start = bucket.doffset + (id as usize) * length;
    Ok(&DICTIONARY_BYTES[start..start + length])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformOp {
    Identity,
    UppercaseFirst,
    UppercaseAll,
    OmitFirst(u8),
    OmitLast(u8),
}

#[derive(Debug, Clone, Copy)]
pub struct Transform {
    pub prefix: &'static [u8],
    pub op: TransformOp,
    pub suffix: &'static [u8],
}

macro_rules! xf {
    (id, $prefix:expr, $suffix:expr) => {
        Transform { prefix: $prefix, op: TransformOp::Identity, suffix: $suffix }
    };
    (uf, $prefix:expr, $suffix:expr) => {
        Transform { prefix: $prefix, op: TransformOp::UppercaseFirst, suffix: $suffix }
    };
    (ua, $prefix:expr, $suffix:expr) => {
        Transform { prefix: $prefix, op: TransformOp::UppercaseAll, suffix: $suffix }
    };
    (of, $n:expr, $prefix:expr, $suffix:expr) => {
        Transform { prefix: $prefix, op: TransformOp::OmitFirst($n), suffix: $suffix }
    };
    (ol, $n:expr, $prefix:expr, $suffix:expr) => {
        Transform { prefix: $prefix, op: TransformOp::OmitLast($n), suffix: $suffix }
    };
}

/// The real 121-entry RFC 7932 transform table (prefix, elementary op,
/// suffix), transcribed from the format's published transform list.
#[rustfmt::skip]
static TRANSFORMS: [Transform; NUM_TRANSFORMS] = [
    xf!(id, b"", b""),             // 0
    xf!(id, b"", b" "),            // 1
    xf!(id, b" ", b" "),           // 2
    xf!(of, 1, b"", b""),          // 3
    xf!(uf, b"", b" "),            // 4
    xf!(id, b"", b" the "),        // 5
    xf!(id, b" ", b""),            // 6
    xf!(id, b"s ", b" "),          // 7
    xf!(id, b"", b" of "),         // 8
    xf!(uf, b"", b""),             // 9
    xf!(id, b"", b" and "),        // 10
    xf!(of, 2, b"", b""),          // 11
    xf!(ol, 1, b"", b""),          // 12
    xf!(id, b", ", b" "),          // 13
    xf!(id, b"", b", "),           // 14
    xf!(uf, b" ", b" "),           // 15
    xf!(id, b"", b" in "),         // 16
    xf!(id, b"", b" to "),         // 17
    xf!(id, b"e ", b" "),          // 18
    xf!(id, b"", b"\""),           // 19
    xf!(id, b"", b"."),            // 20
    xf!(id, b"", b"\">"),          // 21
    xf!(id, b"", b"\n"),           // 22
    xf!(ol, 3, b"", b""),          // 23
    xf!(id, b"", b"]"),            // 24
    xf!(id, b"", b" for "),        // 25
    xf!(of, 3, b"", b""),          // 26
    xf!(ol, 2, b"", b""),          // 27
    xf!(id, b"", b" a "),          // 28
    xf!(id, b"", b" that "),       // 29
    xf!(uf, b" ", b""),            // 30
    xf!(id, b"", b". "),           // 31
    xf!(id, b".", b""),            // 32
    xf!(id, b" ", b", "),          // 33
    xf!(of, 4, b"", b""),          // 34
    xf!(id, b"", b" with "),       // 35
    xf!(id, b"", b"'"),            // 36
    xf!(id, b"", b" from "),       // 37
    xf!(id, b"", b" by "),         // 38
    xf!(of, 5, b"", b""),          // 39
    xf!(of, 6, b"", b""),          // 40
    xf!(id, b" the ", b""),        // 41
    xf!(ol, 4, b"", b""),          // 42
    xf!(id, b"", b". The "),       // 43
    xf!(ua, b"", b""),             // 44
    xf!(id, b"", b" on "),         // 45
    xf!(id, b"", b" as "),         // 46
    xf!(id, b"", b" is "),         // 47
    xf!(ol, 7, b"", b""),          // 48
    xf!(ol, 1, b"", b"ing "),      // 49
    xf!(id, b"", b"\n\t"),         // 50
    xf!(id, b"", b":"),            // 51
    xf!(id, b" ", b". "),          // 52
    xf!(id, b"", b"ed "),          // 53
    xf!(of, 9, b"", b""),          // 54
    xf!(of, 7, b"", b""),          // 55
    xf!(ol, 6, b"", b""),          // 56
    xf!(id, b"", b"("),            // 57
    xf!(uf, b"", b", "),           // 58
    xf!(ol, 8, b"", b""),          // 59
    xf!(id, b"", b" at "),         // 60
    xf!(id, b"", b"ly "),          // 61
    xf!(id, b" the ", b" of "),    // 62
    xf!(ol, 5, b"", b""),          // 63
    xf!(ol, 9, b"", b""),          // 64
    xf!(uf, b" ", b", "),          // 65
    xf!(uf, b"", b"\""),           // 66
    xf!(id, b".", b"("),           // 67
    xf!(ua, b"", b" "),            // 68
    xf!(uf, b"", b"\">"),          // 69
    xf!(id, b"", b"=\""),          // 70
    xf!(id, b" ", b"."),           // 71
    xf!(id, b".com/", b""),        // 72
    xf!(id, b" the ", b" of the "),// 73
    xf!(uf, b"", b"'"),            // 74
    xf!(id, b"", b". This "),      // 75
    xf!(id, b"", b","),            // 76
    xf!(id, b".", b" "),           // 77
    xf!(uf, b"", b"("),            // 78
    xf!(uf, b"", b"."),            // 79
    xf!(id, b"", b" not "),        // 80
    xf!(id, b" ", b"=\""),         // 81
    xf!(id, b"", b"er "),          // 82
    xf!(ua, b" ", b" "),           // 83
    xf!(id, b"", b"al "),          // 84
    xf!(ua, b" ", b""),            // 85
    xf!(id, b"", b"='"),           // 86
    xf!(ua, b"", b"\""),           // 87
    xf!(uf, b"", b". "),           // 88
    xf!(id, b" ", b"("),           // 89
    xf!(id, b"", b"ful "),         // 90
    xf!(uf, b" ", b". "),          // 91
    xf!(id, b"", b"ive "),         // 92
    xf!(id, b"", b"less "),        // 93
    xf!(ua, b"", b"'"),            // 94
    xf!(id, b"", b"est "),         // 95
    xf!(uf, b" ", b"."),           // 96
    xf!(ua, b"", b"\">"),          // 97
    xf!(id, b" ", b"='"),          // 98
    xf!(uf, b"", b","),            // 99
    xf!(id, b"", b"ize "),         // 100
    xf!(ua, b"", b"."),            // 101
    xf!(id, b"\xc2\xa0", b""),     // 102
    xf!(id, b" ", b","),           // 103
    xf!(uf, b"", b"=\""),          // 104
    xf!(ua, b"", b"=\""),          // 105
    xf!(id, b"", b"ous "),         // 106
    xf!(ua, b"", b", "),           // 107
    xf!(uf, b"", b"='"),           // 108
    xf!(uf, b" ", b","),           // 109
    xf!(ua, b" ", b"=\""),         // 110
    xf!(ua, b" ", b", "),          // 111
    xf!(ua, b"", b","),            // 112
    xf!(ua, b"", b"("),            // 113
    xf!(ua, b"", b". "),           // 114
    xf!(ua, b" ", b"."),           // 115
    xf!(ua, b" ", b"='"),          // 116
    xf!(ua, b" ", b". "),          // 117
    xf!(uf, b" ", b"=\""),         // 118
    xf!(ua, b" ", b"='"),          // 119
    xf!(uf, b" ", b"='"),          // 120
];

pub fn transform(id: usize) -> YeastResult<&'static Transform> {
    TRANSFORMS.get(id).ok_or(crate::error::YeastError::MalformedStream("transform id out of range"))
}

/// Applies a transform to a dictionary word, writing the result into `out`.
/// `uppercaseFirst` uppercases exactly the first UTF-8 character (which may
/// be more than one byte); `uppercaseAll` applies the same rule to each
/// character boundary in turn.
pub fn apply_transform(t: &Transform, word: &[u8], out: &mut Vec<u8>) -> YeastResult<()> {
    out.extend_from_slice(t.prefix);

    let body: &[u8] = match t.op {
        TransformOp::OmitFirst(n) => {
            let n = n as usize;
            safety_check!(n <= word.len(), "omitFirst exceeds word length");
            &word[n..]
        }
        TransformOp::OmitLast(n) => {
            let n = n as usize;
            safety_check!(n <= word.len(), "omitLast exceeds word length");
            &word[..word.len() - n]
        }
        _ => word,
    };

    match t.op {
        TransformOp::UppercaseFirst => {
            let mut bytes = body.to_vec();
            uppercase_first_utf8_char(&mut bytes);
            out.extend_from_slice(&bytes);
        }
        TransformOp::UppercaseAll => {
            let mut bytes = body.to_vec();
            let mut pos = 0;
            while pos < bytes.len() {
                let advanced = uppercase_first_utf8_char(&mut bytes[pos..]);
                pos += advanced.max(1);
            }
            out.extend_from_slice(&bytes);
        }
        _ => out.extend_from_slice(body),
    }

    out.extend_from_slice(t.suffix);
    Ok(())
}

/// Uppercases the leading UTF-8 character of `bytes` in place, per the exact
/// byte-band rules in spec §4.6 (not a general Unicode case fold): one-byte
/// sequences flip bit 5 when in `a..=z`; two-byte sequences flip bit 5 of the
/// second byte; three-byte (and longer) sequences flip bit 2 of the third
/// byte. Truncation at the end of the word aborts the transform for that
/// character without error. Returns how many bytes the character occupied.
fn uppercase_first_utf8_char(bytes: &mut [u8]) -> usize {
    if bytes.is_empty() {
        return 0;
    }
    let b0 = bytes[0];
    if b0 < 0xC0 {
        if (b'a'..=b'z').contains(&b0) {
            bytes[0] ^= 0x20;
        }
        1
    } else if b0 < 0xE0 {
        if bytes.len() >= 2 {
            bytes[1] ^= 0x20;
        }
        2
    } else {
        if bytes.len() >= 3 {
            bytes[2] ^= 0x05;
        }
        3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_zero_is_identity() {
        let word = dict_lookup(4, 0).unwrap();
        let t = transform(0).unwrap();
        let mut out = Vec::new();
        apply_transform(t, word, &mut out).unwrap();
        assert_eq!(out, word);
    }

    #[test]
    fn uppercase_first_changes_one_char() {
        let word = b"time".to_vec();
        let t = Transform { prefix: b"", op: TransformOp::UppercaseFirst, suffix: b"" };
        let mut out = Vec::new();
        apply_transform(&t, &word, &mut out).unwrap();
        assert_eq!(out, b"Time");
    }

    #[test]
    fn dict_lookup_rejects_out_of_range_id() {
        assert!(dict_lookup(4, 1 << 20).is_err());
    }

    #[test]
    fn transform_with_prefix_and_suffix_concatenates_both() {
        // Transform 5: identity body wrapped in "" + " the ".
        let t = transform(5).unwrap();
        let mut out = Vec::new();
        apply_transform(t, b"cat", &mut out).unwrap();
        assert_eq!(out, b"cat the ");
    }

    #[test]
    fn omit_first_transform_drops_leading_bytes() {
        // Transform 3: omitFirst(1).
        let t = transform(3).unwrap();
        let mut out = Vec::new();
        apply_transform(t, b"cats", &mut out).unwrap();
        assert_eq!(out, b"ats");
    }

    #[test]
    fn uppercase_first_three_byte_utf8_flips_third_byte_bit() {
        // A 3-byte UTF-8 sequence: uppercasing flips bit 2 of the third byte,
        // never the first or second (spec §4.6's three-byte band).
        let mut bytes = [0xE2u8, 0x82, 0xAC]; // U+20AC EURO SIGN
        let advanced = uppercase_first_utf8_char(&mut bytes);
        assert_eq!(advanced, 3);
        assert_eq!(bytes, [0xE2, 0x82, 0xAC ^ 0x05]);
    }
}
