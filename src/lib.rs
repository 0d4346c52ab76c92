//! Reference brotli decompressor and `.br` framing utilities.
//!
//! The decoder entry points are [`decode`] and [`decode_compare`]; the
//! framing entry points live in [`framing`] (scanning) and
//! [`framing_merge`] (merging).

pub mod alphabet;
pub mod bitstream;
pub mod context_map;
pub mod decoder;
pub mod error;
pub mod framing;
pub mod framing_merge;
pub mod metablock;
pub mod prefix_code;
pub mod prefix_reader;
pub mod sink;
pub mod static_dict;

#[macro_use]
extern crate static_assertions;

pub use decoder::{decode, decode_compare};
pub use error::{YeastError, YeastResult};

const_assert!(prefix_code::MAX_CODE_LEN == 15);
const_assert!(static_dict::NUM_TRANSFORMS == 121);

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decode_rejects_empty_input() {
        assert!(decode(&[]).is_err());
    }

    proptest! {
        /// For all random bit strings shorter than a configurable bound,
        /// decode never panics: it returns either an output or a
        /// TruncatedInput/MalformedStream error.
        #[test]
        fn decode_never_panics_on_random_bytes(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let _ = decode(&bytes);
        }

        /// Compare-mode decode against an altered expected buffer never
        /// panics either, and never reports success.
        #[test]
        fn decode_compare_never_panics_against_random_expected(
            bytes in proptest::collection::vec(any::<u8>(), 0..256),
            expected in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            let _ = decode_compare(&bytes, &expected);
        }
    }
}
