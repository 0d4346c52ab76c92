use thiserror::Error;

/// Result of a call to [`crate::decode`] or any framing entry point.
#[derive(Debug, Error)]
pub enum YeastError {
    /// Allocation failed. Returned immediately, no recovery.
    #[error("out of memory")]
    OutOfMemory,

    /// The bit or byte reader ran past the end of the buffer.
    #[error("premature end of input")]
    TruncatedInput,

    /// A structural invariant of the compressed format was violated.
    #[error("invalid compressed data: {0}")]
    MalformedStream(&'static str),

    /// Compare-mode decode only: the decompressed byte at `at` did not match
    /// the expected buffer.
    #[error("compare mismatch at byte {at}")]
    CompareMismatch { at: usize },
}

pub type YeastResult<T> = Result<T, YeastError>;

/// Turns a boolean condition into an early `Err(YeastError::MalformedStream(reason))`.
///
/// Mirrors the `safety_check!` macro the teacher codebase uses to keep fallible
/// invariant checks terse at every call site instead of writing `if !cond { return Err(...) }`
/// by hand throughout the decoder.
macro_rules! safety_check {
    ($cond:expr, $reason:expr) => {
        if !($cond) {
            return Err($crate::error::YeastError::MalformedStream($reason));
        }
    };
}

pub(crate) use safety_check;
