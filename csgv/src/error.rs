//! Error types for the CSV codec.
//!
//! Follows the two-layer shape used elsewhere in this codebase for
//! storage-adjacent crates: a public, flat `Error` enum derived with
//! `thiserror`, carrying human-readable diagnostics rather than a nested
//! kind enum (the error surface here has no I/O-vs-driver split to
//! justify one).

use thiserror::Error;

/// Everything that can go wrong calling into this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A `Configuration` was rejected by `Configuration::validate`.
    #[error("invalid configuration: {0}")]
    ConfigError(String),

    /// An index fell outside its container's declared range. Always a bug
    /// in the caller or in this crate; never caused by untrusted input.
    #[error("index out of bounds: {0}")]
    OutOfBounds(String),

    /// A structural invariant (header monotonicity, palette non-emptiness,
    /// first-opcode rule, stop-bit offset bound, ...) did not hold.
    #[error("invariant violated in brick {brick_index}: {message}")]
    InvariantViolated {
        brick_index: usize,
        message: String,
    },

    /// An imported compressed volume was produced with different
    /// rank-table or wavelet-matrix constants than this build uses.
    #[error("incompatible artifact: {0}")]
    IncompatibleArtifact(String),

    /// A split's end offset, or some other length-bearing field, does not
    /// fit in its storage width.
    #[error("overflow: {0}")]
    Overflow(String),
}

pub type Result<T> = std::result::Result<T, Error>;
