//! DistError: Unified error type for distvec public APIs
//!
//! Every fallible map, vector and runtime operation reports through this
//! enum so callers can propagate with `?` instead of panicking.

use thiserror::Error;

/// Unified error type for distvec operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DistError {
    /// The parallel runtime could not be started (or was started twice).
    #[error("runtime initialization failed: {0}")]
    RuntimeInit(String),
    /// Ranks passed different values for an argument that must agree globally.
    #[error("ranks disagree on the global element count (this rank passed {local})")]
    InconsistentGlobalCount { local: u64 },
    /// Ranks passed different index bases.
    #[error("ranks disagree on the index base (this rank passed {local})")]
    InconsistentIndexBase { local: i64 },
    /// Another rank rejected its input during a collective construction.
    #[error("another rank rejected its input: {0}")]
    PeerFailed(String),
    /// The declared global count does not equal the sum of the local counts.
    #[error("declared global element count {declared} but ranks own {actual} in total")]
    GlobalCountMismatch { declared: u64, actual: u64 },
    /// A global index smaller than the map's index base was supplied.
    #[error("global index {index} is below the index base {base}")]
    IndexBelowBase { index: i64, base: i64 },
    /// The global index is not owned by this rank.
    #[error("global index {0} is not owned by this rank")]
    GlobalIndexNotOwned(i64),
    /// The global index is not owned by any rank.
    #[error("global index {0} is not present in the map")]
    GlobalIndexNotFound(i64),
    /// Local index past the end of the locally owned range.
    #[error("local index {index} out of range (local length {len})")]
    LocalIndexOutOfRange { index: usize, len: usize },
    /// A value buffer did not match the map's local element count.
    #[error("expected {expected} local values, got {got}")]
    LengthMismatch { expected: usize, got: usize },
    /// Two vectors whose maps are not compatible were combined.
    #[error(
        "incompatible vectors: local lengths {local} vs {other_local}, global lengths {global} vs {other_global}"
    )]
    IncompatibleVectors {
        local: usize,
        other_local: usize,
        global: u64,
        other_global: u64,
    },
    /// An internal consistency assumption was violated.
    #[error("logic error: {0}")]
    Logic(String),
    /// Writing to the output stream failed.
    #[error("I/O error: {0}")]
    Io(String),
    /// Configuration could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for DistError {
    fn from(err: std::io::Error) -> Self {
        DistError::Io(err.to_string())
    }
}
