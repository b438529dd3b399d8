//! The two fatal failure classes of the chunk model.
//!
//! A `Usage` error is always attributable to the calling code: it mutated an
//! immutable chunk, sliced out of range, or asked for a result its peek flags
//! do not allow. An `Implementation` error means the chunk tree's own
//! bookkeeping is inconsistent. Both terminate the current operation.
//!
//! Data that cannot be decoded is not an error: it comes back as a chunk
//! flagged incomplete, incorrect or improperly represented.

/// Fatal chunk-model failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    #[error("chunk usage error: {0}")]
    Usage(String),

    #[error("chunk implementation inconsistency: {0}")]
    Implementation(String),
}

impl ChunkError {
    pub fn is_usage(&self) -> bool {
        matches!(self, ChunkError::Usage(_))
    }

    pub fn is_implementation(&self) -> bool {
        matches!(self, ChunkError::Implementation(_))
    }
}

pub type Result<T, E = ChunkError> = std::result::Result<T, E>;

/// Returns a [`ChunkError::Usage`] from the enclosing function unless the
/// condition holds.
#[macro_export]
macro_rules! check_usage {
    ($cond:expr, $($arg:tt)+) => {
        if !($cond) {
            return Err($crate::error::ChunkError::Usage(format!($($arg)+)));
        }
    };
}

/// Returns a [`ChunkError::Implementation`] from the enclosing function
/// unless the condition holds.
#[macro_export]
macro_rules! check_implementation {
    ($cond:expr, $($arg:tt)+) => {
        if !($cond) {
            return Err($crate::error::ChunkError::Implementation(format!($($arg)+)));
        }
    };
}
