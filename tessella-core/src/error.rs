//! Core error types

use crate::store::StringHandle;
use thiserror::Error;

/// Errors raised by the data model (string registry and span resolution)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Handle was released or never issued
    #[error("string {handle} not found in store")]
    NotFound {
        /// The handle that failed to resolve
        handle: StringHandle,
    },

    /// Resolved span bounds are invalid for the referenced string
    ///
    /// Covers inverted bounds, bounds past the end of the content, and
    /// offsets that cut a UTF-8 code point.
    #[error("invalid span [{start}, {end}) for string of length {len}")]
    Range {
        /// Resolved start offset
        start: usize,
        /// Resolved end offset
        end: usize,
        /// Current length of the referenced string
        len: usize,
    },
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
