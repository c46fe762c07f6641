//! Layered error types
//!
//! Operator failures wrap the core data-model error; everything is
//! fail-fast and call-scoped; no operator commits partial output on error.

use tessella_core::CoreError;
use thiserror::Error;

/// Markup well-formedness failures raised by the XML importer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarkupError {
    /// An opening tag was never closed before its scope ended
    #[error("missing closing tag for element '{element}'")]
    MissingClosingTag {
        /// The element being imported
        element: String,
    },

    /// A closing tag had no corresponding opening tag
    #[error("missing opening tag for element '{element}'")]
    MissingOpeningTag {
        /// The element being imported
        element: String,
    },
}

/// Engine-level errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Data-model error (handle lookup, span resolution)
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Invalid operator configuration
    ///
    /// Unknown mode strings, out-of-range sample sizes, or recoding an
    /// overlapping segmentation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Malformed regular expression
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Markup well-formedness failure
    #[error("markup error: {0}")]
    Markup(#[from] MarkupError),

    /// Substitution template references a capture group that does not exist
    #[error("invalid template reference: {0}")]
    Template(String),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
