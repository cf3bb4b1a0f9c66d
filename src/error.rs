//! Error types for ferro-disc
//!
//! The engine distinguishes fatal errors (which abort the whole run) from
//! per-test and per-fix failures, which are always recovered locally and
//! surface as ordinary report rows. Only the fatal taxonomy lives here.

use thiserror::Error;

/// Main error type for ferro-disc operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiscError {
    /// An unrecognized top-level record kind in the input stream.
    ///
    /// There is no partial result to salvage: the walker cannot know how
    /// much input the unknown value spans.
    #[error("Unsupported top-level type '{name}' in {file}")]
    UnsupportedType { name: String, file: String },

    /// Malformed input at a known byte offset
    #[error("Parse error at byte {pos}: {msg}")]
    Parse { pos: u64, msg: String },

    /// Seek into a previously skipped subtree failed
    #[error("Seek error at byte {pos}: {msg}")]
    Seek { pos: u64, msg: String },

    /// IO error (for file operations)
    #[error("IO error: {msg}")]
    Io { msg: String },
}

impl DiscError {
    /// Create a parse error at the given stream offset.
    pub fn parse(pos: u64, msg: impl Into<String>) -> Self {
        DiscError::Parse {
            pos,
            msg: msg.into(),
        }
    }

    /// Create an unsupported-type error naming the offending header and file.
    pub fn unsupported(name: impl Into<String>, file: impl Into<String>) -> Self {
        DiscError::UnsupportedType {
            name: name.into(),
            file: file.into(),
        }
    }
}

impl From<std::io::Error> for DiscError {
    fn from(err: std::io::Error) -> Self {
        DiscError::Io {
            msg: err.to_string(),
        }
    }
}
