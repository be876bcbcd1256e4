//! Error types for the tracker debugger

use thiserror::Error;

/// Errors raised by the debugger and its collaborators
#[derive(Error, Debug)]
pub enum DebuggerError {
    #[error("tracker list is empty")]
    NoTrackers,

    #[error("invalid tracker host: {0}")]
    InvalidHost(String),

    #[error("unknown button id '{0}'")]
    UnknownButton(String),

    #[error("tracker blocker failed: {0}")]
    Blocker(String),

    #[error("invalid suffix rule at line {line}: {rule}")]
    InvalidSuffixRule { line: usize, rule: String },

    #[error("invalid domain pattern at line {line}: {source}")]
    InvalidPattern {
        line: usize,
        #[source]
        source: regex::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, DebuggerError>;
