//! Error types for noteql.
//!
//! Every failure is local to one block of a cell: the executor records the
//! error in that block's slot and moves on to the next block.

use thiserror::Error;

/// Main error type for noteql operations.
#[derive(Error, Debug)]
pub enum NqlError {
    /// Malformed directive, duplicate action, empty SQL block or bad template.
    #[error("Syntax error: {0}")]
    Syntax(String),

    /// A named variable or session could not be found, or has the wrong kind.
    #[error("Binding error: {0}")]
    Binding(String),

    /// Native failure from the database driver, shown untouched.
    #[error(transparent)]
    Backend(#[from] sqlx::Error),

    /// No usable session, bad connection URL, invalid config file.
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O failure (CSV export, script reading).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NqlError {
    /// Creates a syntax error with the given message.
    pub fn syntax(msg: impl Into<String>) -> Self {
        Self::Syntax(msg.into())
    }

    /// Creates a binding error with the given message.
    pub fn binding(msg: impl Into<String>) -> Self {
        Self::Binding(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Syntax(_) => "Syntax Error",
            Self::Binding(_) => "Binding Error",
            Self::Backend(_) => "Backend Error",
            Self::Config(_) => "Configuration Error",
            Self::Io(_) => "I/O Error",
        }
    }
}

/// Result type alias using NqlError.
pub type Result<T> = std::result::Result<T, NqlError>;
