//! Error types for the surface language front end

use qpv_core::CoreError;
use qpv_verify::VerifyError;
use thiserror::Error;

/// Front-end error types
#[derive(Error, Debug)]
pub enum LangError {
    #[error("Syntax error at {line}:{col}: {message}")]
    Syntax {
        line: usize,
        col: usize,
        message: String,
    },

    #[error("Operator file error: {0}")]
    File(String),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LangError {
    /// Shorthand used throughout the lexer and parser
    pub fn syntax(line: usize, col: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            col,
            message: message.into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, LangError>;
