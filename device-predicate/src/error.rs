//! Error types for predicate parsing

use thiserror::Error;

/// Errors that can occur while parsing a predicate string
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PredicateError {
    /// A character that starts no token
    #[error("Unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    /// A quoted string without its closing quote
    #[error("Unterminated string starting at offset {offset}")]
    UnterminatedString { offset: usize },

    /// A numeric literal that does not fit any numeric type
    #[error("Invalid number '{text}' at offset {offset}")]
    InvalidNumber { text: String, offset: usize },

    /// A token the grammar does not allow at this position
    #[error("Expected {expected}, found {found} at offset {offset}")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
        offset: usize,
    },

    /// Input ended in the middle of an expression
    #[error("Unexpected end of input, expected {expected}")]
    UnexpectedEnd { expected: &'static str },

    /// Groups nested deeper than the parser accepts
    #[error("Groups nested too deeply at offset {offset}")]
    TooDeep { offset: usize },

    /// An interface name that is not a known capability type
    #[error("Unknown interface type: {0}")]
    UnknownInterface(String),
}

/// Result type alias for predicate parsing
pub type PredicateResult<T> = Result<T, PredicateError>;
