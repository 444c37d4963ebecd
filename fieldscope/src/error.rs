//! Module containing the universal error type
use thiserror::Error;

/// Universal error type for `fieldscope`
///
/// Errors are only produced while compiling a formula; once a
/// [`Field`](crate::Field) exists, evaluation failures are reported as
/// invalid (`None`) samples instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Node is not present in this `Context`
    #[error("node is not present in this `Context`")]
    BadNode,

    /// The formula contains no tokens
    #[error("formula is empty")]
    EmptyFormula,

    /// A character outside the formula alphabet
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar {
        /// Offending character
        ch: char,
        /// Byte offset in the formula text
        offset: usize,
    },

    /// A numeric literal that could not be parsed
    #[error("malformed number '{text}' at offset {offset}")]
    BadNumber {
        /// Literal text
        text: String,
        /// Byte offset in the formula text
        offset: usize,
    },

    /// A token in a position where the grammar does not allow it
    #[error("unexpected {found} at offset {offset}")]
    UnexpectedToken {
        /// Human-readable description of the token
        found: String,
        /// Byte offset in the formula text
        offset: usize,
    },

    /// The formula ended while more input was expected
    #[error("unexpected end of formula")]
    UnexpectedEnd,

    /// An opening parenthesis without a matching close
    #[error("unclosed parenthesis opened at offset {0}")]
    UnclosedParen(usize),

    /// Identifier is neither a declared variable, constant, nor function
    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),

    /// A function name used without an argument list
    #[error("function '{0}' must be called with parentheses")]
    MissingArguments(String),

    /// A function called with the wrong number of arguments
    #[error("function '{name}' expects {expected} argument(s), got {got}")]
    BadArgCount {
        /// Canonical function name
        name: &'static str,
        /// Description of the accepted argument count
        expected: &'static str,
        /// Number of arguments supplied
        got: usize,
    },

    /// Parentheses or function calls nested beyond the supported depth
    #[error("formula is nested more than {0} levels deep")]
    TooDeep(usize),
}
