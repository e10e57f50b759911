//! The single error type produced by this crate.
//!
//! Parsing never recovers from an error: the first one terminates the parse
//! and is returned alongside the source location at which it was raised.

/// Everything that can make [`crate::Parser::parse`] fail.
///
/// One variant per error kind in the eJSON grammar. Every variant is
/// reported together with the [`Location`](crate::reader::Location) of
/// `curr_uc` at the moment of failure, i.e. the code point being examined
/// when the tokenizer gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The input byte stream contained a sequence that is not valid UTF-8.
    #[error("invalid UTF-8 encoding")]
    BadEncoding,
    /// End of input reached inside a literal or an open container.
    #[error("unexpected end of input")]
    UnexpectedEof,
    /// A code point could not be consumed in the current state.
    #[error("unexpected character")]
    UnexpectedCharacter,
    /// Two consecutive structural commas (`,,`).
    #[error("unexpected comma")]
    UnexpectedComma,
    /// A `}` with no matching `{`.
    #[error("unexpected right brace")]
    UnexpectedRightBrace,
    /// A `]` with no matching `[`.
    #[error("unexpected right bracket")]
    UnexpectedRightBracket,
    /// A keyword prefix that cannot extend to `true`, `false`, or `null`.
    #[error("unexpected JSON keyword")]
    UnexpectedJsonKeyword,
    /// A number literal that is syntactically complete but not parseable
    /// (e.g. ends in a bare `-`, `E`, or `e`).
    #[error("malformed JSON number")]
    BadJsonNumber,
    /// A base64 byte sequence has a non-padding character after `=`.
    #[error("unexpected character in base64 byte sequence")]
    UnexpectedBase64,
    /// An unknown `\x` escape entity inside a string.
    #[error("unknown string escape entity")]
    BadJsonStringEscapeEntity,
    /// An empty or malformed JSONEE variable name (`$` with nothing usable
    /// after it).
    #[error("malformed JSONEE variable name")]
    BadJsoneeVariableName,
    /// An empty or malformed JSONEE member-access keyword (`.` with no
    /// usable name after it).
    #[error("malformed JSONEE keyword")]
    BadJsoneeKeyword,
    /// An empty or malformed JSONEE object/array key name.
    #[error("malformed JSONEE name")]
    BadJsoneeName,
    /// Container nesting exceeded `max_depth`.
    #[error("maximum nesting depth exceeded")]
    MaxDepthExceeded,
    /// Arena or buffer allocation failed.
    #[error("out of memory")]
    OutOfMemory,
}

/// A [`Location`](crate::reader::Location)-tagged [`ErrorKind`]: what
/// [`crate::Parser::parse`] returns on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at line {line}, column {column}")]
pub struct Error {
    pub kind: ErrorKind,
    /// 1-based source line of the offending code point.
    pub line: u32,
    /// Column of the offending code point on that line.
    pub column: u32,
    /// The offending code point, or `None` if the error was raised at EOF.
    pub culprit: Option<char>,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, line: u32, column: u32, culprit: Option<char>) -> Self {
        Self {
            kind,
            line,
            column,
            culprit,
        }
    }
}
