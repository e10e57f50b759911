//! A streaming, UTF-8-aware parser for eJSON/JSONEE — the JSON5-superset
//! expression language used by HVML/PurC to embed dynamic variable
//! references, member access, and getter/setter calls inside otherwise
//! ordinary JSON values.
//!
//! Parsing is a single pass: the tokenizer reads one UTF-8 code point at a
//! time and builds a [`VcmTree`] directly, with no intermediate token
//! stream. [`Parser`] is the small public wrapper around that pass.

mod buffer;
mod error;
mod lexer;
mod limit;
mod numeric;
mod reader;
mod stack;
mod vcm;

#[cfg(test)]
mod tests;

pub use crate::error::{Error, ErrorKind};
pub use crate::limit::DEFAULT_MAX_DEPTH;
pub use crate::vcm::{Extra, VcmPayload, VcmRef, VcmTag, VcmTree};

use crate::lexer::Tokenizer;
use std::io::Read;

/// Configuration bits recognised by [`Parser`].
///
/// Only one bit is currently defined. Unlike [`Extra`] (a VCM node's
/// bookkeeping bits), this one is public since it's set by callers, not
/// just consulted by the tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParserFlags(u32);

impl ParserFlags {
    pub const NONE: ParserFlags = ParserFlags(0);
    /// Trace every tokenizer state transition to stderr as it happens.
    /// Mirrors the original C parser's `PRINT_STATE`-gated trace; there is
    /// no structured `tracing`/`log` dependency behind it because nothing
    /// in this corpus reaches for one in a hot, character-at-a-time loop.
    pub const PRINT_LOG: ParserFlags = ParserFlags(0b1);

    pub fn contains(self, flag: ParserFlags) -> bool {
        self.0 & flag.0 != 0
    }
}

impl std::ops::BitOr for ParserFlags {
    type Output = ParserFlags;
    fn bitor(self, rhs: ParserFlags) -> ParserFlags {
        ParserFlags(self.0 | rhs.0)
    }
}

/// Parses eJSON/JSONEE text into a [`VcmTree`].
///
/// A `Parser` carries only configuration (the nesting-depth ceiling and
/// trace flags); it holds no state between calls, so one instance can be
/// reused across many independent inputs via [`Parser::parse`]/
/// [`Parser::parse_str`].
#[derive(Debug, Clone, Copy)]
pub struct Parser {
    max_depth: u32,
    flags: ParserFlags,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    /// A parser with the default nesting-depth ceiling
    /// ([`DEFAULT_MAX_DEPTH`]) and no flags set.
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            flags: ParserFlags::NONE,
        }
    }

    /// A parser with a caller-chosen maximum container nesting depth and
    /// flag set. `max_depth == 0` is treated as "use the default".
    pub fn with_options(max_depth: u32, flags: ParserFlags) -> Self {
        Self { max_depth, flags }
    }

    /// A parser with a caller-chosen maximum container nesting depth.
    /// `0` is treated as "use the default".
    pub fn with_max_depth(max_depth: u32) -> Self {
        Self::with_options(max_depth, ParserFlags::NONE)
    }

    /// Reconfigure an existing `Parser` in place, equivalent to
    /// `*self = Parser::with_options(max_depth, flags)`. Since a `Parser`
    /// holds no per-parse state, this only exists to match the
    /// create/reset/destroy lifecycle the C original exposes; building a
    /// fresh `Parser` works just as well.
    pub fn reset(&mut self, max_depth: u32, flags: ParserFlags) {
        *self = Self::with_options(max_depth, flags);
    }

    /// Parse a complete eJSON/JSONEE value from a byte stream.
    ///
    /// The stream must contain exactly one value (plus optional leading/
    /// trailing whitespace); trailing garbage after a complete value is an
    /// error — this crate parses one expression per call, it does not scan
    /// a stream of them.
    pub fn parse<R: Read>(&mut self, input: R) -> Result<VcmTree, Error> {
        Tokenizer::new(input, self.max_depth, self.flags).run()
    }

    /// Convenience wrapper over [`Parser::parse`] for in-memory text.
    pub fn parse_str(&mut self, input: &str) -> Result<VcmTree, Error> {
        self.parse(input.as_bytes())
    }
}

/// Parse eJSON/JSONEE text with the default configuration. Shorthand for
/// `Parser::new().parse_str(input)`.
pub fn parse_str(input: &str) -> Result<VcmTree, Error> {
    Parser::new().parse_str(input)
}

#[cfg(test)]
mod parser_flags_tests {
    use super::*;

    #[test]
    fn reset_reconfigures_in_place() {
        let mut p = Parser::with_max_depth(4);
        assert!(p.parse_str("[[[[[1]]]]]").is_err());
        p.reset(0, ParserFlags::NONE);
        assert!(p.parse_str("[[[[[1]]]]]").is_ok());
    }

    #[test]
    fn print_log_flag_is_accepted() {
        let mut p = Parser::with_options(DEFAULT_MAX_DEPTH, ParserFlags::PRINT_LOG);
        assert!(p.parse_str("42").is_ok());
    }
}
