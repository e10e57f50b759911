//! C1: the character source.
//!
//! Owns the underlying byte stream and decodes it one UTF-8 code point at a
//! time, tracking line/column and a bounded look-back ring so the tokenizer
//! can `reconsume_last()` a short run of already-seen input (used only for
//! triple-quote lookahead, which needs at most 2 steps back).

use std::collections::VecDeque;
use std::io::Read;

/// How many of the most recently consumed code points are remembered.
///
/// Spec §3.2: "bounded to 10 entries (a ring/deque)."
const HISTORY_CAPACITY: usize = 10;

/// A decoded Unicode scalar paired with its source position (spec §3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodePoint {
    pub ch: char,
    pub location: Location,
}

/// 1-based line, column of a [`CodePoint`] within the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

/// Sentinel meaning "input exhausted" (spec §3.1: code point value `0`).
pub const EOF: char = '\0';

/// The outcome of a single `next()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Char(CodePoint),
    Eof(Location),
    /// UTF-8 decoding failed; the stream must be treated as fatally broken.
    Invalid(Location),
}

/// Reads UTF-8 text from an underlying byte stream, one code point at a
/// time, with reconsume and a bounded consumed-history ring.
///
/// There is no persistent memory of input beyond the ring: look-back past
/// [`HISTORY_CAPACITY`] code points is not supported, matching spec §3.2.
pub struct CharSource<R> {
    inner: ByteSource<R>,
    /// Code points pushed back for re-examination; `next()` drains this
    /// front-first before reading the stream.
    reconsume: VecDeque<CodePoint>,
    /// The most recent code points actually consumed, oldest evicted first.
    consumed_history: VecDeque<CodePoint>,
    line: u32,
    column: u32,
    decode_failed: bool,
}

impl<R: Read> CharSource<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: ByteSource::new(inner),
            reconsume: VecDeque::new(),
            consumed_history: VecDeque::new(),
            line: 1,
            column: 0,
            decode_failed: false,
        }
    }

    /// Pull the next code point: a reconsumed one if any are pending,
    /// otherwise decode from the stream.
    pub fn next(&mut self) -> Next {
        if self.decode_failed {
            return Next::Invalid(Location {
                line: self.line,
                column: self.column,
            });
        }

        if let Some(cp) = self.reconsume.pop_front() {
            self.record(cp);
            return Next::Char(cp);
        }

        match self.inner.next_char() {
            Ok(Some(ch)) => {
                self.advance_position(ch);
                let cp = CodePoint {
                    ch,
                    location: Location {
                        line: self.line,
                        column: self.column,
                    },
                };
                self.record(cp);
                Next::Char(cp)
            }
            Ok(None) => Next::Eof(Location {
                line: self.line,
                column: self.column,
            }),
            Err(()) => {
                self.decode_failed = true;
                Next::Invalid(Location {
                    line: self.line,
                    column: self.column,
                })
            }
        }
    }

    fn advance_position(&mut self, ch: char) {
        self.column += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 0;
        }
    }

    fn record(&mut self, cp: CodePoint) {
        if self.consumed_history.len() == HISTORY_CAPACITY {
            self.consumed_history.pop_front();
        }
        self.consumed_history.push_back(cp);
    }

    /// Move the most recently consumed code point back to the front of the
    /// reconsume queue. A no-op once history is drained. Callable
    /// repeatedly, up to [`HISTORY_CAPACITY`] times, to step back further.
    pub fn reconsume_last(&mut self) {
        if let Some(cp) = self.consumed_history.pop_back() {
            self.reconsume.push_front(cp);
        }
    }

    /// Push a sequence of code points to the front of the reconsume queue,
    /// in the order they should be yielded next. Test-harness only (spec
    /// §4.1).
    #[cfg(test)]
    pub(crate) fn buffer_chars(&mut self, seq: &str) {
        for ch in seq.chars().rev() {
            self.reconsume.push_front(CodePoint {
                ch,
                location: Location {
                    line: self.line,
                    column: self.column,
                },
            });
        }
    }
}

/// Thin wrapper turning an arbitrary `Read` into a `char` source, decoding
/// UTF-8 incrementally so multi-byte sequences that straddle `read()` calls
/// are handled correctly.
struct ByteSource<R> {
    inner: R,
    pending: VecDeque<u8>,
    eof: bool,
}

impl<R: Read> ByteSource<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            pending: VecDeque::new(),
            eof: false,
        }
    }

    fn fill(&mut self) -> std::io::Result<()> {
        if self.eof {
            return Ok(());
        }
        let mut buf = [0u8; 4096];
        let n = self.inner.read(&mut buf)?;
        if n == 0 {
            self.eof = true;
        } else {
            self.pending.extend(&buf[..n]);
        }
        Ok(())
    }

    /// Decode the next `char`. `Ok(None)` is end-of-stream; `Err(())` is a
    /// UTF-8 decode failure (spec: surfaces as `INVALID`/`BAD_ENCODING`).
    fn next_char(&mut self) -> Result<Option<char>, ()> {
        loop {
            if let Some(&first) = self.pending.front() {
                let width = utf8_width(first).ok_or(())?;
                while self.pending.len() < width && !self.eof {
                    self.fill().map_err(|_| ())?;
                }
                if self.pending.len() < width {
                    return Err(());
                }
                let bytes: Vec<u8> = self.pending.iter().take(width).copied().collect();
                let s = std::str::from_utf8(&bytes).map_err(|_| ())?;
                let ch = s.chars().next().ok_or(())?;
                for _ in 0..width {
                    self.pending.pop_front();
                }
                return Ok(Some(ch));
            }
            if self.eof {
                return Ok(None);
            }
            self.fill().map_err(|_| ())?;
            if self.pending.is_empty() && self.eof {
                return Ok(None);
            }
        }
    }
}

/// UTF-8 sequence length from its leading byte, or `None` if it can never
/// start a valid sequence.
fn utf8_width(b: u8) -> Option<usize> {
    if b & 0x80 == 0 {
        Some(1)
    } else if b & 0xE0 == 0xC0 {
        Some(2)
    } else if b & 0xF0 == 0xE0 {
        Some(3)
    } else if b & 0xF8 == 0xF0 {
        Some(4)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(s: &str) -> CharSource<&[u8]> {
        CharSource::new(s.as_bytes())
    }

    #[test]
    fn line_column_tracking() {
        let mut src = source("ab\ncd");
        let mut last = None;
        for _ in 0..4 {
            last = Some(src.next());
        }
        match last.unwrap() {
            Next::Char(cp) => {
                assert_eq!(cp.ch, 'c');
                assert_eq!(cp.location.line, 2);
                assert_eq!(cp.location.column, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn eof_then_reconsume_is_noop() {
        let mut src = source("a");
        assert!(matches!(src.next(), Next::Char(_)));
        assert!(matches!(src.next(), Next::Eof(_)));
        src.reconsume_last();
        assert!(matches!(src.next(), Next::Eof(_)));
    }

    #[test]
    fn reconsume_round_trip_up_to_ten() {
        let input = "abcdefghij";
        let mut src = source(input);
        let mut forward = Vec::new();
        for _ in 0..10 {
            match src.next() {
                Next::Char(cp) => forward.push(cp.ch),
                other => panic!("unexpected {other:?}"),
            }
        }
        for _ in 0..10 {
            src.reconsume_last();
        }
        let mut replayed = Vec::new();
        for _ in 0..10 {
            match src.next() {
                Next::Char(cp) => replayed.push(cp.ch),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(forward, replayed);
    }

    #[test]
    fn invalid_utf8_is_fatal_and_sticky() {
        let mut src = CharSource::new(&b"\xFF\xFEabc"[..]);
        assert!(matches!(src.next(), Next::Invalid(_)));
        assert!(matches!(src.next(), Next::Invalid(_)));
    }
}
