//! C5: the eJSON/JSONEE tokenizer.
//!
//! A character-driven state machine that consumes a [`CharSource`] and
//! builds a [`VcmTree`] directly — there is no separate token stream handed
//! to a parser stage, matching spec §2/§4: tokenizing and tree-building are
//! one pass. Each state handler (`st_*`) looks only at `self.curr_ch` and
//! returns a [`Transition`] telling `run`'s dispatch loop whether to read a
//! fresh character, replay the same one under a new state, or fail.

use crate::buffer::TextBuffer;
use crate::error::{Error, ErrorKind};
use crate::limit::DepthTracker;
use crate::numeric;
use crate::reader::{CharSource, Location, Next, EOF};
use crate::stack::{FocusStack, Marker, MarkerStack};
use crate::vcm::{Extra, Vcm, VcmId, VcmTag, VcmTree};
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    Data,
    Control,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    SubscriptOpen,
    LeftParenthesis,
    AfterLeftParen,
    RightParenthesis,
    AfterValue,
    BeforeName,
    AfterName,
    NameUnquoted,
    NameSingleQuoted,
    NameDoubleQuoted,
    NameThreeDoubleQuoted,
    ValueSingleQuoted,
    ValueDoubleQuoted,
    ValueThreeDoubleQuoted,
    Number,
    NumberInteger,
    NumberFraction,
    NumberExponent,
    NumberExponentInteger,
    NumberSuffixInteger,
    NumberSuffixLongDouble,
    AfterValueNumber,
    NumberInfinity,
    Nan,
    ByteSequence,
    HexByteSequence,
    BinaryByteSequence,
    Base64ByteSequence,
    AfterByteSequence,
    Keyword,
    AfterKeyword,
    StringEscape,
    StringEscapeFourHexDigits,
    Dollar,
    JsoneeVariable,
    JsoneeFullStop,
    JsoneeKeyword,
    JsoneeString,
    AfterJsoneeString,
}

/// What a state handler asks the dispatch loop to do next.
enum Transition {
    /// This character is consumed; read the next one before entering `next`.
    Advance(State),
    /// This character is not consumed; re-examine it under `next`.
    Reconsume(State),
    /// Consume the backslash's escape-target character via `StringEscape`,
    /// returning to `next` once the escape is resolved.
    EnterEscape(State),
    Fail(ErrorKind),
    Done,
}

/// Which decoder `AfterByteSequence` must invoke, set once the `bx`/`bb`/`b6`
/// prefix has disambiguated the sub-grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteSeqKind {
    Hex,
    Binary,
    Base64,
}

fn is_ws(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\x0C')
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

/// The dispatch-preamble's structural-separator alphabet: `{ } [ ] ( ) , :`.
/// Two of these in a row with nothing but whitespace between is always an
/// error, checked once here rather than at every state that might see a
/// comma.
fn is_structural_separator(c: char) -> bool {
    matches!(c, '{' | '}' | '[' | ']' | '(' | ')' | ',' | ':')
}

const INFINITY_LITERAL: &str = "Infinity";
const NAN_LITERAL: &str = "NaN";

/// Drives a [`CharSource`] through the eJSON/JSONEE grammar, building a
/// [`VcmTree`] as it goes. One `Tokenizer` is good for exactly one parse;
/// [`crate::Parser`] constructs a fresh one per call.
pub(crate) struct Tokenizer<R> {
    source: CharSource<R>,
    state: State,
    /// Where `StringEscape`/`StringEscapeFourHexDigits` return once the
    /// escape sequence resolves.
    escape_return: State,
    /// Set when a `$`-interpolation is opened mid-string; tells `AfterValue`
    /// which quoted-value state to resume once the variable chain closes.
    interp_resume: Option<State>,
    curr_ch: char,
    curr_loc: Location,
    /// The lexeme currently being accumulated (name, string content,
    /// number text, byte-sequence digits, keyword spelling — one at a
    /// time).
    temp_buffer: TextBuffer,
    /// Scratch space for a `\uXXXX` escape's four hex digits.
    hex_scratch: String,
    ejson_stack: MarkerStack,
    vcm_stack: FocusStack,
    /// One entry per `Brace`/`Bracket`/`Paren`/`SetterParen` marker pushed:
    /// `true` if closing it should reattach the finished node into its
    /// suspended parent (plain containers), `false` if the node already
    /// adopted its base via [`Tokenizer::wrap_chain_head`] and closing it
    /// must leave focus exactly where it is (subscripts and calls chained
    /// off a JSONEE value).
    reattach_stack: Vec<bool>,
    vcm: Vcm,
    vcm_node: Option<VcmId>,
    depth: DepthTracker,
    bs_kind: Option<ByteSeqKind>,
    /// Counts leading `"` seen while `temp_buffer` is still empty, to tell
    /// an empty string (`""`) apart from the opening of a triple-quoted one
    /// (`"""`).
    nr_quoted: u32,
    /// The last structural separator read (spec §3.5's `prev_separator`),
    /// reset to `None` by any intervening non-whitespace, non-separator
    /// character. Lets the dispatch preamble reject `,,` the moment the
    /// second comma is read, regardless of which state is active.
    prev_separator: Option<char>,
    number_negative: bool,
    suffix_unsigned: bool,
    suffix_long: bool,
    /// Set once the `F` of an `FL`/`F` long-double suffix is seen; a
    /// fraction or exponent followed by this suffix becomes a
    /// `LONG_DOUBLE` rather than a plain `NUMBER`.
    suffix_long_double: bool,
    /// Progress matching the literal spelling of `Infinity`/`NaN`.
    keyword_pos: usize,
    flags: crate::ParserFlags,
}

impl<R: Read> Tokenizer<R> {
    pub(crate) fn new(inner: R, max_depth: u32, flags: crate::ParserFlags) -> Self {
        Self {
            source: CharSource::new(inner),
            state: State::Data,
            escape_return: State::ValueDoubleQuoted,
            interp_resume: None,
            curr_ch: EOF,
            curr_loc: Location::default(),
            temp_buffer: TextBuffer::new(),
            hex_scratch: String::new(),
            ejson_stack: MarkerStack::new(),
            vcm_stack: FocusStack::new(),
            reattach_stack: Vec::new(),
            vcm: Vcm::new(),
            vcm_node: None,
            depth: DepthTracker::new(max_depth),
            bs_kind: None,
            nr_quoted: 0,
            prev_separator: None,
            number_negative: false,
            suffix_unsigned: false,
            suffix_long: false,
            suffix_long_double: false,
            keyword_pos: 0,
            flags,
        }
    }

    /// Mirrors the original C parser's `PRINT_STATE`-gated trace: one line
    /// per dispatch step naming the state and the code point it examined.
    fn trace_transition(&self) {
        if self.flags.contains(crate::ParserFlags::PRINT_LOG) {
            let ch = if self.curr_ch == EOF {
                "<EOF>".to_string()
            } else {
                self.curr_ch.to_string()
            };
            eprintln!(
                "{:?}: {:?} @ {}:{}",
                self.state, ch, self.curr_loc.line, self.curr_loc.column
            );
        }
    }

    pub(crate) fn run(mut self) -> Result<VcmTree, Error> {
        self.advance_input()?;
        loop {
            self.trace_transition();
            match self.step() {
                Transition::Advance(next) => {
                    self.state = next;
                    self.advance_input()?;
                }
                Transition::Reconsume(next) => {
                    self.state = next;
                }
                Transition::EnterEscape(return_to) => {
                    self.escape_return = return_to;
                    self.state = State::StringEscape;
                    self.advance_input()?;
                }
                Transition::Fail(kind) => return Err(self.error(kind)),
                Transition::Done => break,
            }
        }
        let root = self
            .vcm_node
            .ok_or_else(|| Error::new(ErrorKind::UnexpectedEof, self.curr_loc.line, self.curr_loc.column, None))?;
        Ok(VcmTree::new(self.vcm, root))
    }

    fn advance_input(&mut self) -> Result<(), Error> {
        match self.source.next() {
            Next::Char(cp) => {
                self.curr_ch = cp.ch;
                self.curr_loc = cp.location;
            }
            Next::Eof(loc) => {
                self.curr_ch = EOF;
                self.curr_loc = loc;
            }
            Next::Invalid(loc) => return Err(Error::new(ErrorKind::BadEncoding, loc.line, loc.column, None)),
        }
        // Dispatch-preamble `prev_separator` check (spec §4.4.1): runs on
        // every freshly-read code point, before any state gets to look at
        // it, so `,,` fails the same way no matter which state is active.
        if is_structural_separator(self.curr_ch) {
            if self.prev_separator == Some(',') && self.curr_ch == ',' {
                return Err(self.error(ErrorKind::UnexpectedComma));
            }
            self.prev_separator = Some(self.curr_ch);
        } else if !is_ws(self.curr_ch) {
            self.prev_separator = None;
        }
        Ok(())
    }

    fn error(&self, kind: ErrorKind) -> Error {
        let culprit = if self.curr_ch == EOF { None } else { Some(self.curr_ch) };
        Error::new(kind, self.curr_loc.line, self.curr_loc.column, culprit)
    }

    // -- focus management, mirroring the original macros of the same name --

    /// Attach a completed leaf value as a child of the current focus, or
    /// make it the root if nothing is open yet.
    fn append_as_vcm_child(&mut self, leaf: VcmId) {
        match self.vcm_node {
            Some(parent) => self.vcm.append_child(parent, leaf),
            None => self.vcm_node = Some(leaf),
        }
    }

    /// Open a new container/operator node as a fresh sibling value: attach
    /// it under the current focus (suspending that focus), then make it the
    /// new focus.
    fn update_vcm_node(&mut self, new_node: VcmId) {
        if let Some(parent) = self.vcm_node {
            self.vcm.append_child(parent, new_node);
            self.vcm_stack.push(parent);
        }
        self.vcm_node = Some(new_node);
    }

    /// Close the current focus. `update_vcm_node` already attached it into
    /// its parent (and suspended that parent) back when it was opened, so
    /// closing it is just restoring the suspended parent as focus — or, if
    /// there was none, leaving the finished node itself as focus (it's the
    /// root).
    fn pop_as_vcm_parent_and_update(&mut self) {
        if let Some(parent) = self.vcm_stack.pop() {
            self.vcm_node = Some(parent);
        }
    }

    /// Wrap the current focus in `new_node`: splice `new_node` into the
    /// tree slot the old focus occupied (or just take over as root if it
    /// had none), adopt the old focus as `new_node`'s first child, and make
    /// `new_node` the new focus. Used for JSONEE chain continuations
    /// (`.x`, `[i]`, a getter/setter call) where the thing being wrapped is
    /// already placed in the tree.
    fn wrap_chain_head(&mut self, new_node: VcmId) {
        if let Some(old_head) = self.vcm_node {
            if let Some(parent) = self.vcm.parent(old_head) {
                self.vcm.replace_child(parent, old_head, new_node);
            }
            self.vcm.append_child(new_node, old_head);
        }
        self.vcm_node = Some(new_node);
    }

    fn flush_temp_buffer_as_string_child(&mut self) {
        let bytes = self.temp_buffer.as_bytes().to_vec();
        let node = self.vcm.new_string(bytes);
        self.append_as_vcm_child(node);
        self.temp_buffer.reset();
    }

    /// Finish a quoted string value: if it was interpolated (the focus is a
    /// `CONCAT_STRING` opened by [`Tokenizer::begin_interpolation`]), flush
    /// any trailing literal text and close the concat node; otherwise just
    /// emit a plain `STRING`.
    fn finish_string_value(&mut self) {
        let is_concat = self
            .vcm_node
            .map(|id| self.vcm.tag(id) == VcmTag::ConcatString)
            .unwrap_or(false);
        if is_concat {
            if !self.temp_buffer.is_empty() {
                self.flush_temp_buffer_as_string_child();
            }
            self.pop_as_vcm_parent_and_update();
        } else {
            let bytes = self.temp_buffer.as_bytes().to_vec();
            let node = self.vcm.new_string(bytes);
            self.append_as_vcm_child(node);
            self.temp_buffer.reset();
        }
    }

    fn ensure_concat_focus(&mut self) {
        let is_concat = self
            .vcm_node
            .map(|id| self.vcm.tag(id) == VcmTag::ConcatString)
            .unwrap_or(false);
        if !is_concat {
            let concat = self.vcm.new_concat_string();
            self.update_vcm_node(concat);
        }
    }

    /// A bare `$` appeared inside a quoted string: flush any literal text
    /// accumulated so far as a `STRING` child of a (possibly newly opened)
    /// `CONCAT_STRING`, then divert into the variable grammar. `resume`
    /// marks which quoted-value state `AfterValue` should return to once
    /// the chain closes.
    fn begin_interpolation(&mut self, resume: State) -> Transition {
        self.ensure_concat_focus();
        if !self.temp_buffer.is_empty() {
            self.flush_temp_buffer_as_string_child();
        }
        self.ejson_stack.push(Marker::Dollar);
        self.interp_resume = Some(resume);
        Transition::Reconsume(State::Dollar)
    }

    fn finish_number(&mut self) -> bool {
        let text = self.temp_buffer.as_str();
        let node = if self.suffix_long_double {
            numeric::parse_long_double(text).map(|v| self.vcm.new_long_double(v))
        } else if self.suffix_long && self.suffix_unsigned {
            numeric::parse_u_long_int(text).map(|v| self.vcm.new_u_long_int(v))
        } else if self.suffix_long {
            numeric::parse_long_int(text).map(|v| self.vcm.new_long_int(v))
        } else if self.suffix_unsigned {
            numeric::parse_u_long_int(text).map(|v| self.vcm.new_u_long_int(v))
        } else {
            numeric::parse_number(text).map(|v| self.vcm.new_number(v))
        };
        match node {
            Some(id) => {
                self.append_as_vcm_child(id);
                true
            }
            None => false,
        }
    }

    fn step(&mut self) -> Transition {
        match self.state {
            State::Data => self.st_data(),
            State::Control => self.st_control(),
            State::LeftBrace => self.st_left_brace(),
            State::RightBrace => self.st_right_brace(),
            State::LeftBracket => self.st_left_bracket(),
            State::RightBracket => self.st_right_bracket(),
            State::SubscriptOpen => self.st_subscript_open(),
            State::LeftParenthesis => self.st_left_parenthesis(),
            State::AfterLeftParen => self.st_after_left_paren(),
            State::RightParenthesis => self.st_right_parenthesis(),
            State::AfterValue => self.st_after_value(),
            State::BeforeName => self.st_before_name(),
            State::AfterName => self.st_after_name(),
            State::NameUnquoted => self.st_name_unquoted(),
            State::NameSingleQuoted => self.st_name_single_quoted(),
            State::NameDoubleQuoted => self.st_name_double_quoted(),
            State::NameThreeDoubleQuoted => self.st_name_three_double_quoted(),
            State::ValueSingleQuoted => self.st_value_single_quoted(),
            State::ValueDoubleQuoted => self.st_value_double_quoted(),
            State::ValueThreeDoubleQuoted => self.st_value_three_double_quoted(),
            State::Number => self.st_number(),
            State::NumberInteger => self.st_number_integer(),
            State::NumberFraction => self.st_number_fraction(),
            State::NumberExponent => self.st_number_exponent(),
            State::NumberExponentInteger => self.st_number_exponent_integer(),
            State::NumberSuffixInteger => self.st_number_suffix_integer(),
            State::NumberSuffixLongDouble => self.st_number_suffix_long_double(),
            State::AfterValueNumber => self.st_after_value_number(),
            State::NumberInfinity => self.st_number_infinity(),
            State::Nan => self.st_nan(),
            State::ByteSequence => self.st_byte_sequence(),
            State::HexByteSequence => self.st_hex_byte_sequence(),
            State::BinaryByteSequence => self.st_binary_byte_sequence(),
            State::Base64ByteSequence => self.st_base64_byte_sequence(),
            State::AfterByteSequence => self.st_after_byte_sequence(),
            State::Keyword => self.st_keyword(),
            State::AfterKeyword => self.st_after_keyword(),
            State::StringEscape => self.st_string_escape(),
            State::StringEscapeFourHexDigits => self.st_string_escape_four_hex_digits(),
            State::Dollar => self.st_dollar(),
            State::JsoneeVariable => self.st_jsonee_variable(),
            State::JsoneeFullStop => self.st_jsonee_full_stop(),
            State::JsoneeKeyword => self.st_jsonee_keyword(),
            State::JsoneeString => self.st_jsonee_string(),
            State::AfterJsoneeString => self.st_after_jsonee_string(),
        }
    }

    // -- top-level dispatch --

    fn st_data(&mut self) -> Transition {
        if is_ws(self.curr_ch) {
            return Transition::Advance(State::Data);
        }
        if self.curr_ch == EOF {
            return Transition::Fail(ErrorKind::UnexpectedEof);
        }
        Transition::Reconsume(State::Control)
    }

    fn st_control(&mut self) -> Transition {
        match self.curr_ch {
            '{' => Transition::Reconsume(State::LeftBrace),
            '}' => Transition::Reconsume(State::RightBrace),
            '[' => Transition::Reconsume(State::LeftBracket),
            ']' => Transition::Reconsume(State::RightBracket),
            ')' => Transition::Reconsume(State::RightParenthesis),
            '<' | '>' | '/' if self.ejson_stack.is_empty() && self.vcm_node.is_some() => Transition::Done,
            '"' => {
                self.temp_buffer.reset();
                self.nr_quoted = 0;
                Transition::Advance(State::ValueDoubleQuoted)
            }
            '\'' => {
                self.temp_buffer.reset();
                Transition::Advance(State::ValueSingleQuoted)
            }
            '$' => Transition::Reconsume(State::Dollar),
            't' | 'f' | 'n' => {
                self.temp_buffer.reset();
                Transition::Reconsume(State::Keyword)
            }
            'I' => {
                self.temp_buffer.reset();
                self.keyword_pos = 0;
                self.number_negative = false;
                Transition::Reconsume(State::NumberInfinity)
            }
            'N' => {
                self.temp_buffer.reset();
                self.keyword_pos = 0;
                Transition::Reconsume(State::Nan)
            }
            'b' => {
                self.temp_buffer.reset();
                self.bs_kind = None;
                Transition::Reconsume(State::ByteSequence)
            }
            c if c.is_ascii_digit() || c == '-' => {
                self.temp_buffer.reset();
                self.number_negative = false;
                self.suffix_unsigned = false;
                self.suffix_long = false;
                self.suffix_long_double = false;
                Transition::Reconsume(State::Number)
            }
            EOF => Transition::Fail(ErrorKind::UnexpectedEof),
            // Anything else reaching the central dispatcher (e.g. the `h` of
            // a bare `hello $name`) starts an implicit, unquoted
            // string-concatenation run rather than failing outright (spec
            // §4.4.2's "Fallback: reconsume in JSONEE_STRING").
            _ => {
                self.temp_buffer.reset();
                // Only mark a genuinely bare top-level run; if a container
                // marker (`{ [ ( :`) is already on top, leave it there so
                // the run still ends at that container's own closer.
                if self.ejson_stack.is_empty() {
                    self.ejson_stack.push(Marker::Unquoted);
                }
                Transition::Reconsume(State::JsoneeString)
            }
        }
    }

    // -- containers --

    fn st_left_brace(&mut self) -> Transition {
        if self.depth.enter() {
            return Transition::Fail(ErrorKind::MaxDepthExceeded);
        }
        let obj = self.vcm.new_object();
        self.ejson_stack.push(Marker::Brace);
        self.reattach_stack.push(true);
        self.update_vcm_node(obj);
        Transition::Advance(State::BeforeName)
    }

    fn st_right_brace(&mut self) -> Transition {
        match self.ejson_stack.top() {
            Some(Marker::Brace) => {
                self.ejson_stack.pop();
                self.depth.leave();
                self.reattach_stack.pop();
                self.pop_as_vcm_parent_and_update();
                Transition::Advance(State::AfterValue)
            }
            Some(Marker::Protected) => {
                self.ejson_stack.pop();
                // `${...}` is sugar for `$...`: mark the node it produced
                // so an evaluator can tell the protected spelling apart
                // from a bare `$name` that happens to parse the same way.
                if let Some(node) = self.vcm_node {
                    self.vcm.set_extra(node, Extra::PROTECT | Extra::SUGAR);
                }
                self.pop_as_vcm_parent_and_update();
                Transition::Advance(State::AfterValue)
            }
            _ => Transition::Fail(ErrorKind::UnexpectedRightBrace),
        }
    }

    fn st_left_bracket(&mut self) -> Transition {
        if self.depth.enter() {
            return Transition::Fail(ErrorKind::MaxDepthExceeded);
        }
        let arr = self.vcm.new_array();
        self.ejson_stack.push(Marker::Bracket);
        self.reattach_stack.push(true);
        self.update_vcm_node(arr);
        Transition::Advance(State::Data)
    }

    fn st_right_bracket(&mut self) -> Transition {
        match self.ejson_stack.top() {
            Some(Marker::Bracket) => {
                self.ejson_stack.pop();
                self.depth.leave();
                let reattach = self.reattach_stack.pop().unwrap_or(true);
                if reattach {
                    self.pop_as_vcm_parent_and_update();
                }
                Transition::Advance(State::AfterValue)
            }
            _ => Transition::Fail(ErrorKind::UnexpectedRightBracket),
        }
    }

    /// `[` reached from `AfterValue`: a subscript on the preceding value
    /// (`$a[0]`), not an array literal. Wraps the current focus in a new
    /// `GET_ELEMENT` whose second child is the bracketed key expression.
    fn st_subscript_open(&mut self) -> Transition {
        if self.depth.enter() {
            return Transition::Fail(ErrorKind::MaxDepthExceeded);
        }
        let elem = self.vcm.new_get_element();
        self.ejson_stack.push(Marker::Bracket);
        self.reattach_stack.push(false);
        self.wrap_chain_head(elem);
        Transition::Advance(State::Data)
    }

    fn st_left_parenthesis(&mut self) -> Transition {
        Transition::Advance(State::AfterLeftParen)
    }

    /// One character of lookahead past `(` decides getter (`(`) vs setter
    /// (`(!`). Either way this is always a chain continuation — getter/
    /// setter calls only ever follow a JSONEE value — so it wraps the
    /// current focus rather than opening a fresh sibling.
    fn st_after_left_paren(&mut self) -> Transition {
        if self.depth.enter() {
            return Transition::Fail(ErrorKind::MaxDepthExceeded);
        }
        if self.curr_ch == '!' {
            let node = self.vcm.new_call_setter();
            self.ejson_stack.push(Marker::SetterParen);
            self.reattach_stack.push(false);
            self.wrap_chain_head(node);
            Transition::Advance(State::Data)
        } else {
            let node = self.vcm.new_call_getter();
            self.ejson_stack.push(Marker::Paren);
            self.reattach_stack.push(false);
            self.wrap_chain_head(node);
            Transition::Reconsume(State::Data)
        }
    }

    fn st_right_parenthesis(&mut self) -> Transition {
        match self.ejson_stack.top() {
            Some(Marker::Paren) | Some(Marker::SetterParen) => {
                self.ejson_stack.pop();
                self.depth.leave();
                let reattach = self.reattach_stack.pop().unwrap_or(true);
                if reattach {
                    self.pop_as_vcm_parent_and_update();
                }
                Transition::Advance(State::AfterValue)
            }
            _ => Transition::Fail(ErrorKind::UnexpectedCharacter),
        }
    }

    fn st_after_value(&mut self) -> Transition {
        if self.ejson_stack.top() == Some(Marker::Dollar) {
            self.ejson_stack.pop();
            let resume = self.interp_resume.take().unwrap_or(State::ValueDoubleQuoted);
            return Transition::Reconsume(resume);
        }
        if self.ejson_stack.top() == Some(Marker::Colon) {
            self.ejson_stack.pop();
        }
        match self.curr_ch {
            c if is_ws(c) => Transition::Advance(State::AfterValue),
            ',' => match self.ejson_stack.top() {
                Some(Marker::Brace) => Transition::Advance(State::BeforeName),
                Some(Marker::Bracket) | Some(Marker::Paren) | Some(Marker::SetterParen) => {
                    Transition::Advance(State::Data)
                }
                _ => Transition::Fail(ErrorKind::UnexpectedComma),
            },
            '}' => Transition::Reconsume(State::RightBrace),
            ']' => Transition::Reconsume(State::RightBracket),
            ')' => Transition::Reconsume(State::RightParenthesis),
            '.' => Transition::Reconsume(State::JsoneeFullStop),
            '(' => Transition::Reconsume(State::LeftParenthesis),
            '[' => Transition::Reconsume(State::SubscriptOpen),
            // Early-termination carve-out (spec §4.4.2): `$a<b` is a
            // complete eJSON value `$a` immediately followed by HVML markup
            // this parser doesn't own; stop successfully instead of
            // treating `<`/`>`/`/` as malformed trailing input.
            '<' | '>' | '/' if self.ejson_stack.is_empty() && self.vcm_node.is_some() => Transition::Done,
            EOF if self.ejson_stack.is_empty() => Transition::Done,
            EOF => Transition::Fail(ErrorKind::UnexpectedEof),
            _ => Transition::Fail(ErrorKind::UnexpectedCharacter),
        }
    }

    // -- object keys --

    fn st_before_name(&mut self) -> Transition {
        if is_ws(self.curr_ch) {
            return Transition::Advance(State::BeforeName);
        }
        if self.curr_ch == '}' {
            return Transition::Reconsume(State::RightBrace);
        }
        if self.curr_ch == '"' {
            self.temp_buffer.reset();
            self.nr_quoted = 0;
            return Transition::Advance(State::NameDoubleQuoted);
        }
        if self.curr_ch == '\'' {
            self.temp_buffer.reset();
            return Transition::Advance(State::NameSingleQuoted);
        }
        if self.curr_ch == EOF {
            return Transition::Fail(ErrorKind::UnexpectedEof);
        }
        if is_name_start(self.curr_ch) {
            self.temp_buffer.reset();
            self.temp_buffer.push_char(self.curr_ch);
            return Transition::Advance(State::NameUnquoted);
        }
        Transition::Fail(ErrorKind::BadJsoneeName)
    }

    fn st_after_name(&mut self) -> Transition {
        if is_ws(self.curr_ch) {
            return Transition::Advance(State::AfterName);
        }
        if self.curr_ch == ':' {
            self.ejson_stack.push(Marker::Colon);
            return Transition::Advance(State::Data);
        }
        if self.curr_ch == EOF {
            return Transition::Fail(ErrorKind::UnexpectedEof);
        }
        Transition::Fail(ErrorKind::UnexpectedCharacter)
    }

    fn st_name_unquoted(&mut self) -> Transition {
        if is_name_continue(self.curr_ch) {
            self.temp_buffer.push_char(self.curr_ch);
            return Transition::Advance(State::NameUnquoted);
        }
        if self.curr_ch == '$' {
            // An unquoted key mixing literal text and a variable reference
            // (`{foo$bar: 1}`): open the concat, flush what's accumulated so
            // far, and resume right back here once the variable closes, same
            // as a `$` inside a quoted value.
            return self.begin_interpolation(State::NameUnquoted);
        }
        if !self.temp_buffer.is_empty() {
            self.flush_temp_buffer_as_string_child();
        }
        let is_concat = self
            .vcm_node
            .map(|id| self.vcm.tag(id) == VcmTag::ConcatString)
            .unwrap_or(false);
        if is_concat {
            self.pop_as_vcm_parent_and_update();
        }
        Transition::Reconsume(State::AfterName)
    }

    fn st_name_single_quoted(&mut self) -> Transition {
        if self.curr_ch == EOF {
            return Transition::Fail(ErrorKind::UnexpectedEof);
        }
        if self.curr_ch == '\'' {
            self.flush_temp_buffer_as_string_child();
            return Transition::Advance(State::AfterName);
        }
        self.temp_buffer.push_char(self.curr_ch);
        Transition::Advance(State::NameSingleQuoted)
    }

    /// Resolves the empty-name-vs-triple-quote ambiguity: the first two
    /// `"` seen with an empty buffer are held in `nr_quoted`, not written to
    /// the buffer; a third makes it a triple-quoted name, anything else
    /// means the name was simply empty.
    fn st_name_double_quoted(&mut self) -> Transition {
        if self.curr_ch == '"' {
            if self.temp_buffer.is_empty() {
                if self.nr_quoted == 0 {
                    self.nr_quoted = 1;
                    return Transition::Advance(State::NameDoubleQuoted);
                }
                self.nr_quoted = 0;
                return Transition::Advance(State::NameThreeDoubleQuoted);
            }
            self.flush_temp_buffer_as_string_child();
            return Transition::Advance(State::AfterName);
        }
        // A lone `"` followed by anything but another `"` (including EOF)
        // closed an empty name; must be checked before the EOF-fails-below
        // branch so a name ending exactly at `""`<EOF> still succeeds.
        if self.nr_quoted == 1 && self.temp_buffer.is_empty() {
            self.nr_quoted = 0;
            let s = self.vcm.new_string(Vec::new());
            self.append_as_vcm_child(s);
            return Transition::Reconsume(State::AfterName);
        }
        if self.curr_ch == EOF {
            return Transition::Fail(ErrorKind::UnexpectedEof);
        }
        self.temp_buffer.push_char(self.curr_ch);
        Transition::Advance(State::NameDoubleQuoted)
    }

    fn st_name_three_double_quoted(&mut self) -> Transition {
        if self.curr_ch == EOF {
            return Transition::Fail(ErrorKind::UnexpectedEof);
        }
        self.temp_buffer.push_char(self.curr_ch);
        if self.temp_buffer.ends_with_bytes(b"\"\"\"") {
            self.temp_buffer.delete_tail_chars(3);
            self.flush_temp_buffer_as_string_child();
            return Transition::Advance(State::AfterName);
        }
        Transition::Advance(State::NameThreeDoubleQuoted)
    }

    // -- quoted string values --

    fn st_value_single_quoted(&mut self) -> Transition {
        if self.curr_ch == EOF {
            return Transition::Fail(ErrorKind::UnexpectedEof);
        }
        if self.curr_ch == '\\' {
            return Transition::EnterEscape(State::ValueSingleQuoted);
        }
        if self.curr_ch == '$' {
            return self.begin_interpolation(State::ValueSingleQuoted);
        }
        if self.curr_ch == '\'' {
            self.finish_string_value();
            return Transition::Advance(State::AfterValue);
        }
        self.temp_buffer.push_char(self.curr_ch);
        Transition::Advance(State::ValueSingleQuoted)
    }

    fn st_value_double_quoted(&mut self) -> Transition {
        if self.curr_ch == '\\' {
            return Transition::EnterEscape(State::ValueDoubleQuoted);
        }
        if self.curr_ch == '$' {
            return self.begin_interpolation(State::ValueDoubleQuoted);
        }
        if self.curr_ch == '"' {
            if self.temp_buffer.is_empty() {
                if self.nr_quoted == 0 {
                    self.nr_quoted = 1;
                    return Transition::Advance(State::ValueDoubleQuoted);
                }
                self.nr_quoted = 0;
                return Transition::Advance(State::ValueThreeDoubleQuoted);
            }
            self.finish_string_value();
            return Transition::Advance(State::AfterValue);
        }
        // Checked before the EOF-fails branch: a lone `"` at end-of-input
        // is a complete empty string, not a truncation error.
        if self.nr_quoted == 1 && self.temp_buffer.is_empty() {
            self.nr_quoted = 0;
            let s = self.vcm.new_string(Vec::new());
            self.append_as_vcm_child(s);
            return Transition::Reconsume(State::AfterValue);
        }
        if self.curr_ch == EOF {
            return Transition::Fail(ErrorKind::UnexpectedEof);
        }
        self.temp_buffer.push_char(self.curr_ch);
        Transition::Advance(State::ValueDoubleQuoted)
    }

    /// Raw (no escapes, no interpolation) triple-quoted string body,
    /// terminated by a literal `"""`.
    fn st_value_three_double_quoted(&mut self) -> Transition {
        if self.curr_ch == EOF {
            return Transition::Fail(ErrorKind::UnexpectedEof);
        }
        self.temp_buffer.push_char(self.curr_ch);
        if self.temp_buffer.ends_with_bytes(b"\"\"\"") {
            self.temp_buffer.delete_tail_chars(3);
            self.finish_string_value();
            return Transition::Advance(State::AfterValue);
        }
        Transition::Advance(State::ValueThreeDoubleQuoted)
    }

    // -- numbers --

    fn st_number(&mut self) -> Transition {
        if self.curr_ch == '-' && self.temp_buffer.is_empty() {
            self.temp_buffer.push_char('-');
            self.number_negative = true;
            return Transition::Advance(State::Number);
        }
        if self.temp_buffer.equals_bytes(b"-") && self.curr_ch == 'I' {
            self.temp_buffer.reset();
            self.keyword_pos = 0;
            return Transition::Reconsume(State::NumberInfinity);
        }
        if self.curr_ch.is_ascii_digit() {
            self.temp_buffer.push_char(self.curr_ch);
            return Transition::Advance(State::NumberInteger);
        }
        Transition::Fail(ErrorKind::BadJsonNumber)
    }

    fn st_number_integer(&mut self) -> Transition {
        if self.curr_ch.is_ascii_digit() {
            self.temp_buffer.push_char(self.curr_ch);
            return Transition::Advance(State::NumberInteger);
        }
        if self.curr_ch == '.' {
            self.temp_buffer.push_char('.');
            return Transition::Advance(State::NumberFraction);
        }
        if self.curr_ch == 'e' || self.curr_ch == 'E' {
            self.temp_buffer.push_char(self.curr_ch);
            return Transition::Advance(State::NumberExponent);
        }
        if self.curr_ch == 'U' || self.curr_ch == 'L' {
            return Transition::Reconsume(State::NumberSuffixInteger);
        }
        Transition::Reconsume(State::AfterValueNumber)
    }

    fn st_number_fraction(&mut self) -> Transition {
        if self.curr_ch.is_ascii_digit() {
            self.temp_buffer.push_char(self.curr_ch);
            return Transition::Advance(State::NumberFraction);
        }
        if self.curr_ch == 'e' || self.curr_ch == 'E' {
            self.temp_buffer.push_char(self.curr_ch);
            return Transition::Advance(State::NumberExponent);
        }
        if self.curr_ch == 'F' && self.temp_buffer.is_number_literal() {
            self.suffix_long_double = true;
            return Transition::Advance(State::NumberSuffixLongDouble);
        }
        if self.temp_buffer.is_number_literal() {
            Transition::Reconsume(State::AfterValueNumber)
        } else {
            Transition::Fail(ErrorKind::BadJsonNumber)
        }
    }

    fn st_number_exponent(&mut self) -> Transition {
        if self.curr_ch == '+' || self.curr_ch == '-' || self.curr_ch.is_ascii_digit() {
            self.temp_buffer.push_char(self.curr_ch);
            return Transition::Advance(State::NumberExponentInteger);
        }
        Transition::Fail(ErrorKind::BadJsonNumber)
    }

    fn st_number_exponent_integer(&mut self) -> Transition {
        if self.curr_ch.is_ascii_digit() {
            self.temp_buffer.push_char(self.curr_ch);
            return Transition::Advance(State::NumberExponentInteger);
        }
        if self.curr_ch == 'F' && self.temp_buffer.is_number_literal() {
            self.suffix_long_double = true;
            return Transition::Advance(State::NumberSuffixLongDouble);
        }
        if self.temp_buffer.is_number_literal() {
            Transition::Reconsume(State::AfterValueNumber)
        } else {
            Transition::Fail(ErrorKind::BadJsonNumber)
        }
    }

    fn st_number_suffix_integer(&mut self) -> Transition {
        if self.curr_ch == 'U' && !self.suffix_unsigned {
            self.suffix_unsigned = true;
            return Transition::Advance(State::NumberSuffixInteger);
        }
        if self.curr_ch == 'L' && !self.suffix_long {
            self.suffix_long = true;
            return Transition::Advance(State::NumberSuffixInteger);
        }
        Transition::Reconsume(State::AfterValueNumber)
    }

    /// Consumes the optional trailing `L` of an `FL` long-double suffix
    /// (`F` alone is also accepted, matching spec.md's `12.5FL`/`12.5F`).
    fn st_number_suffix_long_double(&mut self) -> Transition {
        if self.curr_ch == 'L' {
            return Transition::Advance(State::AfterValueNumber);
        }
        Transition::Reconsume(State::AfterValueNumber)
    }

    fn st_after_value_number(&mut self) -> Transition {
        if self.temp_buffer.is_empty() {
            return Transition::Reconsume(State::AfterValue);
        }
        let ok = self.finish_number();
        self.temp_buffer.reset();
        self.suffix_unsigned = false;
        self.suffix_long = false;
        self.suffix_long_double = false;
        self.number_negative = false;
        if ok {
            Transition::Reconsume(State::AfterValue)
        } else {
            Transition::Fail(ErrorKind::BadJsonNumber)
        }
    }

    fn st_number_infinity(&mut self) -> Transition {
        let expected = INFINITY_LITERAL.as_bytes();
        if self.keyword_pos >= expected.len() || self.curr_ch as u32 != expected[self.keyword_pos] as u32 {
            return Transition::Fail(ErrorKind::BadJsonNumber);
        }
        self.keyword_pos += 1;
        if self.keyword_pos == expected.len() {
            let v = if self.number_negative {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            };
            let node = self.vcm.new_number(v);
            self.append_as_vcm_child(node);
            self.keyword_pos = 0;
            self.number_negative = false;
            return Transition::Advance(State::AfterValue);
        }
        Transition::Advance(State::NumberInfinity)
    }

    fn st_nan(&mut self) -> Transition {
        let expected = NAN_LITERAL.as_bytes();
        if self.keyword_pos >= expected.len() || self.curr_ch as u32 != expected[self.keyword_pos] as u32 {
            return Transition::Fail(ErrorKind::UnexpectedCharacter);
        }
        self.keyword_pos += 1;
        if self.keyword_pos == expected.len() {
            let node = self.vcm.new_number(f64::NAN);
            self.append_as_vcm_child(node);
            self.keyword_pos = 0;
            return Transition::Advance(State::AfterValue);
        }
        Transition::Advance(State::Nan)
    }

    // -- byte sequences --

    fn st_byte_sequence(&mut self) -> Transition {
        if self.temp_buffer.is_empty() {
            self.temp_buffer.push_char(self.curr_ch);
            return Transition::Advance(State::ByteSequence);
        }
        match self.curr_ch {
            'x' => {
                self.bs_kind = Some(ByteSeqKind::Hex);
                self.temp_buffer.reset();
                Transition::Advance(State::HexByteSequence)
            }
            'b' => {
                self.bs_kind = Some(ByteSeqKind::Binary);
                self.temp_buffer.reset();
                Transition::Advance(State::BinaryByteSequence)
            }
            '6' => {
                self.bs_kind = Some(ByteSeqKind::Base64);
                self.temp_buffer.reset();
                Transition::Advance(State::Base64ByteSequence)
            }
            _ => Transition::Fail(ErrorKind::UnexpectedCharacter),
        }
    }

    fn st_hex_byte_sequence(&mut self) -> Transition {
        if self.curr_ch.is_ascii_hexdigit() {
            self.temp_buffer.push_char(self.curr_ch);
            return Transition::Advance(State::HexByteSequence);
        }
        Transition::Reconsume(State::AfterByteSequence)
    }

    fn st_binary_byte_sequence(&mut self) -> Transition {
        if matches!(self.curr_ch, '0' | '1' | '.') {
            self.temp_buffer.push_char(self.curr_ch);
            return Transition::Advance(State::BinaryByteSequence);
        }
        Transition::Reconsume(State::AfterByteSequence)
    }

    fn st_base64_byte_sequence(&mut self) -> Transition {
        let c = self.curr_ch;
        if c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=' {
            if self.temp_buffer.last_char() == Some('=') && c != '=' {
                return Transition::Fail(ErrorKind::UnexpectedBase64);
            }
            self.temp_buffer.push_char(c);
            return Transition::Advance(State::Base64ByteSequence);
        }
        Transition::Reconsume(State::AfterByteSequence)
    }

    fn st_after_byte_sequence(&mut self) -> Transition {
        let decoded = match self.bs_kind {
            Some(ByteSeqKind::Hex) => numeric::decode_hex(self.temp_buffer.as_str()),
            Some(ByteSeqKind::Binary) => numeric::decode_binary(self.temp_buffer.as_str()),
            Some(ByteSeqKind::Base64) => numeric::decode_base64(self.temp_buffer.as_str()),
            None => None,
        };
        match decoded {
            Some(bytes) => {
                let node = self.vcm.new_byte_sequence(bytes);
                self.append_as_vcm_child(node);
                self.temp_buffer.reset();
                self.bs_kind = None;
                Transition::Reconsume(State::AfterValue)
            }
            None => Transition::Fail(ErrorKind::UnexpectedCharacter),
        }
    }

    // -- keywords --

    fn st_keyword(&mut self) -> Transition {
        if self.curr_ch.is_ascii_alphabetic() {
            self.temp_buffer.push_char(self.curr_ch);
            if self.temp_buffer.nr_chars() > 5 {
                return Transition::Fail(ErrorKind::UnexpectedJsonKeyword);
            }
            return Transition::Advance(State::Keyword);
        }
        Transition::Reconsume(State::AfterKeyword)
    }

    fn st_after_keyword(&mut self) -> Transition {
        let node = match self.temp_buffer.as_str() {
            "true" => Some(self.vcm.new_boolean(true)),
            "false" => Some(self.vcm.new_boolean(false)),
            "null" => Some(self.vcm.new_null()),
            _ => None,
        };
        match node {
            Some(node) => {
                self.append_as_vcm_child(node);
                self.temp_buffer.reset();
                Transition::Reconsume(State::AfterValue)
            }
            None => Transition::Fail(ErrorKind::UnexpectedJsonKeyword),
        }
    }

    // -- string escapes (shared by single-, double-, and interpolated
    //    string values) --

    fn st_string_escape(&mut self) -> Transition {
        let resume = self.escape_return;
        match self.curr_ch {
            'n' => {
                self.temp_buffer.push_char('\n');
                Transition::Advance(resume)
            }
            't' => {
                self.temp_buffer.push_char('\t');
                Transition::Advance(resume)
            }
            'r' => {
                self.temp_buffer.push_char('\r');
                Transition::Advance(resume)
            }
            'b' => {
                self.temp_buffer.push_char('\u{0008}');
                Transition::Advance(resume)
            }
            'f' => {
                self.temp_buffer.push_char('\u{000C}');
                Transition::Advance(resume)
            }
            '"' => {
                self.temp_buffer.push_char('"');
                Transition::Advance(resume)
            }
            '\'' => {
                self.temp_buffer.push_char('\'');
                Transition::Advance(resume)
            }
            '\\' => {
                self.temp_buffer.push_char('\\');
                Transition::Advance(resume)
            }
            '/' => {
                self.temp_buffer.push_char('/');
                Transition::Advance(resume)
            }
            '$' => {
                self.temp_buffer.push_char('$');
                Transition::Advance(resume)
            }
            'u' => {
                self.hex_scratch.clear();
                Transition::Advance(State::StringEscapeFourHexDigits)
            }
            EOF => Transition::Fail(ErrorKind::UnexpectedEof),
            _ => Transition::Fail(ErrorKind::BadJsonStringEscapeEntity),
        }
    }

    fn st_string_escape_four_hex_digits(&mut self) -> Transition {
        if self.curr_ch.is_ascii_hexdigit() {
            self.hex_scratch.push(self.curr_ch);
            if self.hex_scratch.len() == 4 {
                let value = u32::from_str_radix(&self.hex_scratch, 16).unwrap_or(0xFFFD);
                let ch = char::from_u32(value).unwrap_or('\u{FFFD}');
                self.temp_buffer.push_char(ch);
                self.hex_scratch.clear();
                return Transition::Advance(self.escape_return);
            }
            return Transition::Advance(State::StringEscapeFourHexDigits);
        }
        Transition::Fail(ErrorKind::BadJsonStringEscapeEntity)
    }

    // -- JSONEE variables and member access --

    fn st_dollar(&mut self) -> Transition {
        let already_get_variable = self
            .vcm_node
            .map(|id| self.vcm.tag(id) == VcmTag::GetVariable)
            .unwrap_or(false);
        if !already_get_variable {
            let gv = self.vcm.new_get_variable();
            self.update_vcm_node(gv);
        }
        Transition::Advance(State::JsoneeVariable)
    }

    fn st_jsonee_variable(&mut self) -> Transition {
        if self.temp_buffer.is_empty() {
            if self.curr_ch == '{' {
                // `${name}` is sugar for `$name` (and generalizes to the
                // same chain continuations, `${a.b}`, `${a()}`, ...): push
                // the marker and keep accumulating the name the normal way,
                // just under a `}` terminator instead of any delimiter.
                self.ejson_stack.push(Marker::Protected);
                return Transition::Advance(State::JsoneeVariable);
            }
            if self.curr_ch == '$' {
                return Transition::Reconsume(State::Dollar);
            }
            if is_name_start(self.curr_ch) {
                self.temp_buffer.push_char(self.curr_ch);
                return Transition::Advance(State::JsoneeVariable);
            }
            return Transition::Fail(ErrorKind::BadJsoneeVariableName);
        }
        if is_name_continue(self.curr_ch) {
            self.temp_buffer.push_char(self.curr_ch);
            return Transition::Advance(State::JsoneeVariable);
        }
        let name = self.vcm.new_string(self.temp_buffer.as_bytes().to_vec());
        self.append_as_vcm_child(name);
        self.temp_buffer.reset();
        // The `${...}` form closes its `GET_VARIABLE` focus via `RightBrace`
        // (`Marker::Protected`); anything else closes it here.
        if self.ejson_stack.top() != Some(Marker::Protected) {
            self.pop_as_vcm_parent_and_update();
        }
        Transition::Reconsume(State::AfterValue)
    }

    fn st_jsonee_full_stop(&mut self) -> Transition {
        self.temp_buffer.reset();
        Transition::Advance(State::JsoneeKeyword)
    }

    /// `.key` member access: wraps the current focus in a `GET_ELEMENT`
    /// whose second child is a literal `STRING` key (unlike `[expr]`, the
    /// key here is always a bareword, never a nested expression).
    fn st_jsonee_keyword(&mut self) -> Transition {
        if self.temp_buffer.is_empty() {
            if is_name_start(self.curr_ch) {
                self.temp_buffer.push_char(self.curr_ch);
                return Transition::Advance(State::JsoneeKeyword);
            }
            return Transition::Fail(ErrorKind::BadJsoneeKeyword);
        }
        if is_name_continue(self.curr_ch) {
            self.temp_buffer.push_char(self.curr_ch);
            return Transition::Advance(State::JsoneeKeyword);
        }
        let key_name = self.vcm.new_string(self.temp_buffer.as_bytes().to_vec());
        let elem = self.vcm.new_get_element();
        self.wrap_chain_head(elem);
        self.vcm.append_child(elem, key_name);
        self.temp_buffer.reset();
        Transition::Reconsume(State::AfterValue)
    }

    /// Top-level implicit string concatenation (spec §4.4.2): bare text
    /// mixed with `$variable` references outside any quotes, e.g. the
    /// `hello $name` that follows a bareword CONTROL couldn't otherwise
    /// dispatch. Whitespace is ordinary content (it separates "hello" from
    /// "$name" without ending the run); only EOF, a structural separator
    /// belonging to an enclosing container, or the `<>/ ` markup carve-out
    /// end it.
    fn st_jsonee_string(&mut self) -> Transition {
        match self.curr_ch {
            '$' => self.begin_interpolation(State::JsoneeString),
            '\\' => Transition::EnterEscape(State::JsoneeString),
            '"' => {
                if !self.temp_buffer.is_empty() {
                    self.flush_temp_buffer_as_string_child();
                }
                Transition::Reconsume(State::AfterJsoneeString)
            }
            // A structural separator always belongs to an enclosing
            // container, never to the bareword text itself. Whitespace,
            // by contrast, is ordinary content here — `hello $name` keeps
            // its separating space — so it's deliberately absent from this
            // arm; only EOF and the markup carve-out below end the run
            // early for reasons other than hitting a container boundary.
            c if c == EOF || is_structural_separator(c) => self.finish_jsonee_string(),
            '<' | '>' | '/' if self.ejson_stack.top() == Some(Marker::Unquoted) => self.finish_jsonee_string(),
            _ => {
                self.temp_buffer.push_char(self.curr_ch);
                Transition::Advance(State::JsoneeString)
            }
        }
    }

    /// Shared tail for every way [`Tokenizer::st_jsonee_string`] can end: flush
    /// the pending literal run, drop the `Unquoted` marker this run may have
    /// pushed (see the `CONTROL` fallback), close the `CONCAT_STRING` focus
    /// if one was opened, and hand the terminating character back to
    /// `AFTER_VALUE`.
    fn finish_jsonee_string(&mut self) -> Transition {
        if !self.temp_buffer.is_empty() {
            self.flush_temp_buffer_as_string_child();
        }
        if self.ejson_stack.top() == Some(Marker::Unquoted) {
            self.ejson_stack.pop();
        }
        let is_concat = self.vcm_node.map(|id| self.vcm.tag(id) == VcmTag::ConcatString).unwrap_or(false);
        if is_concat {
            self.pop_as_vcm_parent_and_update();
        }
        Transition::Reconsume(State::AfterValue)
    }

    /// Closes out a `"` met while accumulating an unquoted concat run
    /// (distinct from the quoted-string grammar's own closing `"`): pops the
    /// concat focus and the `Unquoted` marker, then reconsumes so the `"`
    /// itself is handled by whatever closer is waiting (`}`/`]`/`)`) or
    /// falls through to CONTROL otherwise.
    fn st_after_jsonee_string(&mut self) -> Transition {
        self.pop_as_vcm_parent_and_update();
        if self.ejson_stack.top() == Some(Marker::Unquoted) {
            self.ejson_stack.pop();
        }
        match self.curr_ch {
            '}' => Transition::Reconsume(State::RightBrace),
            ']' => Transition::Reconsume(State::RightBracket),
            ')' => Transition::Reconsume(State::RightParenthesis),
            _ => Transition::Advance(State::Control),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<VcmTree, Error> {
        Tokenizer::new(s.as_bytes(), 32, crate::ParserFlags::NONE).run()
    }

    fn render(s: &str) -> String {
        format!("{:?}", parse(s).unwrap_or_else(|e| panic!("parse {s:?} failed: {e}")).root())
    }

    #[test]
    fn plain_number() {
        assert_eq!(render("42"), "NUMBER(42)");
    }

    #[test]
    fn negative_float() {
        assert_eq!(render("-1.5"), "NUMBER(-1.5)");
    }

    #[test]
    fn long_double_suffix() {
        assert_eq!(render("12.5FL"), "LONG_DOUBLE(12.5)");
        assert_eq!(render("12.5F"), "LONG_DOUBLE(12.5)");
        assert_eq!(render("1e3FL"), "LONG_DOUBLE(1000)");
    }

    #[test]
    fn keywords() {
        assert_eq!(render("true"), "BOOLEAN(true)");
        assert_eq!(render("false"), "BOOLEAN(false)");
        assert_eq!(render("null"), "NULL");
    }

    #[test]
    fn bad_keyword_prefix_at_eof_fails() {
        assert!(parse("tru").is_err());
        assert!(parse("fals").is_err());
        assert!(parse("nul").is_err());
    }

    #[test]
    fn simple_string() {
        assert_eq!(render(r#""hello""#), "STRING(\"hello\")");
    }

    #[test]
    fn empty_double_quoted_string() {
        assert_eq!(render(r#""""#), "STRING(\"\")");
    }

    #[test]
    fn triple_quoted_string_is_raw() {
        assert_eq!(render(r#""""a\nb""""#), "STRING(\"a\\\\nb\")");
    }

    #[test]
    fn string_escapes() {
        assert_eq!(render(r#""a\nb""#), "STRING(\"a\\nb\")");
    }

    #[test]
    fn array_of_numbers() {
        assert_eq!(render("[1, 2, 3]"), "ARRAY[NUMBER(1), NUMBER(2), NUMBER(3)]");
    }

    #[test]
    fn empty_array_and_object() {
        assert_eq!(render("[]"), "ARRAY[]");
        assert_eq!(render("{}"), "OBJECT[]");
    }

    #[test]
    fn object_with_unquoted_key() {
        assert_eq!(render("{a: 1}"), "OBJECT[STRING(\"a\"), NUMBER(1)]");
    }

    #[test]
    fn byte_sequences() {
        assert_eq!(render("bx48656c6c6f"), "BYTE_SEQUENCE([72, 101, 108, 108, 111])");
        assert_eq!(render("bb0000.1111"), "BYTE_SEQUENCE([15])");
    }

    #[test]
    fn infinity_and_nan() {
        assert_eq!(render("Infinity"), "NUMBER(inf)");
        assert_eq!(render("-Infinity"), "NUMBER(-inf)");
        assert_eq!(render("NaN"), "NUMBER(NaN)");
    }

    #[test]
    fn get_variable() {
        assert_eq!(render("$name"), "GET_VARIABLE[STRING(\"name\")]");
    }

    #[test]
    fn protected_variable() {
        assert_eq!(render("${name}"), "GET_VARIABLE[STRING(\"name\")]");
    }

    #[test]
    fn member_access_chain() {
        assert_eq!(
            render("$a.b"),
            "GET_ELEMENT[GET_VARIABLE[STRING(\"a\")], STRING(\"b\")]"
        );
    }

    #[test]
    fn subscript_chain() {
        assert_eq!(
            render("$a[0]"),
            "GET_ELEMENT[GET_VARIABLE[STRING(\"a\")], NUMBER(0)]"
        );
    }

    #[test]
    fn getter_call_chain() {
        assert_eq!(
            render("$a()"),
            "CALL_GETTER[GET_VARIABLE[STRING(\"a\")]]"
        );
    }

    #[test]
    fn setter_call_chain() {
        assert_eq!(
            render("$a(! 1)"),
            "CALL_SETTER[GET_VARIABLE[STRING(\"a\")], NUMBER(1)]"
        );
    }

    #[test]
    fn interpolated_string() {
        assert_eq!(
            render(r#""hi $name!""#),
            "CONCAT_STRING[STRING(\"hi \"), GET_VARIABLE[STRING(\"name\")], STRING(\"!\")]"
        );
    }

    #[test]
    fn unquoted_text_concatenates_with_a_variable() {
        assert_eq!(
            render("hello $name"),
            "CONCAT_STRING[STRING(\"hello \"), GET_VARIABLE[STRING(\"name\")]]"
        );
    }

    #[test]
    fn mixed_unquoted_object_key_concatenates() {
        assert_eq!(
            render("{foo$bar:1}"),
            "OBJECT[CONCAT_STRING[STRING(\"foo\"), GET_VARIABLE[STRING(\"bar\")]], NUMBER(1)]"
        );
    }

    #[test]
    fn stray_comma_fails() {
        assert!(parse("1,2").is_err());
    }

    #[test]
    fn double_comma_is_unexpected_comma() {
        let err = parse("[1,,2]").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnexpectedComma);
    }

    #[test]
    fn markup_after_a_variable_ends_the_value_early() {
        assert_eq!(render("$a<b"), "GET_VARIABLE[STRING(\"a\")]");
    }

    #[test]
    fn unmatched_right_brace_fails() {
        assert!(parse("}").is_err());
    }

    #[test]
    fn depth_limit_is_enforced() {
        let mut nested = String::new();
        for _ in 0..40 {
            nested.push('[');
        }
        nested.push('1');
        for _ in 0..40 {
            nested.push(']');
        }
        let err = Tokenizer::new(nested.as_bytes(), 32, crate::ParserFlags::NONE).run().unwrap_err();
        assert_eq!(err.kind, ErrorKind::MaxDepthExceeded);
    }
}
