//! Byte-level lexical state machine.
//!
//! The lexer does not produce tokens. It labels every byte of the input with
//! the lexical context it sits in, which is all the delimiter matcher needs.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{is_ident_byte, ScanError};

/// How far past `'\` a closing quote may appear (covers `'\u{10FFFF}'`).
const CHAR_ESCAPE_LOOKAHEAD: usize = 10;

/// Lexical context of a single byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexState {
    Code,
    LineComment,
    BlockComment { depth: u32 },
    StringLiteral,
    RawStringLiteral { hashes: u32 },
    CharLiteral,
    /// The byte directly after a `\` inside a string or char literal.
    Escaped,
}

impl LexState {
    pub fn is_comment(&self) -> bool {
        matches!(self, LexState::LineComment | LexState::BlockComment { .. })
    }

    /// Human-readable name used in diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            LexState::Code => "code",
            LexState::LineComment => "line comment",
            LexState::BlockComment { .. } => "block comment",
            LexState::StringLiteral => "string literal",
            LexState::RawStringLiteral { .. } => "raw string literal",
            LexState::CharLiteral => "char literal",
            LexState::Escaped => "escape sequence",
        }
    }
}

/// Delimiter families tracked by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelimiterKind {
    Paren,
    Brace,
    Bracket,
    Angle,
}

impl DelimiterKind {
    pub fn open_byte(self) -> u8 {
        match self {
            DelimiterKind::Paren => b'(',
            DelimiterKind::Brace => b'{',
            DelimiterKind::Bracket => b'[',
            DelimiterKind::Angle => b'<',
        }
    }

    pub fn close_byte(self) -> u8 {
        match self {
            DelimiterKind::Paren => b')',
            DelimiterKind::Brace => b'}',
            DelimiterKind::Bracket => b']',
            DelimiterKind::Angle => b'>',
        }
    }

    pub fn from_open(b: u8) -> Option<Self> {
        match b {
            b'(' => Some(DelimiterKind::Paren),
            b'{' => Some(DelimiterKind::Brace),
            b'[' => Some(DelimiterKind::Bracket),
            b'<' => Some(DelimiterKind::Angle),
            _ => None,
        }
    }

    pub fn from_close(b: u8) -> Option<Self> {
        match b {
            b')' => Some(DelimiterKind::Paren),
            b'}' => Some(DelimiterKind::Brace),
            b']' => Some(DelimiterKind::Bracket),
            b'>' => Some(DelimiterKind::Angle),
            _ => None,
        }
    }
}

impl fmt::Display for DelimiterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DelimiterKind::Paren => write!(f, "paren"),
            DelimiterKind::Brace => write!(f, "brace"),
            DelimiterKind::Bracket => write!(f, "bracket"),
            DelimiterKind::Angle => write!(f, "angle"),
        }
    }
}

/// A balanced region `open..=close` of one delimiter kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelimiterSpan {
    pub open: usize,
    pub close: usize,
    pub kind: DelimiterKind,
}

impl DelimiterSpan {
    pub fn new(open: usize, close: usize, kind: DelimiterKind) -> Self {
        debug_assert!(close > open, "delimiter span must close after it opens");
        Self { open, close, kind }
    }

    /// Byte range strictly between the delimiters.
    pub fn interior(&self) -> (usize, usize) {
        (self.open + 1, self.close)
    }
}

/// Persistent lexer mode. `Escaped` is never a mode, only an output label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Code,
    LineComment,
    BlockComment(u32),
    Str,
    RawStr(u32),
    Char,
}

impl Mode {
    fn visible(self) -> LexState {
        match self {
            Mode::Code => LexState::Code,
            Mode::LineComment => LexState::LineComment,
            Mode::BlockComment(depth) => LexState::BlockComment { depth },
            Mode::Str => LexState::StringLiteral,
            Mode::RawStr(hashes) => LexState::RawStringLiteral { hashes },
            Mode::Char => LexState::CharLiteral,
        }
    }
}

/// Iterator over `(offset, LexState)` for every byte of a source text.
///
/// Yields a single `Err` and stops if a string, char or block comment is
/// still open at end of input.
pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    mode: Mode,
    /// Bytes still owed to the current multi-byte token (`/*`, `*/`, `r#"`).
    carry: usize,
    /// Mode to enter once `carry` runs out.
    resume: Option<Mode>,
    opened_at: usize,
    char_close: usize,
    escape_next: bool,
    done: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            mode: Mode::Code,
            carry: 0,
            resume: None,
            opened_at: 0,
            char_close: 0,
            escape_next: false,
            done: false,
        }
    }

    fn peek(&self, i: usize) -> Option<u8> {
        self.src.as_bytes().get(i).copied()
    }

    /// Leave the current literal after `extra` more bytes.
    fn finish_after(&mut self, extra: usize) {
        if extra == 0 {
            self.mode = Mode::Code;
        } else {
            self.carry = extra;
            self.resume = Some(Mode::Code);
        }
    }

    fn step(&mut self, i: usize) -> Result<LexState, ScanError> {
        let b = self.src.as_bytes()[i];

        if self.carry > 0 {
            self.carry -= 1;
            let current = self.mode.visible();
            if self.carry == 0 {
                if let Some(next) = self.resume.take() {
                    self.mode = next;
                }
            }
            return Ok(current);
        }

        match self.mode {
            Mode::Code => self.step_code(i, b),
            Mode::LineComment => {
                if b == b'\n' {
                    self.mode = Mode::Code;
                    Ok(LexState::Code)
                } else {
                    Ok(LexState::LineComment)
                }
            }
            Mode::BlockComment(depth) => {
                let next = self.peek(i + 1);
                if b == b'/' && next == Some(b'*') {
                    self.mode = Mode::BlockComment(depth + 1);
                    self.carry = 1;
                    Ok(self.mode.visible())
                } else if b == b'*' && next == Some(b'/') {
                    let current = self.mode.visible();
                    if depth == 1 {
                        self.finish_after(1);
                    } else {
                        self.mode = Mode::BlockComment(depth - 1);
                        self.carry = 1;
                    }
                    Ok(current)
                } else {
                    Ok(self.mode.visible())
                }
            }
            Mode::Str | Mode::Char => {
                if self.escape_next {
                    self.escape_next = false;
                    return Ok(LexState::Escaped);
                }
                let current = self.mode;
                if b == b'\\' {
                    self.escape_next = true;
                } else if current == Mode::Str && b == b'"' {
                    self.mode = Mode::Code;
                } else if current == Mode::Char && i == self.char_close {
                    self.mode = Mode::Code;
                }
                Ok(current.visible())
            }
            Mode::RawStr(hashes) => {
                let current = self.mode.visible();
                if b == b'"' && self.closes_raw(i + 1, hashes) {
                    self.finish_after(hashes as usize);
                }
                Ok(current)
            }
        }
    }

    fn step_code(&mut self, i: usize, b: u8) -> Result<LexState, ScanError> {
        let next = self.peek(i + 1);
        match b {
            b'/' if next == Some(b'/') => {
                self.mode = Mode::LineComment;
                self.opened_at = i;
                Ok(LexState::LineComment)
            }
            b'/' if next == Some(b'*') => {
                self.mode = Mode::BlockComment(1);
                self.carry = 1;
                self.opened_at = i;
                Ok(self.mode.visible())
            }
            b'"' => {
                self.mode = Mode::Str;
                self.opened_at = i;
                Ok(LexState::StringLiteral)
            }
            b'r' | b'b' | b'c' => match self.raw_string_open(i) {
                Some((hashes, quote)) => {
                    self.mode = Mode::RawStr(hashes);
                    self.carry = quote - i;
                    self.opened_at = i;
                    Ok(self.mode.visible())
                }
                None => Ok(LexState::Code),
            },
            b'\'' => match self.char_literal_close(i)? {
                Some(close) => {
                    self.mode = Mode::Char;
                    self.char_close = close;
                    self.opened_at = i;
                    Ok(LexState::CharLiteral)
                }
                None => Ok(LexState::Code),
            },
            _ => Ok(LexState::Code),
        }
    }

    /// Detect `r"`, `r#"`, `br"`, `cr#"` at `i`; returns hash count and the
    /// offset of the opening quote.
    fn raw_string_open(&self, i: usize) -> Option<(u32, usize)> {
        let bytes = self.src.as_bytes();
        let r = match bytes[i] {
            b'b' | b'c' if self.peek(i + 1) == Some(b'r') => i + 1,
            b'r' => i,
            _ => return None,
        };
        if i > 0 && is_ident_byte(bytes[i - 1]) {
            return None;
        }

        let mut j = r + 1;
        let mut hashes = 0u32;
        while self.peek(j) == Some(b'#') {
            hashes += 1;
            j += 1;
        }
        (self.peek(j) == Some(b'"')).then_some((hashes, j))
    }

    fn closes_raw(&self, from: usize, hashes: u32) -> bool {
        (0..hashes as usize).all(|k| self.peek(from + k) == Some(b'#'))
    }

    /// Decide whether the quote at `i` opens a char literal.
    ///
    /// Returns the offset of the closing quote, or `None` when the quote is a
    /// lifetime or label (`'a`, `'static`, `'outer:`).
    fn char_literal_close(&self, i: usize) -> Result<Option<usize>, ScanError> {
        match self.peek(i + 1) {
            None => Ok(None),
            Some(b'\\') => {
                let start = i + 3;
                let end = (start + CHAR_ESCAPE_LOOKAHEAD).min(self.src.len());
                let found = self
                    .src
                    .as_bytes()
                    .get(start..end)
                    .and_then(|window| window.iter().position(|&c| c == b'\''));
                match found {
                    Some(off) => Ok(Some(start + off)),
                    None => Err(ScanError::UnterminatedLiteral {
                        what: LexState::CharLiteral.describe(),
                        offset: i,
                    }),
                }
            }
            Some(_) => {
                let ch = match self.src[i + 1..].chars().next() {
                    Some(c) => c,
                    None => return Ok(None),
                };
                if ch == '\'' || ch == '\n' {
                    return Ok(None);
                }
                let close = i + 1 + ch.len_utf8();
                Ok((self.peek(close) == Some(b'\'')).then_some(close))
            }
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<(usize, LexState), ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.pos >= self.src.len() {
            self.done = true;
            return match self.mode {
                Mode::Code | Mode::LineComment => None,
                mode => Some(Err(ScanError::UnterminatedLiteral {
                    what: mode.visible().describe(),
                    offset: self.opened_at,
                })),
            };
        }

        let i = self.pos;
        match self.step(i) {
            Ok(state) => {
                self.pos += 1;
                Some(Ok((i, state)))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn states(src: &str) -> Vec<LexState> {
        Lexer::new(src)
            .map(|r| r.map(|(_, s)| s))
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    fn code_text(src: &str) -> String {
        states(src)
            .iter()
            .zip(src.bytes())
            .filter(|(s, _)| **s == LexState::Code)
            .map(|(_, b)| b as char)
            .collect()
    }

    #[test]
    fn test_line_comment_ends_at_newline() {
        assert_eq!(code_text("a // { b\nc"), "a \nc");
    }

    #[test]
    fn test_block_comments_nest() {
        let src = "a /* x /* y */ still */ b";
        assert_eq!(code_text(src), "a  b");
        let s = states(src);
        let inner = src.find("y").unwrap();
        assert_eq!(s[inner], LexState::BlockComment { depth: 2 });
    }

    #[test]
    fn test_string_escape_consumes_one_byte() {
        let src = r#"x = "a\"{" ; y"#;
        assert_eq!(code_text(src), "x =  ; y");
        let s = states(src);
        let escaped = src.find("\\\"").unwrap() + 1;
        assert_eq!(s[escaped], LexState::Escaped);
    }

    #[test]
    fn test_raw_string_with_hashes() {
        let src = r###"a r#"he said "}" ok"# b"###;
        assert_eq!(code_text(src), "a  b");
        let s = states(src);
        assert_eq!(s[2], LexState::RawStringLiteral { hashes: 1 });
    }

    #[test]
    fn test_byte_raw_string() {
        let src = r#"x br"\" y"#;
        assert_eq!(code_text(src), "x  y");
    }

    #[test]
    fn test_raw_identifier_is_code() {
        assert_eq!(code_text("r#type"), "r#type");
    }

    #[test]
    fn test_identifier_ending_in_r_is_not_raw_string() {
        // `bar"` can't open a raw string; the quote opens a normal string.
        let s = states("bar\"x\"");
        assert_eq!(s[2], LexState::Code);
        assert_eq!(s[3], LexState::StringLiteral);
    }

    #[test]
    fn test_char_literals_and_lifetimes() {
        assert_eq!(code_text("let c = '{';"), "let c = ;");
        assert_eq!(code_text(r"let c = '\'';"), "let c = ;");
        assert_eq!(code_text(r"let c = '\u{7B}';"), "let c = ;");
        assert_eq!(code_text("fn f<'a>(x: &'a str) {}"), "fn f<'a>(x: &'a str) {}");
        assert_eq!(code_text("Account<'info, Mint>"), "Account<'info, Mint>");
    }

    #[test]
    fn test_multibyte_char_literal() {
        assert_eq!(code_text("x('é')"), "x()");
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("a \"open")
            .collect::<Result<Vec<_>, _>>()
            .unwrap_err();
        assert_eq!(
            err,
            ScanError::UnterminatedLiteral {
                what: "string literal",
                offset: 2
            }
        );
    }

    #[test]
    fn test_unterminated_block_comment() {
        let err = Lexer::new("a /* /* */")
            .collect::<Result<Vec<_>, _>>()
            .unwrap_err();
        assert!(matches!(
            err,
            ScanError::UnterminatedLiteral {
                what: "block comment",
                offset: 2
            }
        ));
    }

    #[test]
    fn test_unterminated_escaped_char() {
        let err = Lexer::new(r"x = '\")
            .collect::<Result<Vec<_>, _>>()
            .unwrap_err();
        assert!(matches!(err, ScanError::UnterminatedLiteral { offset: 4, .. }));
    }

    #[test]
    fn test_trailing_line_comment_is_fine() {
        assert!(Lexer::new("a // end").all(|r| r.is_ok()));
    }

    #[test]
    fn test_delimiter_kind_bytes() {
        for kind in [
            DelimiterKind::Paren,
            DelimiterKind::Brace,
            DelimiterKind::Bracket,
            DelimiterKind::Angle,
        ] {
            assert_eq!(DelimiterKind::from_open(kind.open_byte()), Some(kind));
            assert_eq!(DelimiterKind::from_close(kind.close_byte()), Some(kind));
        }
    }
}
