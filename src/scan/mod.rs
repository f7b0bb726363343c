//! Lexical scanning of Rust source text.
//!
//! Everything downstream (declaration locating, field splitting, constraint
//! parsing) asks this module one question over and over: "is this byte code,
//! and if it opens a delimiter, where does it close?". The answer comes from a
//! single up-front classification pass, so every later query is a lookup.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌────────────────────────┐
//! │ SourceUnit   │────▶│ Lexer        │────▶│ Scanner                │
//! │ (text, lines)│     │ (per-byte    │     │ (states + delimiter    │
//! └──────────────┘     │  LexState)   │     │  matching primitives)  │
//!                      └──────────────┘     └────────────────────────┘
//! ```

mod lexer;
mod source;

pub use lexer::{DelimiterKind, DelimiterSpan, LexState, Lexer};
pub use source::SourceUnit;

use thiserror::Error;

/// Errors raised while scanning a single source unit.
///
/// Both variants are recoverable at the run level: they abort extraction of
/// the file they occur in, never the whole run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("unbalanced {kind} delimiter opened at byte {offset}")]
    UnbalancedDelimiter { kind: DelimiterKind, offset: usize },
    #[error("unterminated {what} starting at byte {offset}")]
    UnterminatedLiteral { what: &'static str, offset: usize },
}

impl ScanError {
    /// Byte offset the error points at.
    pub fn offset(&self) -> usize {
        match self {
            ScanError::UnbalancedDelimiter { offset, .. } => *offset,
            ScanError::UnterminatedLiteral { offset, .. } => *offset,
        }
    }
}

/// Returns true for bytes that may continue an identifier.
pub fn is_ident_byte(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphanumeric()
}

/// Returns true for bytes that may start an identifier.
pub fn is_ident_start(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphabetic()
}

/// End offset (exclusive) of the identifier starting at `start`.
pub fn ident_end(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < bytes.len() && is_ident_byte(bytes[end]) {
        end += 1;
    }
    end
}

/// Classified view of one source text.
///
/// Holds the lexical state of every byte up to the first unterminated literal
/// (if any). Queries that need to look past that point fail with the
/// retained [`ScanError::UnterminatedLiteral`].
pub struct Scanner<'a> {
    src: &'a str,
    states: Vec<LexState>,
    failure: Option<ScanError>,
}

impl<'a> Scanner<'a> {
    /// Classify `src` in one pass.
    pub fn new(src: &'a str) -> Self {
        let mut states = Vec::with_capacity(src.len());
        let mut failure = None;

        for item in Lexer::new(src) {
            match item {
                Ok((_, state)) => states.push(state),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        // Bytes from the unterminated opener onward are not trustworthy.
        if let Some(err) = &failure {
            states.truncate(err.offset());
        }

        Self {
            src,
            states,
            failure,
        }
    }

    pub fn source(&self) -> &'a str {
        self.src
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.src.as_bytes()
    }

    /// Number of leading bytes that were classified.
    pub fn classified_len(&self) -> usize {
        self.states.len()
    }

    /// The unterminated literal that stopped classification, if any.
    pub fn failure(&self) -> Option<&ScanError> {
        self.failure.as_ref()
    }

    pub fn is_code(&self, i: usize) -> bool {
        matches!(self.states.get(i), Some(LexState::Code))
    }

    /// Comment bytes and whitespace code bytes carry no structure.
    fn is_trivia(&self, i: usize) -> bool {
        match self.states.get(i) {
            Some(LexState::Code) => self.bytes()[i].is_ascii_whitespace(),
            Some(state) => state.is_comment(),
            None => false,
        }
    }

    /// Error to report when a forward scan runs off the classified region.
    pub fn exhausted(&self, kind: DelimiterKind, offset: usize) -> ScanError {
        match &self.failure {
            Some(err) => err.clone(),
            None => ScanError::UnbalancedDelimiter { kind, offset },
        }
    }

    /// First non-trivia byte at or after `from`.
    pub fn next_code_byte(&self, from: usize) -> Option<usize> {
        (from..self.states.len()).find(|&i| !self.is_trivia(i))
    }

    /// Last non-trivia byte strictly before `before`.
    pub fn prev_code_byte(&self, before: usize) -> Option<usize> {
        let upper = before.min(self.states.len());
        (0..upper).rev().find(|&i| !self.is_trivia(i))
    }

    /// Trim trivia from both ends of `start..end`.
    ///
    /// Returns the narrowed byte range, or `None` when nothing but whitespace
    /// and comments remain.
    pub fn trim_range(&self, start: usize, end: usize) -> Option<(usize, usize)> {
        let end = end.min(self.states.len());
        let first = (start..end).find(|&i| !self.is_trivia(i))?;
        let last = (first..end).rev().find(|&i| !self.is_trivia(i))?;
        Some((first, last + 1))
    }

    /// Verbatim text of `start..end` with surrounding trivia removed.
    pub fn trimmed_text(&self, start: usize, end: usize) -> &'a str {
        match self.trim_range(start, end) {
            Some((s, e)) => &self.src[s..e],
            None => "",
        }
    }

    /// Offset of the delimiter closing the one opened at `open`.
    ///
    /// Only code bytes move the depth counter; delimiters inside strings,
    /// chars and comments are invisible.
    pub fn find_matching_close(&self, open: usize, kind: DelimiterKind) -> Result<usize, ScanError> {
        if kind == DelimiterKind::Angle {
            return self.find_matching_angle(open);
        }

        let bytes = self.bytes();
        if !self.is_code(open) || bytes[open] != kind.open_byte() {
            return Err(ScanError::UnbalancedDelimiter { kind, offset: open });
        }

        let mut depth = 1usize;
        for i in open + 1..self.states.len() {
            if !self.is_code(i) {
                continue;
            }
            let b = bytes[i];
            if b == kind.open_byte() {
                depth += 1;
            } else if b == kind.close_byte() {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
        }

        Err(self.exhausted(kind, open))
    }

    /// Backward mirror of [`Scanner::find_matching_close`].
    pub fn find_matching_open(&self, close: usize, kind: DelimiterKind) -> Result<usize, ScanError> {
        let bytes = self.bytes();
        if !self.is_code(close) || bytes[close] != kind.close_byte() {
            return Err(ScanError::UnbalancedDelimiter {
                kind,
                offset: close,
            });
        }

        let mut depth = 1usize;
        for i in (0..close).rev() {
            if !self.is_code(i) {
                continue;
            }
            let b = bytes[i];
            if b == kind.close_byte() {
                depth += 1;
            } else if b == kind.open_byte() {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
        }

        Err(ScanError::UnbalancedDelimiter {
            kind,
            offset: close,
        })
    }

    /// Match a generic parameter list opened at `open`.
    ///
    /// `>>` closes two depths one byte at a time, so the first `>` that brings
    /// the depth to zero is returned and the second one is never revisited.
    pub fn find_matching_angle(&self, open: usize) -> Result<usize, ScanError> {
        let bytes = self.bytes();
        let unbalanced = ScanError::UnbalancedDelimiter {
            kind: DelimiterKind::Angle,
            offset: open,
        };
        if !self.is_code(open) || bytes[open] != b'<' {
            return Err(unbalanced);
        }

        let mut depth = 1usize;
        let mut nest = 0usize;
        for i in open + 1..self.states.len() {
            if !self.is_code(i) {
                continue;
            }
            match bytes[i] {
                b'(' | b'[' | b'{' => nest += 1,
                b')' | b']' | b'}' => {
                    if nest == 0 {
                        return Err(unbalanced);
                    }
                    nest -= 1;
                }
                b';' if nest == 0 => return Err(unbalanced),
                b'<' if self.angle_opens(i) => depth += 1,
                b'>' if self.angle_closes(i) => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(i);
                    }
                }
                _ => {}
            }
        }

        Err(self.exhausted(DelimiterKind::Angle, open))
    }

    /// Whether the `<` at `i` opens a generic list rather than comparing.
    ///
    /// Generic openers hug the preceding token (`Vec<`, `::<`, `<<`), while
    /// comparisons are written with surrounding spaces. A number never takes
    /// generics, so `1<<2` stays a shift.
    pub fn angle_opens(&self, i: usize) -> bool {
        if i == 0 {
            return false;
        }
        let bytes = self.bytes();
        let prev = bytes[i - 1];
        if is_ident_byte(prev) {
            let mut start = i - 1;
            while start > 0 && is_ident_byte(bytes[start - 1]) {
                start -= 1;
            }
            return is_ident_start(bytes[start]);
        }
        match prev {
            b'<' => self.is_code(i - 1) && self.angle_opens(i - 1),
            b':' | b'(' | b'[' => true,
            _ => matches!(self.prev_code_byte(i).map(|p| bytes[p]), Some(b',')),
        }
    }

    /// Whether the `>` at `i` can close a generic list (`->` and `=>` cannot).
    pub fn angle_closes(&self, i: usize) -> bool {
        i == 0 || !matches!(self.bytes()[i - 1], b'-' | b'=')
    }

    /// Split `start..end` at top-level occurrences of `sep`.
    ///
    /// Depth counts parens, brackets, braces and generic angles. Angle depth
    /// is saved when entering a nested group and restored when leaving it, so
    /// a stray comparison inside `(...)` cannot swallow later separators.
    /// Segments holding only whitespace and comments are dropped.
    pub fn split_top_level(&self, start: usize, end: usize, sep: u8) -> Vec<(usize, usize)> {
        let mut segments = Vec::new();
        let mut seg_start = start;
        for pos in self.top_level_positions(start, end, sep) {
            segments.push((seg_start, pos));
            seg_start = pos + 1;
        }
        segments.push((seg_start, end));

        segments
            .into_iter()
            .filter(|&(s, e)| self.trim_range(s, e).is_some())
            .collect()
    }

    /// Offsets in `start..end` of code bytes equal to `needle` at depth zero.
    pub fn top_level_positions(&self, start: usize, end: usize, needle: u8) -> Vec<usize> {
        let bytes = self.bytes();
        let end = end.min(self.states.len());
        let mut found = Vec::new();
        let mut nest = 0usize;
        let mut angle = 0usize;
        let mut saved: Vec<usize> = Vec::new();

        for i in start..end {
            if !self.is_code(i) {
                continue;
            }
            let b = bytes[i];
            if b == needle && nest == 0 && angle == 0 {
                found.push(i);
                continue;
            }
            match b {
                b'(' | b'[' | b'{' => {
                    saved.push(angle);
                    angle = 0;
                    nest += 1;
                }
                b')' | b']' | b'}' => {
                    nest = nest.saturating_sub(1);
                    angle = saved.pop().unwrap_or(0);
                }
                b'<' if self.angle_opens(i) => angle += 1,
                b'>' if angle > 0 && self.angle_closes(i) => angle -= 1,
                _ => {}
            }
        }

        found
    }

    /// Scan forward from `from` to the first top-level byte in `targets`.
    ///
    /// Used for items whose extent is not a single delimiter pair, such as
    /// `const NAME: T = value;` and `where` clauses.
    pub fn find_top_level(&self, from: usize, targets: &[u8]) -> Result<usize, ScanError> {
        let bytes = self.bytes();
        let mut nest = 0usize;
        for i in from..self.states.len() {
            if !self.is_code(i) {
                continue;
            }
            let b = bytes[i];
            if nest == 0 && targets.contains(&b) {
                return Ok(i);
            }
            match b {
                b'(' | b'[' | b'{' => nest += 1,
                b')' | b']' | b'}' => {
                    if nest == 0 {
                        return Err(ScanError::UnbalancedDelimiter {
                            kind: DelimiterKind::from_close(b).unwrap_or(DelimiterKind::Brace),
                            offset: i,
                        });
                    }
                    nest -= 1;
                }
                _ => {}
            }
        }
        Err(self.exhausted(DelimiterKind::Brace, from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_matching_close_ignores_string_braces() {
        let src = r#"struct A { s: &'static str = "{ not a brace }", n: u8 }"#;
        let scanner = Scanner::new(src);
        let open = src.find('{').unwrap();
        let close = scanner.find_matching_close(open, DelimiterKind::Brace).unwrap();
        assert_eq!(close, src.len() - 1);
    }

    #[test]
    fn test_find_matching_close_ignores_comment_braces() {
        let src = "fn f() { /* } */ // }\n let x = '}'; }";
        let scanner = Scanner::new(src);
        let open = src.find('{').unwrap();
        let close = scanner.find_matching_close(open, DelimiterKind::Brace).unwrap();
        assert_eq!(close, src.len() - 1);
    }

    #[test]
    fn test_nested_generics_close_once() {
        let src = "Vec<Vec<T>> tail";
        let scanner = Scanner::new(src);
        let close = scanner.find_matching_angle(3).unwrap();
        assert_eq!(close, 10);
        assert_eq!(&src[3..=close], "<Vec<T>>");
        // The inner list closes on the first '>' of the pair.
        assert_eq!(scanner.find_matching_angle(7).unwrap(), 9);
    }

    #[test]
    fn test_angle_skips_arrows() {
        let src = "Box<dyn Fn(u8) -> Vec<u8>>";
        let scanner = Scanner::new(src);
        let close = scanner.find_matching_angle(3).unwrap();
        assert_eq!(close, src.len() - 1);
    }

    #[test]
    fn test_unbalanced_reports_opener() {
        let src = "struct A { a: u8,";
        let scanner = Scanner::new(src);
        let open = src.find('{').unwrap();
        let err = scanner
            .find_matching_close(open, DelimiterKind::Brace)
            .unwrap_err();
        assert_eq!(
            err,
            ScanError::UnbalancedDelimiter {
                kind: DelimiterKind::Brace,
                offset: open
            }
        );
    }

    #[test]
    fn test_unterminated_literal_wins_over_unbalanced() {
        let src = "struct A { s: &str = r#\"open }";
        let scanner = Scanner::new(src);
        assert!(scanner.failure().is_some());
        let open = src.find('{').unwrap();
        let err = scanner
            .find_matching_close(open, DelimiterKind::Brace)
            .unwrap_err();
        assert!(matches!(err, ScanError::UnterminatedLiteral { .. }));
        assert_eq!(err.offset(), src.find("r#").unwrap());
    }

    #[test]
    fn test_find_matching_open() {
        let src = "#[account(mut, has_one = a)]";
        let scanner = Scanner::new(src);
        let close = src.len() - 1;
        assert_eq!(
            scanner.find_matching_open(close, DelimiterKind::Bracket).unwrap(),
            1
        );
    }

    #[test]
    fn test_split_top_level_respects_generics() {
        let src = "a: HashMap<K, V>, b: (u8, u16), c: Option<Vec<(A, B)>>,";
        let scanner = Scanner::new(src);
        let parts: Vec<&str> = scanner
            .split_top_level(0, src.len(), b',')
            .into_iter()
            .map(|(s, e)| src[s..e].trim())
            .collect();
        assert_eq!(
            parts,
            vec!["a: HashMap<K, V>", "b: (u8, u16)", "c: Option<Vec<(A, B)>>"]
        );
    }

    #[test]
    fn test_split_top_level_comparison_in_group_does_not_leak() {
        let src = "constraint = (a<b), mut";
        let scanner = Scanner::new(src);
        let parts = scanner.split_top_level(0, src.len(), b',');
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn test_shift_operators_do_not_open_generics() {
        let src = "A = 1 << 0, B = 1<<2, C = 0x1F<<3, D";
        let scanner = Scanner::new(src);
        assert_eq!(scanner.split_top_level(0, src.len(), b',').len(), 4);
        for (i, b) in src.bytes().enumerate() {
            if b == b'<' {
                assert!(!scanner.angle_opens(i), "'<' at {} opened a generic list", i);
            }
        }

        let src = "Vec<<T as Trait>::Out>";
        let scanner = Scanner::new(src);
        assert!(scanner.angle_opens(4));
        assert_eq!(scanner.find_matching_angle(3).unwrap(), src.len() - 1);
    }

    #[test]
    fn test_trimmed_text_drops_comments() {
        let src = "  /* lead */ u64 // trailing\n";
        let scanner = Scanner::new(src);
        assert_eq!(scanner.trimmed_text(0, src.len()), "u64");
    }

    #[test]
    fn test_prev_and_next_code_byte_skip_comments() {
        let src = "a /* x */ // y\n b";
        let scanner = Scanner::new(src);
        assert_eq!(scanner.next_code_byte(1), Some(src.len() - 1));
        assert_eq!(scanner.prev_code_byte(src.len() - 1), Some(0));
    }
}
