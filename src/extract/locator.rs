//! Declaration locator.
//!
//! Walks the code bytes of a file looking for `struct`/`enum` keywords at an
//! item boundary, then resolves the header (visibility, name, generics,
//! where clause) and body. Outer attributes are collected by walking
//! backward from the item head.

use crate::scan::{
    ident_end, is_ident_byte, is_ident_start, DelimiterKind, DelimiterSpan, ScanError, Scanner,
};

use super::types::{AttributeBlock, Body, DeclarationKind};

/// Where a declaration sits in its file, before fields are split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationSite {
    pub kind: DeclarationKind,
    pub name: String,
    pub generics: String,
    pub visibility: Option<String>,
    pub attributes: AttributeBlock,
    pub body: Body,
    pub depth: usize,
    /// Offset of the first outer attribute, or `head` when there is none.
    pub start: usize,
    /// Offset of the visibility modifier, or of the keyword when private.
    pub head: usize,
    /// Offset of the last byte (`}` or `;`).
    pub end: usize,
}

/// Start of an item and its visibility text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemHead<'a> {
    pub start: usize,
    pub visibility: Option<&'a str>,
}

/// Does the word ending at `last` (inclusive) read `word`?
fn word_ends_at(bytes: &[u8], last: usize, word: &str) -> bool {
    let w = word.as_bytes();
    if last + 1 < w.len() {
        return false;
    }
    let start = last + 1 - w.len();
    &bytes[start..=last] == w && (start == 0 || !is_ident_byte(bytes[start - 1]))
}

/// Resolve the head of an item whose keyword starts at `kw`.
///
/// Accepts an optional `pub` or `pub(...)` in front of the keyword and
/// requires the item to start at file start or after `;`, `{`, `}` or `]`.
/// Returns `None` when the keyword is not at an item position.
pub fn item_head<'a>(scanner: &Scanner<'a>, kw: usize) -> Option<ItemHead<'a>> {
    let bytes = scanner.bytes();
    let src = scanner.source();

    let mut start = kw;
    let mut visibility = None;

    if let Some(prev) = scanner.prev_code_byte(kw) {
        if bytes[prev] == b')' {
            if let Ok(open) = scanner.find_matching_open(prev, DelimiterKind::Paren) {
                if let Some(p) = scanner.prev_code_byte(open) {
                    if word_ends_at(bytes, p, "pub") {
                        start = p - 2;
                        visibility = Some(&src[start..=prev]);
                    }
                }
            }
        } else if word_ends_at(bytes, prev, "pub") {
            start = prev - 2;
            visibility = Some(&src[start..start + 3]);
        }
    }

    match scanner.prev_code_byte(start) {
        None => Some(ItemHead { start, visibility }),
        Some(p) if matches!(bytes[p], b';' | b'{' | b'}' | b']') => {
            Some(ItemHead { start, visibility })
        }
        Some(_) => None,
    }
}

/// Collect the outer attributes directly above `head`, earliest first,
/// together with the offset of the first one's `#` (or `head`).
///
/// Steps backward over whitespace and comments; each `]` whose matching `[`
/// follows a `#` is one attribute. Anything else, including an inner
/// attribute `#![...]`, ends the walk.
pub fn collect_attributes(scanner: &Scanner<'_>, head: usize) -> (AttributeBlock, usize) {
    let bytes = scanner.bytes();
    let src = scanner.source();
    let mut found = Vec::new();
    let mut cursor = head;

    while let Some(close) = scanner.prev_code_byte(cursor) {
        if bytes[close] != b']' {
            break;
        }
        let open = match scanner.find_matching_open(close, DelimiterKind::Bracket) {
            Ok(open) => open,
            Err(_) => break,
        };
        let hash = match scanner.prev_code_byte(open) {
            Some(h) if bytes[h] == b'#' => h,
            _ => break,
        };
        found.push(src[hash..=close].to_string());
        cursor = hash;
    }

    found.reverse();
    (AttributeBlock::new(found), cursor)
}

/// Result of one locator walk.
#[derive(Debug, Clone, Default)]
pub struct Located {
    /// Sites found, in source order.
    pub sites: Vec<DeclarationSite>,
    /// First structural error, if any.
    pub error: Option<ScanError>,
    /// Offset the walk reached. Nothing at or past it was examined.
    pub scanned_to: usize,
}

/// Locate every struct and enum declaration in the classified region.
///
/// A header that cannot be completed (unbalanced body, unterminated literal)
/// or a `}` with nothing open stops the walk; the sites found before it are
/// returned together with the error. A `{` still open at the end of an
/// otherwise clean file is reported at its own offset, but the walk did reach
/// the end, so every site found stays valid.
pub fn locate_declarations(scanner: &Scanner<'_>) -> Located {
    let bytes = scanner.bytes();
    let limit = scanner.classified_len();
    let mut sites = Vec::new();
    let mut open_braces: Vec<usize> = Vec::new();
    let mut i = 0;

    let stopped = |sites: Vec<DeclarationSite>, error: ScanError| Located {
        sites,
        scanned_to: error.offset(),
        error: Some(error),
    };

    while i < limit {
        if !scanner.is_code(i) {
            i += 1;
            continue;
        }
        let b = bytes[i];
        match b {
            b'{' => open_braces.push(i),
            b'}' => {
                if open_braces.pop().is_none() {
                    let error = ScanError::UnbalancedDelimiter {
                        kind: DelimiterKind::Brace,
                        offset: i,
                    };
                    return stopped(sites, error);
                }
            }
            _ if is_ident_start(b) && (i == 0 || !is_ident_byte(bytes[i - 1])) => {
                let end = ident_end(bytes, i);
                let kind = DeclarationKind::from_keyword(&scanner.source()[i..end]);
                if let Some(kind) = kind {
                    match parse_site(scanner, kind, i, end, open_braces.len()) {
                        Ok(Some(site)) => {
                            i = site.end + 1;
                            sites.push(site);
                            continue;
                        }
                        Ok(None) => {}
                        Err(e) => return stopped(sites, e),
                    }
                }
                i = end;
                continue;
            }
            _ => {}
        }
        i += 1;
    }

    // A truncated region leaves braces open by construction; the scanner's
    // own failure covers that case.
    let error = match (open_braces.first(), scanner.failure()) {
        (Some(&offset), None) => Some(ScanError::UnbalancedDelimiter {
            kind: DelimiterKind::Brace,
            offset,
        }),
        _ => None,
    };
    Located {
        sites,
        error,
        scanned_to: limit,
    }
}

/// Parse one declaration whose keyword spans `kw..kw_end`.
///
/// `Ok(None)` means the keyword is not a declaration we understand (wrong
/// position, macro metavariable name, missing body); those are skipped.
fn parse_site(
    scanner: &Scanner<'_>,
    kind: DeclarationKind,
    kw: usize,
    kw_end: usize,
    depth: usize,
) -> Result<Option<DeclarationSite>, ScanError> {
    let bytes = scanner.bytes();
    let src = scanner.source();

    let head = match item_head(scanner, kw) {
        Some(head) => head,
        None => return Ok(None),
    };

    let name_start = match scanner.next_code_byte(kw_end) {
        Some(n) => n,
        None => return Ok(None),
    };
    if !is_ident_start(bytes[name_start]) {
        return Ok(None);
    }
    let name_end = ident_end(bytes, name_start);
    let name = &src[name_start..name_end];

    let mut cursor = match scanner.next_code_byte(name_end) {
        Some(c) => c,
        None => return Err(scanner.exhausted(DelimiterKind::Brace, name_start)),
    };

    let mut generics = String::new();
    if bytes[cursor] == b'<' {
        let close = scanner.find_matching_angle(cursor)?;
        generics = src[cursor..=close].to_string();
        cursor = match scanner.next_code_byte(close + 1) {
            Some(c) => c,
            None => return Err(scanner.exhausted(DelimiterKind::Brace, name_start)),
        };
    }

    if word_at(bytes, cursor, "where") {
        cursor = scanner.find_top_level(cursor, b"{;")?;
    }

    let (body, end) = match (bytes[cursor], kind) {
        (b'{', _) => {
            let close = scanner.find_matching_close(cursor, DelimiterKind::Brace)?;
            (
                Body::Braced {
                    span: DelimiterSpan::new(cursor, close, DelimiterKind::Brace),
                },
                close,
            )
        }
        (b'(', DeclarationKind::Struct) => {
            let close = scanner.find_matching_close(cursor, DelimiterKind::Paren)?;
            let span = DelimiterSpan::new(cursor, close, DelimiterKind::Paren);
            // A where clause may sit between the fields and the `;`.
            let end = match scanner.find_top_level(close + 1, b";{}") {
                Ok(semi) if bytes[semi] == b';' => semi,
                _ => close,
            };
            (Body::Tuple { span }, end)
        }
        (b';', DeclarationKind::Struct) => (Body::Unit, cursor),
        _ => return Ok(None),
    };

    let (attributes, start) = collect_attributes(scanner, head.start);
    Ok(Some(DeclarationSite {
        kind,
        name: name.to_string(),
        generics,
        visibility: head.visibility.map(str::to_string),
        attributes,
        body,
        depth,
        start,
        head: head.start,
        end,
    }))
}

/// Does the whole word `word` start at `i`?
fn word_at(bytes: &[u8], i: usize, word: &str) -> bool {
    let w = word.as_bytes();
    bytes.len() >= i + w.len()
        && &bytes[i..i + w.len()] == w
        && bytes.get(i + w.len()).map_or(true, |&b| !is_ident_byte(b))
}
