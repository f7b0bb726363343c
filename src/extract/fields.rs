//! Field extraction from declaration bodies.

use crate::scan::{ident_end, is_ident_byte, is_ident_start, DelimiterKind, Scanner};

use super::constraints::parse_constraints;
use super::types::{AttributeBlock, Body, DeclarationKind, FieldRecord};

/// Split a declaration body into fields (structs) or variants (enums).
///
/// Segments are separated by depth-zero commas; empty segments left by a
/// trailing comma are dropped. Unit structs have no fields.
pub fn extract_fields(scanner: &Scanner<'_>, kind: DeclarationKind, body: &Body) -> Vec<FieldRecord> {
    let (span, shape) = match (body, kind) {
        (Body::Unit, _) => return Vec::new(),
        (Body::Tuple { span }, _) => (span, Shape::Positional),
        (Body::Braced { span }, DeclarationKind::Struct) => (span, Shape::Named),
        (Body::Braced { span }, DeclarationKind::Enum) => (span, Shape::Variant),
    };

    let (start, end) = span.interior();
    scanner
        .split_top_level(start, end, b',')
        .into_iter()
        .enumerate()
        .map(|(ordinal, (s, e))| parse_segment(scanner, shape, ordinal, s, e))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Named,
    Positional,
    Variant,
}

fn parse_segment(scanner: &Scanner<'_>, shape: Shape, ordinal: usize, start: usize, end: usize) -> FieldRecord {
    let bytes = scanner.bytes();
    let (attributes, cursor) = peel_attributes(scanner, start, end);
    let (visibility, cursor) = peel_visibility(scanner, cursor, end);

    let (name, ty) = match shape {
        Shape::Positional => (String::new(), scanner.trimmed_text(cursor, end)),
        Shape::Named => match field_colon(scanner, cursor, end) {
            Some(colon) => (
                scanner.trimmed_text(cursor, colon).to_string(),
                scanner.trimmed_text(colon + 1, end),
            ),
            None => (scanner.trimmed_text(cursor, end).to_string(), ""),
        },
        Shape::Variant => match scanner.next_code_byte(cursor).filter(|&p| p < end) {
            Some(p) if is_ident_start(bytes[p]) => {
                let name_end = ident_end(bytes, p);
                (
                    scanner.source()[p..name_end].to_string(),
                    scanner.trimmed_text(name_end, end),
                )
            }
            _ => (scanner.trimmed_text(cursor, end).to_string(), ""),
        },
    };

    FieldRecord {
        ordinal,
        name,
        ty: ty.to_string(),
        visibility,
        constraints: parse_constraints(&attributes),
        attributes,
    }
}

/// Peel `#[...]` attributes off the front of a segment.
fn peel_attributes(scanner: &Scanner<'_>, start: usize, end: usize) -> (AttributeBlock, usize) {
    let bytes = scanner.bytes();
    let mut attrs = Vec::new();
    let mut cursor = start;

    while let Some(hash) = scanner.next_code_byte(cursor).filter(|&p| p < end) {
        if bytes[hash] != b'#' {
            break;
        }
        let open = match scanner.next_code_byte(hash + 1) {
            Some(o) if o < end && bytes[o] == b'[' => o,
            _ => break,
        };
        match scanner.find_matching_close(open, DelimiterKind::Bracket) {
            Ok(close) if close < end => {
                attrs.push(scanner.source()[hash..=close].to_string());
                cursor = close + 1;
            }
            _ => break,
        }
    }

    (AttributeBlock::new(attrs), cursor)
}

/// Strip a leading `pub` / `pub(...)`.
fn peel_visibility(scanner: &Scanner<'_>, start: usize, end: usize) -> (Option<String>, usize) {
    let bytes = scanner.bytes();
    let p = match scanner.next_code_byte(start).filter(|&p| p < end) {
        Some(p) => p,
        None => return (None, start),
    };
    let is_pub = bytes[p..end].starts_with(b"pub")
        && bytes.get(p + 3).map_or(true, |&b| !is_ident_byte(b));
    if !is_pub {
        return (None, start);
    }

    let after = p + 3;
    if let Some(paren) = scanner.next_code_byte(after).filter(|&q| q < end && bytes[q] == b'(') {
        if let Ok(close) = scanner.find_matching_close(paren, DelimiterKind::Paren) {
            // `pub (u8, u16)` in a tuple struct is a visibility followed by a
            // tuple type, not a restricted visibility.
            let inner = scanner.trimmed_text(paren + 1, close);
            if is_restriction(inner) {
                return (Some(scanner.source()[p..=close].to_string()), close + 1);
            }
        }
    }
    (Some("pub".to_string()), after)
}

fn is_restriction(inner: &str) -> bool {
    matches!(inner, "crate" | "self" | "super") || inner.starts_with("in ")
}

/// First depth-zero `:` that is not half of a `::` path separator.
fn field_colon(scanner: &Scanner<'_>, start: usize, end: usize) -> Option<usize> {
    let bytes = scanner.bytes();
    scanner
        .top_level_positions(start, end, b':')
        .into_iter()
        .find(|&p| bytes.get(p + 1) != Some(&b':') && (p == 0 || bytes[p - 1] != b':'))
}
