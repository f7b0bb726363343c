//! Anchor attribute analysis.
//!
//! `#[account(...)]` and `#[instruction(...)]` argument lists are split into
//! one [`Constraint`] per top-level segment. `#[derive(...)]` lists are read
//! with a regex since they never nest.

use lazy_static::lazy_static;
use regex::Regex;

use crate::scan::{DelimiterKind, Scanner};

use super::types::{attribute_path, AttributeBlock, Constraint, ConstraintSource};

lazy_static! {
    static ref DERIVE_LIST: Regex =
        Regex::new(r"^#\s*\[\s*derive\s*\(([^)]*)\)\s*\]$").unwrap();
}

/// Constraints from every `#[account(...)]`/`#[instruction(...)]` in the block.
pub fn parse_constraints(attributes: &AttributeBlock) -> Vec<Constraint> {
    attributes.iter().flat_map(parse_attribute).collect()
}

/// Identifiers listed in `#[derive(...)]` attributes, in order.
pub fn parse_derives(attributes: &AttributeBlock) -> Vec<String> {
    attributes
        .iter()
        .filter_map(|attr| DERIVE_LIST.captures(attr.trim()))
        .flat_map(|caps| {
            caps[1]
                .split(',')
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Parse one attribute. Attributes other than `account`/`instruction`, and a
/// bare `#[account]`, yield nothing.
pub fn parse_attribute(attr: &str) -> Vec<Constraint> {
    let (path, source) = match attribute_path(attr) {
        Some(path @ "account") => (path, ConstraintSource::Account),
        Some(path @ "instruction") => (path, ConstraintSource::Instruction),
        _ => return Vec::new(),
    };

    // The argument list opens right after the path.
    let open = match (attr.find('['), attr.find('(')) {
        (Some(b), Some(p)) if b < p && attr[b + 1..p].trim() == path => p,
        _ => return Vec::new(),
    };
    let scanner = Scanner::new(attr);
    let close = match scanner.find_matching_close(open, DelimiterKind::Paren) {
        Ok(close) => close,
        Err(_) => return Vec::new(),
    };

    scanner
        .split_top_level(open + 1, close, b',')
        .into_iter()
        .filter_map(|(s, e)| scanner.trim_range(s, e))
        .map(|(s, e)| {
            let segment = &attr[s..e];
            match assignment_eq(&scanner, s, e) {
                Some(eq) => Constraint {
                    kind: scanner.trimmed_text(s, eq).to_string(),
                    raw: scanner.trimmed_text(eq + 1, e).to_string(),
                    source,
                },
                None => Constraint {
                    kind: segment.to_string(),
                    raw: segment.to_string(),
                    source,
                },
            }
        })
        .collect()
}

/// First depth-zero `=` that is an assignment rather than part of `==`,
/// `!=`, `<=`, `>=` or `=>`.
fn assignment_eq(scanner: &Scanner<'_>, start: usize, end: usize) -> Option<usize> {
    let bytes = scanner.bytes();
    scanner
        .top_level_positions(start, end, b'=')
        .into_iter()
        .find(|&p| {
            let next = bytes.get(p + 1).copied();
            let prev = if p > 0 { Some(bytes[p - 1]) } else { None };
            !matches!(next, Some(b'=') | Some(b'>'))
                && !matches!(prev, Some(b'=') | Some(b'!') | Some(b'<') | Some(b'>'))
        })
}
