//! Constants and program-id macros.

use crate::scan::{
    ident_end, is_ident_byte, is_ident_start, DelimiterKind, ScanError, Scanner, SourceUnit,
};

use super::locator::item_head;
use super::types::{AccessCheck, ConstantDeclaration, ProgramIdDeclaration};

/// Macros whose single argument is a program address.
const PROGRAM_ID_MACROS: &[&str] = &["declare_id"];

/// Assertion macros that can guard a privileged instruction.
const ACCESS_MACROS: &[&str] = &["require", "require_eq", "require_keys_eq"];

/// Argument words that make an assertion an access check.
const ACCESS_SUBJECTS: &[&str] = &["authority", "admin"];

/// Words that turn `const` into something other than a constant item.
const CONST_QUALIFIED: &[&str] = &["fn", "unsafe", "async", "extern"];

/// Constants and program ids of one file, with the byte offset each starts at.
#[derive(Debug, Default)]
pub struct ItemScan {
    pub constants: Vec<(usize, ConstantDeclaration)>,
    pub program_ids: Vec<(usize, ProgramIdDeclaration)>,
    pub access_checks: Vec<(usize, AccessCheck)>,
    pub error: Option<ScanError>,
}

enum Hit {
    Constant {
        start: usize,
        last: usize,
        record: ConstantDeclaration,
    },
    ProgramId {
        start: usize,
        last: usize,
        record: ProgramIdDeclaration,
    },
    Access {
        start: usize,
        last: usize,
        record: AccessCheck,
    },
}

/// Locate `const` items, `declare_id!(...)` invocations and access checks.
pub fn locate_items(scanner: &Scanner<'_>, unit: &SourceUnit) -> ItemScan {
    let bytes = scanner.bytes();
    let src = scanner.source();
    let mut scan = ItemScan::default();
    let mut i = 0;

    while i < scanner.classified_len() {
        let word_start =
            scanner.is_code(i) && is_ident_start(bytes[i]) && (i == 0 || !is_ident_byte(bytes[i - 1]));
        if !word_start {
            i += 1;
            continue;
        }
        let end = ident_end(bytes, i);
        let word = &src[i..end];

        let hit = if word == "const" {
            parse_constant(scanner, unit, i, end)
        } else if PROGRAM_ID_MACROS.contains(&word) {
            parse_program_id(scanner, unit, word, i, end)
        } else if ACCESS_MACROS.contains(&word) {
            parse_access_check(scanner, unit, word, i, end)
        } else {
            Ok(None)
        };

        match hit {
            Ok(Some(Hit::Constant { start, last, record })) => {
                scan.constants.push((start, record));
                i = last + 1;
            }
            Ok(Some(Hit::ProgramId { start, last, record })) => {
                scan.program_ids.push((start, record));
                i = last + 1;
            }
            Ok(Some(Hit::Access { start, last, record })) => {
                scan.access_checks.push((start, record));
                i = last + 1;
            }
            Ok(None) => i = end,
            Err(e) => {
                scan.error = Some(e);
                break;
            }
        }
    }

    scan
}

/// Parse `[pub] const NAME: Type = value;` with the keyword at `kw`.
fn parse_constant(
    scanner: &Scanner<'_>,
    unit: &SourceUnit,
    kw: usize,
    kw_end: usize,
) -> Result<Option<Hit>, ScanError> {
    let bytes = scanner.bytes();
    let src = scanner.source();

    let head = match item_head(scanner, kw) {
        Some(head) => head,
        None => return Ok(None),
    };
    let name_start = match scanner.next_code_byte(kw_end) {
        Some(n) if is_ident_start(bytes[n]) => n,
        _ => return Ok(None),
    };
    let name_end = ident_end(bytes, name_start);
    let name = &src[name_start..name_end];
    if name == "_" || CONST_QUALIFIED.contains(&name) {
        return Ok(None);
    }

    let colon = match scanner.next_code_byte(name_end) {
        Some(c) if bytes[c] == b':' => c,
        _ => return Ok(None),
    };
    let eq = scanner.find_top_level(colon + 1, b"=;")?;
    if bytes[eq] == b';' {
        // Associated const declared without a value.
        return Ok(None);
    }
    let semi = scanner.find_top_level(eq + 1, b";")?;

    Ok(Some(Hit::Constant {
        start: head.start,
        last: semi,
        record: ConstantDeclaration {
            name: name.to_string(),
            ty: scanner.trimmed_text(colon + 1, eq).to_string(),
            value: scanner.trimmed_text(eq + 1, semi).to_string(),
            file: unit.path().to_string(),
            line: unit.line_of(head.start),
            text: src[head.start..=semi].to_string(),
        },
    }))
}

/// Offsets of the parens of a `name!(...)` call whose name ends at `name_end`.
fn macro_parens(scanner: &Scanner<'_>, name_end: usize) -> Result<Option<(usize, usize)>, ScanError> {
    let bytes = scanner.bytes();
    let bang = match scanner.next_code_byte(name_end) {
        Some(b) if bytes[b] == b'!' => b,
        _ => return Ok(None),
    };
    let open = match scanner.next_code_byte(bang + 1) {
        Some(o) if bytes[o] == b'(' => o,
        _ => return Ok(None),
    };
    let close = scanner.find_matching_close(open, DelimiterKind::Paren)?;
    Ok(Some((open, close)))
}

/// Parse `declare_id!(...)` with the macro name at `start..name_end`.
fn parse_program_id(
    scanner: &Scanner<'_>,
    unit: &SourceUnit,
    name: &str,
    start: usize,
    name_end: usize,
) -> Result<Option<Hit>, ScanError> {
    let (open, close) = match macro_parens(scanner, name_end)? {
        Some(parens) => parens,
        None => return Ok(None),
    };

    Ok(Some(Hit::ProgramId {
        start,
        last: close,
        record: ProgramIdDeclaration {
            name: name.to_string(),
            value: scanner.trimmed_text(open + 1, close).to_string(),
            file: unit.path().to_string(),
            line: unit.line_of(start),
            text: scanner.source()[start..=close].to_string(),
        },
    }))
}

/// Parse `require!(...)` and friends; only calls naming an authority count.
fn parse_access_check(
    scanner: &Scanner<'_>,
    unit: &SourceUnit,
    name: &str,
    start: usize,
    name_end: usize,
) -> Result<Option<Hit>, ScanError> {
    let (open, close) = match macro_parens(scanner, name_end)? {
        Some(parens) => parens,
        None => return Ok(None),
    };
    let args = scanner.trimmed_text(open + 1, close);
    let lowered = args.to_lowercase();
    if !ACCESS_SUBJECTS.iter().any(|s| lowered.contains(s)) {
        return Ok(None);
    }

    Ok(Some(Hit::Access {
        start,
        last: close,
        record: AccessCheck {
            name: name.to_string(),
            args: args.to_string(),
            file: unit.path().to_string(),
            line: unit.line_of(start),
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(src: &str) -> ItemScan {
        let unit = SourceUnit::new("programs/p/src/lib.rs", src);
        let scanner = Scanner::new(unit.text());
        locate_items(&scanner, &unit)
    }

    #[test]
    fn test_constants() {
        let s = scan(
            "pub const MAX_FEE_BPS: u16 = 1_000;\nconst SEED: &[u8] = b\"vault;\";\npub(crate) const PAIR: (u8, u8) = (1, 2);\n",
        );
        assert!(s.error.is_none());
        let got: Vec<(&str, &str, &str)> = s
            .constants
            .iter()
            .map(|(_, c)| (c.name.as_str(), c.ty.as_str(), c.value.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                ("MAX_FEE_BPS", "u16", "1_000"),
                ("SEED", "&[u8]", "b\"vault;\""),
                ("PAIR", "(u8, u8)", "(1, 2)"),
            ]
        );
        assert_eq!(s.constants[2].1.line, 3);
        assert_eq!(s.constants[2].1.text, "pub(crate) const PAIR: (u8, u8) = (1, 2);");
    }

    #[test]
    fn test_const_fn_and_pointers_skipped() {
        let s = scan("pub const fn f() -> u8 { 1 }\nfn g(p: *const u8) {}\nconst _: () = ();\n");
        assert!(s.constants.is_empty());
    }

    #[test]
    fn test_associated_const_without_value_skipped() {
        let s = scan("trait T { const N: usize; }\nimpl T for S { const N: usize = 4; }");
        assert_eq!(s.constants.len(), 1);
        assert_eq!(s.constants[0].1.value, "4");
    }

    #[test]
    fn test_declare_id() {
        let s = scan("use anchor_lang::prelude::*;\n\ndeclare_id!(\"Fg6PaFpoGXkYsidMpWTK6W2BeZ7FEfcYkg476zPFsLnS\");\n");
        assert_eq!(s.program_ids.len(), 1);
        let id = &s.program_ids[0].1;
        assert_eq!(id.name, "declare_id");
        assert_eq!(id.address(), "Fg6PaFpoGXkYsidMpWTK6W2BeZ7FEfcYkg476zPFsLnS");
        assert_eq!(id.line, 3);
        assert_eq!(id.text, "declare_id!(\"Fg6PaFpoGXkYsidMpWTK6W2BeZ7FEfcYkg476zPFsLnS\")");
    }

    #[test]
    fn test_declare_id_in_comment_ignored() {
        let s = scan("// declare_id!(\"old\");\n/* declare_id!(\"older\"); */");
        assert!(s.program_ids.is_empty());
    }

    #[test]
    fn test_access_checks_need_an_authority() {
        let s = scan(
            "pub fn handler(ctx: Context<Admin>) -> Result<()> {\n    require!(ctx.accounts.amount > 0, E::Zero);\n    require_keys_eq!(\n        ctx.accounts.global.authority,\n        ctx.accounts.admin.key()\n    );\n    // require!(admin_ok);\n    Ok(())\n}\n",
        );
        assert!(s.error.is_none());
        assert_eq!(s.access_checks.len(), 1);
        let check = &s.access_checks[0].1;
        assert_eq!(check.name, "require_keys_eq");
        assert_eq!(check.line, 3);
        assert!(check.args.starts_with("ctx.accounts.global.authority,"));
    }

    #[test]
    fn test_unbalanced_constant_value() {
        let s = scan("const A: u8 = 1;\nconst B: [u8; 2] = [1, 2;\n");
        assert_eq!(s.constants.len(), 1);
        assert!(s.error.is_some());
    }
}
