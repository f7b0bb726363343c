//! Records produced by structural extraction.
//!
//! All of these are built during one pass over a [`SourceUnit`] and never
//! mutated afterwards.
//!
//! [`SourceUnit`]: crate::scan::SourceUnit

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::scan::DelimiterSpan;

/// Kind of located declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationKind {
    Struct,
    Enum,
}

impl DeclarationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclarationKind::Struct => "struct",
            DeclarationKind::Enum => "enum",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "struct" => Some(DeclarationKind::Struct),
            "enum" => Some(DeclarationKind::Enum),
            _ => None,
        }
    }
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Body of a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "lowercase")]
pub enum Body {
    /// `{ ... }` - named fields or enum variants.
    Braced { span: DelimiterSpan },
    /// `( ... );` - tuple struct.
    Tuple { span: DelimiterSpan },
    /// `;` - unit struct.
    Unit,
}

/// Raw attribute texts attached to a declaration or field, earliest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeBlock {
    pub attributes: Vec<String>,
}

impl AttributeBlock {
    pub fn new(attributes: Vec<String>) -> Self {
        Self { attributes }
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(String::as_str)
    }

    /// Whether an `#[account]` or `#[account(...)]` attribute is present.
    pub fn has_account(&self) -> bool {
        self.iter().any(|a| attribute_path(a) == Some("account"))
    }
}

/// Path of an attribute (`account` for `#[account(mut)]`), if it parses.
pub fn attribute_path(attr: &str) -> Option<&str> {
    let inner = attr.trim().strip_prefix('#')?.trim_start().strip_prefix('[')?;
    let inner = inner.trim_start();
    let end = inner
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == ':'))
        .unwrap_or(inner.len());
    let path = &inner[..end];
    (!path.is_empty()).then_some(path)
}

/// Attribute a constraint was declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintSource {
    Account,
    Instruction,
}

/// A single validation expression from an attribute argument list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    /// Token before the top-level `=`, or the whole segment when bare.
    pub kind: String,
    /// Expression after the `=`, or the whole segment when bare.
    pub raw: String,
    pub source: ConstraintSource,
}

impl Constraint {
    /// The constraint as written, e.g. `has_one = authority` or `mut`.
    pub fn expression(&self) -> String {
        if self.kind == self.raw {
            self.raw.clone()
        } else {
            format!("{} = {}", self.kind, self.raw)
        }
    }
}

/// One field of a struct body, or one variant of an enum body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub ordinal: usize,
    /// Empty for positional tuple fields.
    pub name: String,
    /// Verbatim type text. For enum variants, the payload text.
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(default, skip_serializing_if = "AttributeBlock::is_empty")]
    pub attributes: AttributeBlock,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,
}

/// A located struct or enum definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDeclaration {
    pub kind: DeclarationKind,
    pub name: String,
    /// Verbatim generic list including the angle brackets, or empty.
    pub generics: String,
    pub attributes: AttributeBlock,
    pub body: Body,
    pub visibility: Option<String>,
    pub file: String,
    pub line: usize,
    /// Brace depth at the declaration site (0 = file level).
    pub depth: usize,
    /// Verbatim text from the visibility modifier to the end of the body.
    pub text: String,
    /// Verbatim text from the first outer attribute to the end of the body,
    /// with any comments between attributes and item.
    pub source_text: String,
    pub fields: Vec<FieldRecord>,
    /// Constraints from struct-level `#[account(...)]`/`#[instruction(...)]`.
    pub constraints: Vec<Constraint>,
    pub derives: Vec<String>,
    pub is_account: bool,
}

impl RawDeclaration {
    /// Struct-level constraints followed by every field's constraints.
    pub fn all_constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints
            .iter()
            .chain(self.fields.iter().flat_map(|f| f.constraints.iter()))
    }

    /// Attributes and definition exactly as they appear in the source.
    pub fn verbatim(&self) -> &str {
        &self.source_text
    }
}

/// A `const NAME: Type = value;` item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantDeclaration {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub value: String,
    pub file: String,
    pub line: usize,
    /// Verbatim item text including the trailing `;`.
    pub text: String,
}

/// A `declare_id!(...)` invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramIdDeclaration {
    /// Macro name, e.g. `declare_id`.
    pub name: String,
    /// Argument text as written, quotes included.
    pub value: String,
    pub file: String,
    pub line: usize,
    /// Verbatim invocation text without the trailing `;`.
    pub text: String,
}

/// A `require!`-style assertion whose arguments name an authority or admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCheck {
    /// Macro name without the `!`.
    pub name: String,
    /// Argument text, trimmed.
    pub args: String,
    pub file: String,
    pub line: usize,
}

impl ProgramIdDeclaration {
    /// The argument with surrounding string quotes removed.
    pub fn address(&self) -> &str {
        self.value.trim_matches('"')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_path() {
        assert_eq!(attribute_path("#[account]"), Some("account"));
        assert_eq!(attribute_path("#[account(mut)]"), Some("account"));
        assert_eq!(attribute_path("# [ derive(Clone)]"), Some("derive"));
        assert_eq!(
            attribute_path("#[anchor_lang::account]"),
            Some("anchor_lang::account")
        );
        assert_eq!(attribute_path("not an attribute"), None);
    }

    #[test]
    fn test_has_account() {
        let block = AttributeBlock::new(vec![
            "#[derive(Accounts)]".to_string(),
            "#[account(zero_copy)]".to_string(),
        ]);
        assert!(block.has_account());
        let block = AttributeBlock::new(vec!["#[accounts_helper]".to_string()]);
        assert!(!block.has_account());
    }

    #[test]
    fn test_constraint_expression() {
        let bare = Constraint {
            kind: "mut".to_string(),
            raw: "mut".to_string(),
            source: ConstraintSource::Account,
        };
        assert_eq!(bare.expression(), "mut");
        let keyed = Constraint {
            kind: "has_one".to_string(),
            raw: "authority".to_string(),
            source: ConstraintSource::Account,
        };
        assert_eq!(keyed.expression(), "has_one = authority");
    }
}
