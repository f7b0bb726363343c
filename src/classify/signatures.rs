//! Category signature table.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::{KeywordOverride, OverrideMode};

/// Protocol category. Variant order is tie-break precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Oracle,
    Pool,
    Lending,
    Vault,
    Governance,
    Unclassified,
}

impl Category {
    /// Categories that carry keywords, in precedence order.
    pub const RANKED: [Category; 5] = [
        Category::Oracle,
        Category::Pool,
        Category::Lending,
        Category::Vault,
        Category::Governance,
    ];

    /// All categories in output order.
    pub const ALL: [Category; 6] = [
        Category::Oracle,
        Category::Pool,
        Category::Lending,
        Category::Vault,
        Category::Governance,
        Category::Unclassified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Oracle => "oracle",
            Category::Pool => "pool",
            Category::Lending => "lending",
            Category::Vault => "vault",
            Category::Governance => "governance",
            Category::Unclassified => "unclassified",
        }
    }

    /// Marker used in the text artifact.
    pub fn header(&self) -> &'static str {
        match self {
            Category::Oracle => "ORACLE",
            Category::Pool => "POOL",
            Category::Lending => "LENDING",
            Category::Vault => "VAULT",
            Category::Governance => "GOVERNANCE",
            Category::Unclassified => "UNCLASSIFIED",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Built-in keywords per category.
const DEFAULT_KEYWORDS: [(Category, &[&str]); 5] = [
    (
        Category::Oracle,
        &["oracle", "price", "feed", "pyth", "switchboard", "chainlink", "twap"],
    ),
    (Category::Pool, &["pool", "liquidity", "amm", "swap", "curve"]),
    (
        Category::Lending,
        &["lend", "borrow", "collateral", "liquidat", "loan", "obligation", "interest"],
    ),
    (
        Category::Vault,
        &["vault", "strategy", "farm", "reserve", "deposit", "yield", "stake"],
    ),
    (
        Category::Governance,
        &["governance", "proposal", "vote", "dao", "multisig", "timelock", "admin"],
    ),
];

static DEFAULT_TABLE: Lazy<SignatureTable> = Lazy::new(|| SignatureTable {
    entries: DEFAULT_KEYWORDS
        .iter()
        .map(|(category, keywords)| (*category, normalize(keywords.iter().copied())))
        .collect(),
});

/// Ordered category → keyword mapping. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureTable {
    entries: Vec<(Category, Vec<String>)>,
}

impl SignatureTable {
    /// The built-in table, shared by every run.
    pub fn builtin() -> &'static SignatureTable {
        &DEFAULT_TABLE
    }

    /// The built-in table with per-category overrides applied.
    pub fn with_overrides(overrides: &BTreeMap<Category, KeywordOverride>) -> SignatureTable {
        let mut table = DEFAULT_TABLE.clone();
        for (category, keywords) in table.entries.iter_mut() {
            let over = match overrides.get(category) {
                Some(over) => over,
                None => continue,
            };
            let added = over.keywords.iter().map(String::as_str);
            *keywords = match over.mode {
                OverrideMode::Replace => normalize(added),
                OverrideMode::Extend => normalize(keywords.iter().map(String::as_str).chain(added)),
            };
        }
        table
    }

    /// Entries in precedence order.
    pub fn entries(&self) -> impl Iterator<Item = (Category, &[String])> {
        self.entries.iter().map(|(c, k)| (*c, k.as_slice()))
    }

    pub fn keywords(&self, category: Category) -> &[String] {
        self.entries
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, k)| k.as_slice())
            .unwrap_or(&[])
    }
}

impl Default for SignatureTable {
    fn default() -> Self {
        DEFAULT_TABLE.clone()
    }
}

/// Lowercase, trim and dedupe, keeping first-seen order.
fn normalize<'a>(keywords: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for keyword in keywords {
        let keyword = keyword.trim().to_lowercase();
        if !keyword.is_empty() && !out.contains(&keyword) {
            out.push(keyword);
        }
    }
    out
}
