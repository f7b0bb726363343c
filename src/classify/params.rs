//! DeFi parameter extraction.
//!
//! Parameters are the literal settings and control points an auditor looks
//! for first: fee rates, thresholds and caps, oracle providers and feed
//! addresses, privileged authorities and the assertions that check them.
//!
//! Numeric values come from `name: N`, `name = N` and `name <= N` forms in
//! declaration text, and from constants whose value is a plain number. The
//! name is matched against [`NUMERIC_RULES`] in order, first hit wins.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::signatures::Category;
use crate::extract::{AccessCheck, ConstantDeclaration, RawDeclaration};

/// Parameter name and the name fragments that select it, per category.
/// Specific fragments come before generic ones (`withdrawal_fee` before `fee`).
pub const NUMERIC_RULES: &[(Category, &str, &[&str])] = &[
    (Category::Oracle, "staleness", &["staleness", "stale_after", "max_age"]),
    (Category::Oracle, "confidence", &["confidence", "conf_interval"]),
    (Category::Vault, "performance_fee", &["performance_fee", "perf_fee"]),
    (Category::Vault, "management_fee", &["management_fee", "mgmt_fee"]),
    (Category::Vault, "withdrawal_fee", &["withdrawal_fee", "exit_fee"]),
    (Category::Vault, "max_deposit", &["max_deposit", "deposit_cap"]),
    (Category::Vault, "min_deposit", &["min_deposit", "min_amount"]),
    (Category::Pool, "min_liquidity", &["min_liquidity", "min_lp"]),
    (Category::Pool, "max_liquidity", &["max_liquidity", "max_lp"]),
    (Category::Pool, "slippage", &["slippage"]),
    (Category::Pool, "fee_rate", &["fee_rate", "fee"]),
    (Category::Lending, "collateral_ratio", &["collateral_ratio", "ltv"]),
    (
        Category::Lending,
        "liquidation_threshold",
        &["liquidation_threshold", "liquidate_threshold", "liquidation"],
    ),
    (Category::Lending, "borrow_limit", &["borrow_limit", "max_borrow"]),
    (Category::Lending, "interest_rate", &["interest", "apr", "apy"]),
    (Category::Governance, "proposal_threshold", &["proposal_threshold", "min_proposal"]),
    (Category::Governance, "voting_delay", &["voting_delay"]),
    (Category::Governance, "voting_period", &["voting_period", "vote_duration"]),
    (Category::Governance, "execution_delay", &["execution_delay", "timelock_delay"]),
];

/// Field name fragments that mark a privileged control point.
const AUTHORITY_KINDS: &[(&str, &str)] = &[
    ("upgrade_authority", "upgrade"),
    ("emergency_authority", "emergency"),
    ("admin_authority", "admin"),
    ("global_authority", "admin"),
    ("migration_authority", "migration"),
    ("multisig", "multisig"),
    ("timelock", "timelock"),
    ("time_lock", "timelock"),
];

const ORACLE_PROVIDERS: &[&str] = &["pyth", "switchboard", "chainlink"];

/// Words that make a line worth searching for a feed address.
const FEED_CONTEXT: &[&str] = &["feed", "oracle", "price", "pyth", "switchboard", "chainlink"];

lazy_static! {
    static ref ASSIGNMENT: Regex = Regex::new(
        r"\b([A-Za-z_][A-Za-z0-9_]*)\s*(?::|==|<=|>=|=|<|>)\s*([0-9][0-9_]*(?:\.[0-9]+)?)(?:[iuf](?:8|16|32|64|128|size))?\b"
    )
    .expect("assignment regex");
    static ref NUMBER: Regex =
        Regex::new(r"^([0-9][0-9_]*(?:\.[0-9]+)?)(?:[iuf](?:8|16|32|64|128|size))?$").expect("number regex");
    static ref BASE58: Regex = Regex::new(r"\b[1-9A-HJ-NP-Za-km-z]{32,44}\b").expect("base58 regex");
}

/// One extracted setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub category: Category,
    pub name: String,
    pub value: String,
    /// Declaration, constant or macro the value was read from.
    pub subject: String,
    pub file: String,
    pub line: usize,
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} = {}", self.category, self.name, self.value)
    }
}

/// Rule matching a lowercased name.
fn numeric_rule(name: &str) -> Option<(Category, &'static str)> {
    NUMERIC_RULES
        .iter()
        .find(|(_, _, fragments)| fragments.iter().any(|f| name.contains(f)))
        .map(|(category, param, _)| (*category, *param))
}

/// Collects parameters for one subject, dropping repeats.
struct Collector<'a> {
    subject: &'a str,
    file: &'a str,
    seen: HashSet<(Category, String, String)>,
    out: Vec<Parameter>,
}

impl<'a> Collector<'a> {
    fn new(subject: &'a str, file: &'a str) -> Self {
        Self {
            subject,
            file,
            seen: HashSet::new(),
            out: Vec::new(),
        }
    }

    fn push(&mut self, category: Category, name: &str, value: &str, line: usize) {
        let key = (category, name.to_string(), value.to_string());
        if self.seen.insert(key) {
            self.out.push(Parameter {
                category,
                name: name.to_string(),
                value: value.to_string(),
                subject: self.subject.to_string(),
                file: self.file.to_string(),
                line,
            });
        }
    }

    /// Oracle provider and feed address mentioned on one line.
    fn oracle_line(&mut self, line: &str, lineno: usize) {
        let lowered = line.to_lowercase();
        for provider in ORACLE_PROVIDERS {
            if lowered.contains(provider) {
                self.push(Category::Oracle, "provider", provider, lineno);
            }
        }
        if FEED_CONTEXT.iter().any(|w| lowered.contains(w)) {
            for m in BASE58.find_iter(line) {
                if m.as_str().bytes().any(|b| b.is_ascii_digit()) {
                    self.push(Category::Oracle, "feed_address", m.as_str(), lineno);
                }
            }
        }
    }
}

/// Code part of a source line: empty for comment lines, and any trailing
/// `// ...` comment cut off.
fn code_of(line: &str) -> &str {
    let trimmed = line.trim_start();
    if trimmed.starts_with("//") {
        return "";
    }
    match line.find(" //") {
        Some(cut) => &line[..cut],
        None => line,
    }
}

/// Parameters found in a declaration's text and field names.
pub fn declaration_parameters(decl: &RawDeclaration) -> Vec<Parameter> {
    let mut collector = Collector::new(&decl.name, &decl.file);
    let text = decl.verbatim();

    // `decl.line` is the line of the item head; the text may start earlier
    // with attributes.
    let lead = text.len().saturating_sub(decl.text.len());
    let first_line = decl.line.saturating_sub(text[..lead].matches('\n').count());

    for (offset, line) in text.lines().enumerate() {
        let lineno = first_line + offset;
        let code = code_of(line);
        if code.trim().is_empty() {
            continue;
        }
        for cap in ASSIGNMENT.captures_iter(code) {
            let name = cap[1].to_lowercase();
            if let Some((category, param)) = numeric_rule(&name) {
                collector.push(category, param, &cap[2], lineno);
            }
        }
        collector.oracle_line(code, lineno);
    }

    for field in &decl.fields {
        let name = field.name.to_lowercase();
        if let Some((_, kind)) = AUTHORITY_KINDS.iter().find(|(f, _)| name.contains(f)) {
            collector.push(Category::Governance, kind, &field.name, decl.line);
        }
    }

    collector.out
}

/// Parameters carried by a constant: a numeric value under a rule name, or a
/// feed address.
pub fn constant_parameters(constant: &ConstantDeclaration) -> Vec<Parameter> {
    let mut collector = Collector::new(&constant.name, &constant.file);
    let name = constant.name.to_lowercase();

    if let Some(cap) = NUMBER.captures(&constant.value) {
        if let Some((category, param)) = numeric_rule(&name) {
            collector.push(category, param, &cap[1], constant.line);
        }
    }
    collector.oracle_line(&constant.text, constant.line);

    collector.out
}

/// An authority assertion as a governance parameter.
pub fn access_parameter(check: &AccessCheck) -> Parameter {
    let subject = format!("{}!", check.name);
    let args = check.args.split_whitespace().collect::<Vec<_>>().join(" ");
    Parameter {
        category: Category::Governance,
        name: "access_control".to_string(),
        value: format!("{}({})", subject, args),
        subject,
        file: check.file.clone(),
        line: check.line,
    }
}
