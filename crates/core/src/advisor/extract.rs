//! Candidate column extraction from normalized SQL.
//!
//! Structural fragment matching on digests: the WHERE/ORDER BY/GROUP
//! BY/JOIN shapes that benefit from an index. A heuristic by design;
//! callers depend only on [`extract_candidate_columns`], so a SQL-aware
//! tokenizer could replace the internals without touching them.

use once_cell::sync::Lazy;
use regex::Regex;

// Patterns are compile-time constants; covered by the unit tests below.
#[allow(clippy::expect_used)]
fn pattern(re: &'static str) -> Regex {
    Regex::new(re).expect("static extraction pattern must compile")
}

static EQUALITY_FILTER: Lazy<Regex> = Lazy::new(|| pattern(r"(?i)\bWHERE\s+(\w+)\s*="));
static RANGE_FILTER: Lazy<Regex> = Lazy::new(|| pattern(r"(?i)\bWHERE\s+(\w+)\s*[<>]=?"));
static IN_FILTER: Lazy<Regex> = Lazy::new(|| pattern(r"(?i)\bWHERE\s+(\w+)\s+IN\s*\("));
static LIKE_FILTER: Lazy<Regex> = Lazy::new(|| pattern(r"(?i)\bWHERE\s+(\w+)\s+LIKE\b"));
static ORDER_BY: Lazy<Regex> = Lazy::new(|| pattern(r"(?i)\bORDER\s+BY\s+(\w+)"));
static GROUP_BY: Lazy<Regex> = Lazy::new(|| pattern(r"(?i)\bGROUP\s+BY\s+(\w+)"));
static JOIN_ON: Lazy<Regex> =
    Lazy::new(|| pattern(r"(?i)\bJOIN\s+\w+\s+ON\s+\w+\.(\w+)\s*=\s*\w+\.(\w+)"));
static FROM_TABLE: Lazy<Regex> = Lazy::new(|| pattern(r"(?i)\bFROM\s+(\w+)"));

/// A (table, column) pair extracted from a digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    /// Table the column was attributed to.
    pub table: String,
    /// Column name.
    pub column: String,
}

/// Extract the candidate index columns a normalized statement touches.
///
/// Returns deduplicated (table, column) pairs; columns that cannot be
/// attributed to a table are dropped.
pub fn extract_candidate_columns(normalized: &str) -> Vec<ColumnRef> {
    let mut refs = Vec::new();

    let single_column = [
        &*EQUALITY_FILTER,
        &*RANGE_FILTER,
        &*IN_FILTER,
        &*LIKE_FILTER,
        &*ORDER_BY,
        &*GROUP_BY,
    ];
    for regex in single_column {
        for caps in regex.captures_iter(normalized) {
            if let Some(column) = caps.get(1) {
                push_ref(&mut refs, normalized, column.as_str());
            }
        }
    }

    for caps in JOIN_ON.captures_iter(normalized) {
        for group in [1, 2] {
            if let Some(column) = caps.get(group) {
                push_ref(&mut refs, normalized, column.as_str());
            }
        }
    }

    refs
}

fn push_ref(refs: &mut Vec<ColumnRef>, normalized: &str, column: &str) {
    let Some(table) = attribute_table(normalized, column) else {
        return;
    };
    let candidate = ColumnRef { table, column: column.to_string() };
    if !refs.contains(&candidate) {
        refs.push(candidate);
    }
}

/// Attribute a column to a table: the statement's `FROM` table when
/// present, else the qualifier of a `table.column` reference.
fn attribute_table(normalized: &str, column: &str) -> Option<String> {
    if let Some(caps) = FROM_TABLE.captures(normalized) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }
    let qualified = Regex::new(&format!(r"(?i)(\w+)\.{}\b", regex::escape(column))).ok()?;
    qualified.captures(normalized).and_then(|caps| caps.get(1)).map(|m| m.as_str().to_string())
}
