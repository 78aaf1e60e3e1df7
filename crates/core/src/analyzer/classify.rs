//! Structural query classification.
//!
//! Text matching on the normalized digest: deliberately a heuristic,
//! not a SQL parser. Callers depend only on this function's signature,
//! so a real tokenizer could replace the internals without touching them.

use dbtune_domain::types::PatternKind;

/// Classify a normalized SQL digest into a [`PatternKind`].
///
/// Match order matters: a joined `SELECT` with an `IN` filter counts as
/// a join query, and `IN`-filtered selects take precedence over the
/// `SELECT *` projection check.
pub fn classify(normalized: &str) -> PatternKind {
    let lower = normalized.to_lowercase();

    if lower.contains("select") && lower.contains(" join ") {
        PatternKind::JoinQuery
    } else if lower.contains("select") && lower.contains("where") && lower.contains(" in (") {
        PatternKind::InQuery
    } else if lower.contains("select *") {
        PatternKind::SelectAll
    } else if lower.starts_with("insert") && lower.contains("values") && lower.contains("), (") {
        PatternKind::BulkInsert
    } else if lower.starts_with("update") && lower.contains("where") {
        PatternKind::UpdateQuery
    } else {
        PatternKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_queries_win_over_other_shapes() {
        assert_eq!(
            classify("SELECT * FROM a JOIN b ON a.id = b.a_id WHERE a.x IN (?)"),
            PatternKind::JoinQuery,
        );
    }

    #[test]
    fn in_filters_are_the_n_plus_one_fingerprint() {
        assert_eq!(
            classify("SELECT id, name FROM users WHERE id IN (?)"),
            PatternKind::InQuery,
        );
    }

    #[test]
    fn select_star_is_select_all() {
        assert_eq!(classify("SELECT * FROM users"), PatternKind::SelectAll);
    }

    #[test]
    fn multi_row_inserts_are_bulk() {
        assert_eq!(
            classify("INSERT INTO t (a, b) VALUES (?, ?), (?, ?)"),
            PatternKind::BulkInsert,
        );
        assert_eq!(classify("INSERT INTO t (a) VALUES (?)"), PatternKind::Other);
    }

    #[test]
    fn filtered_updates_are_update_queries() {
        assert_eq!(classify("UPDATE t SET a = ? WHERE id = ?"), PatternKind::UpdateQuery);
        assert_eq!(classify("DELETE FROM t WHERE id = ?"), PatternKind::Other);
    }
}
