//! Partition period arithmetic and name encoding.
//!
//! Partition names encode their period: `table_2026_08` for monthly
//! policies, `table_2026_Q3` for quarterly ones. Partition state is never
//! stored; it is derived by parsing the names of existing tables.

use chrono::{Datelike, Months, NaiveDate};
use dbtune_domain::types::PartitionPeriod;

/// One partition period: its name suffix and `[start, end)` date range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodBound {
    /// Name suffix (`2026_08` or `2026_Q3`).
    pub suffix: String,
    /// First day of the period.
    pub start: NaiveDate,
    /// First day of the following period.
    pub end: NaiveDate,
}

/// The period containing `date`.
pub fn period_containing(period: PartitionPeriod, date: NaiveDate) -> Option<PeriodBound> {
    match period {
        PartitionPeriod::Monthly => {
            let start = NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?;
            let end = start.checked_add_months(Months::new(1))?;
            Some(PeriodBound { suffix: format!("{:04}_{:02}", start.year(), start.month()), start, end })
        }
        PartitionPeriod::Quarterly => {
            let quarter = (date.month() - 1) / 3 + 1;
            let start = NaiveDate::from_ymd_opt(date.year(), (quarter - 1) * 3 + 1, 1)?;
            let end = start.checked_add_months(Months::new(3))?;
            Some(PeriodBound { suffix: format!("{:04}_Q{}", start.year(), quarter), start, end })
        }
    }
}

/// The current period plus the periods covering the next `months_ahead`
/// months, oldest first.
pub fn upcoming_periods(
    period: PartitionPeriod,
    from: NaiveDate,
    months_ahead: u32,
) -> Vec<PeriodBound> {
    let mut bounds = Vec::new();
    let Some(mut current) = period_containing(period, from) else {
        return bounds;
    };
    let Some(horizon) = from.checked_add_months(Months::new(months_ahead)) else {
        return bounds;
    };
    loop {
        let next_start = current.end;
        bounds.push(current);
        if next_start > horizon {
            break;
        }
        match period_containing(period, next_start) {
            Some(next) => current = next,
            None => break,
        }
    }
    bounds
}

/// Full partition table name for a period of `table`.
pub fn partition_name(table: &str, bound: &PeriodBound) -> String {
    format!("{table}_{}", bound.suffix)
}

/// Recover the period of an existing partition from its name.
///
/// Returns `None` for tables that do not follow the `table_<suffix>`
/// encoding of the given period kind (archives, unrelated tables).
pub fn parse_partition_bound(
    table: &str,
    partition: &str,
    period: PartitionPeriod,
) -> Option<PeriodBound> {
    let suffix = partition.strip_prefix(table)?.strip_prefix('_')?;
    let (year_text, rest) = suffix.split_once('_')?;
    let year: i32 = year_text.parse().ok()?;

    let start = match period {
        PartitionPeriod::Monthly => {
            let month: u32 = rest.parse().ok()?;
            NaiveDate::from_ymd_opt(year, month, 1)?
        }
        PartitionPeriod::Quarterly => {
            let quarter: u32 = rest.strip_prefix('Q')?.parse().ok()?;
            if !(1..=4).contains(&quarter) {
                return None;
            }
            NaiveDate::from_ymd_opt(year, (quarter - 1) * 3 + 1, 1)?
        }
    };
    period_containing(period, start)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn monthly_period_spans_one_calendar_month() {
        let bound = period_containing(PartitionPeriod::Monthly, date(2026, 8, 15)).unwrap();
        assert_eq!(bound.suffix, "2026_08");
        assert_eq!(bound.start, date(2026, 8, 1));
        assert_eq!(bound.end, date(2026, 9, 1));
    }

    #[test]
    fn quarterly_period_spans_three_months() {
        let bound = period_containing(PartitionPeriod::Quarterly, date(2026, 8, 15)).unwrap();
        assert_eq!(bound.suffix, "2026_Q3");
        assert_eq!(bound.start, date(2026, 7, 1));
        assert_eq!(bound.end, date(2026, 10, 1));
    }

    #[test]
    fn upcoming_periods_cover_the_horizon() {
        let bounds = upcoming_periods(PartitionPeriod::Monthly, date(2026, 11, 20), 3);
        let suffixes: Vec<&str> = bounds.iter().map(|b| b.suffix.as_str()).collect();
        assert_eq!(suffixes, ["2026_11", "2026_12", "2027_01", "2027_02"]);
    }

    #[test]
    fn quarterly_upcoming_periods_roll_over_years() {
        let bounds = upcoming_periods(PartitionPeriod::Quarterly, date(2026, 11, 20), 3);
        let suffixes: Vec<&str> = bounds.iter().map(|b| b.suffix.as_str()).collect();
        assert_eq!(suffixes, ["2026_Q4", "2027_Q1"]);
    }

    #[test]
    fn partition_names_round_trip() {
        let bound = period_containing(PartitionPeriod::Monthly, date(2026, 8, 1)).unwrap();
        let name = partition_name("audit_events", &bound);
        assert_eq!(name, "audit_events_2026_08");
        let parsed = parse_partition_bound("audit_events", &name, PartitionPeriod::Monthly).unwrap();
        assert_eq!(parsed, bound);
    }

    #[test]
    fn foreign_names_do_not_parse() {
        assert!(parse_partition_bound("t", "archive_t_2026_08", PartitionPeriod::Monthly).is_none());
        assert!(parse_partition_bound("t", "t_backup", PartitionPeriod::Monthly).is_none());
        assert!(parse_partition_bound("t", "t_2026_Q5", PartitionPeriod::Quarterly).is_none());
    }
}
