//! Filtering and statistics over the fetched record collection.
//!
//! A [`ViewFilter`] is the complete view state: search text, selected date
//! and selected employee. It is passed explicitly to pure functions; nothing
//! here holds or mutates state between calls.

use std::collections::{BTreeSet, HashMap};

use chrono::{NaiveDate, TimeZone};
use serde::Serialize;

use crate::dates::calendar_date;
use crate::record::InstructionRecord;

/// What the dispatcher has narrowed the record list down to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewFilter {
    /// Case-insensitive text matched against the searchable fields.
    pub search: Option<String>,
    /// Only records on this calendar date.
    pub date: Option<NaiveDate>,
    /// Only records for this employee number (exact match).
    pub employee: Option<String>,
}

impl ViewFilter {
    /// True if no criterion is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.search.as_deref().map_or(true, str::is_empty)
            && self.date.is_none()
            && self.employee.is_none()
    }

    /// Check a single record against every criterion.
    #[must_use]
    pub fn matches<Tz: TimeZone>(&self, record: &InstructionRecord, tz: &Tz) -> bool {
        if let Some(term) = &self.search {
            if !matches_search(record, term) {
                return false;
            }
        }
        if let Some(date) = self.date {
            if calendar_date(record.timestamp, tz) != date {
                return false;
            }
        }
        if let Some(employee) = &self.employee {
            if record.employee_number.as_deref() != Some(employee.as_str()) {
                return false;
            }
        }
        true
    }

    /// The matching records, in input order.
    #[must_use]
    pub fn apply<'a, Tz: TimeZone>(
        &self,
        records: &'a [InstructionRecord],
        tz: &Tz,
    ) -> Vec<&'a InstructionRecord> {
        records.iter().filter(|r| self.matches(r, tz)).collect()
    }
}

/// Case-insensitive substring search over employee number, route, running
/// number, headway deviation and early/late text. An empty term matches all.
#[must_use]
pub fn matches_search(record: &InstructionRecord, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return true;
    }
    let contains = |field: &str| field.to_lowercase().contains(&term);

    record.employee_number.as_deref().is_some_and(contains)
        || contains(&record.route)
        || contains(&record.running_number)
        || record
            .headway_deviation
            .is_some_and(|h| contains(&h.to_string()))
        || record.early_late.as_deref().is_some_and(contains)
}

/// Number of instructions logged against one employee label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriverCount {
    /// Employee number, or the information-entry label.
    pub label: String,
    /// How many instructions carry that label.
    pub count: usize,
}

/// The `top` most-instructed employees, busiest first, ties by label.
#[must_use]
pub fn driver_stats(records: &[InstructionRecord], top: usize) -> Vec<DriverCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in records {
        *counts.entry(record.employee_label()).or_default() += 1;
    }

    let mut stats: Vec<DriverCount> = counts
        .into_iter()
        .map(|(label, count)| DriverCount {
            label: label.to_string(),
            count,
        })
        .collect();
    stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    stats.truncate(top);
    stats
}

/// Distinct employee numbers, sorted.
#[must_use]
pub fn unique_employees(records: &[InstructionRecord]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.employee_number.as_deref())
        .filter(|e| !e.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// How many instructions were logged on `date`.
#[must_use]
pub fn count_on_date<Tz: TimeZone>(records: &[InstructionRecord], date: NaiveDate, tz: &Tz) -> usize {
    records
        .iter()
        .filter(|r| calendar_date(r.timestamp, tz) == date)
        .count()
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::record::{RecordId, INFORMATION_ENTRY};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    fn record(id: i64, employee: Option<&str>, route: &str, day: u32) -> InstructionRecord {
        InstructionRecord {
            id: RecordId(id),
            employee_number: employee.map(str::to_string),
            route: route.to_string(),
            running_number: format!("R{id}"),
            headway_deviation: None,
            early_late: None,
            communication_type: None,
            instruction: "Hold".to_string(),
            timestamp: at(day, 9),
        }
    }

    fn sample() -> Vec<InstructionRecord> {
        vec![
            record(1, Some("E100"), "12", 5),
            record(2, Some("E200"), "7A", 5),
            record(3, Some("E100"), "12", 6),
            record(4, None, "99", 5),
            record(5, Some("E100"), "31", 5),
        ]
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let records = sample();
        let filter = ViewFilter::default();
        assert!(filter.is_empty());
        assert_eq!(filter.apply(&records, &Utc).len(), records.len());
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let records = sample();
        let filter = ViewFilter {
            search: Some("7a".to_string()),
            ..ViewFilter::default()
        };
        let ids: Vec<RecordId> = filter.apply(&records, &Utc).iter().map(|r| r.id).collect();
        assert_eq!(ids, [RecordId(2)]);
    }

    #[test]
    fn test_search_covers_optional_fields() {
        let mut rec = record(1, None, "12", 5);
        rec.early_late = Some("4 min LATE".to_string());
        rec.headway_deviation = Some(3.5);

        assert!(matches_search(&rec, "late"));
        assert!(matches_search(&rec, "3.5"));
        assert!(matches_search(&rec, "r1"));
        assert!(!matches_search(&rec, "hold"));
        assert!(matches_search(&rec, "   "));
    }

    #[test]
    fn test_filters_combine() {
        let records = sample();
        let filter = ViewFilter {
            search: None,
            date: NaiveDate::from_ymd_opt(2024, 1, 5),
            employee: Some("E100".to_string()),
        };
        let ids: Vec<RecordId> = filter.apply(&records, &Utc).iter().map(|r| r.id).collect();
        assert_eq!(ids, [RecordId(1), RecordId(5)]);
    }

    #[test]
    fn test_driver_stats_ordering() {
        let records = sample();
        let stats = driver_stats(&records, 10);
        assert_eq!(
            stats,
            vec![
                DriverCount {
                    label: "E100".to_string(),
                    count: 3
                },
                DriverCount {
                    label: "E200".to_string(),
                    count: 1
                },
                DriverCount {
                    label: INFORMATION_ENTRY.to_string(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn test_driver_stats_truncates() {
        let records = sample();
        let stats = driver_stats(&records, 1);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].label, "E100");
        assert!(driver_stats(&[], 10).is_empty());
    }

    #[test]
    fn test_unique_employees_sorted_and_distinct() {
        let mut records = sample();
        records.push(record(6, Some("A001"), "1", 7));
        assert_eq!(unique_employees(&records), ["A001", "E100", "E200"]);
    }

    #[test]
    fn test_count_on_date() {
        let records = sample();
        let jan5 = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let jan7 = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
        assert_eq!(count_on_date(&records, jan5, &Utc), 4);
        assert_eq!(count_on_date(&records, jan7, &Utc), 0);
    }
}
