//! Text reports over instruction records.
//!
//! Two reports exist: every instruction given on one day, and the
//! instructions given to one employee on one day. Both are pure functions of
//! the records passed in, the report time zone and the generation instant.
//!
//! # Example
//!
//! ```
//! use chrono::{NaiveDate, TimeZone, Utc};
//! use dispatchlog::report::Reporter;
//!
//! let reporter = Reporter::new(Utc);
//! let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
//! let generated_at = Utc.with_ymd_and_hms(2024, 1, 5, 18, 0, 0).unwrap();
//!
//! let summary = reporter
//!     .employee_daily(&[], "E999", date, generated_at)
//!     .unwrap();
//! assert_eq!(
//!     summary.to_string(),
//!     "No instructions found for employee E999 on January 5th, 2024."
//! );
//! ```

use std::fmt;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::dates::{clock_time, long_date};
use crate::error::{Error, Result};
use crate::record::{InstructionRecord, ScheduleAdherence};

/// Builds reports with calendar dates taken in a fixed time zone.
#[derive(Debug, Clone)]
pub struct Reporter<Tz: TimeZone> {
    tz: Tz,
}

impl<Tz: TimeZone> Reporter<Tz> {
    /// Create a reporter for the given time zone.
    #[must_use]
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Instructions given to `employee` on `date`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `employee` is blank.
    pub fn employee_daily<'a>(
        &self,
        records: &'a [InstructionRecord],
        employee: &'a str,
        date: NaiveDate,
        generated_at: DateTime<Utc>,
    ) -> Result<Summary<'a>> {
        if employee.trim().is_empty() {
            return Err(Error::invalid_input("employee id must not be empty"));
        }

        let entries = self.entries_on(records, date, |record| {
            record.employee_number.as_deref() == Some(employee)
        });
        Ok(self.summary(Scope::Employee(employee), date, entries, generated_at))
    }

    /// Every instruction given on `date`, oldest first.
    #[must_use]
    pub fn daily<'a>(
        &self,
        records: &'a [InstructionRecord],
        date: NaiveDate,
        generated_at: DateTime<Utc>,
    ) -> Summary<'a> {
        let entries = self.entries_on(records, date, |_| true);
        self.summary(Scope::Daily, date, entries, generated_at)
    }

    fn entries_on<'a>(
        &self,
        records: &'a [InstructionRecord],
        date: NaiveDate,
        keep: impl Fn(&InstructionRecord) -> bool,
    ) -> Vec<Entry<'a>> {
        let mut entries: Vec<Entry<'a>> = records
            .iter()
            .filter(|record| keep(*record))
            .filter_map(|record| {
                let local = record.timestamp.with_timezone(&self.tz).naive_local();
                (local.date() == date).then_some(Entry {
                    time: local.time(),
                    record,
                })
            })
            .collect();
        // Stable: records sharing a timestamp keep their input order.
        entries.sort_by_key(|entry| entry.record.timestamp);
        entries
    }

    fn summary<'a>(
        &self,
        scope: Scope<'a>,
        date: NaiveDate,
        entries: Vec<Entry<'a>>,
        generated_at: DateTime<Utc>,
    ) -> Summary<'a> {
        Summary {
            scope,
            date,
            entries,
            generated_at: generated_at.with_timezone(&self.tz).naive_local(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope<'a> {
    Daily,
    Employee(&'a str),
}

#[derive(Debug, Clone, Copy)]
struct Entry<'a> {
    time: NaiveTime,
    record: &'a InstructionRecord,
}

/// A rendered-on-demand report. `Display` produces the report text.
#[derive(Debug, Clone)]
pub struct Summary<'a> {
    scope: Scope<'a>,
    date: NaiveDate,
    entries: Vec<Entry<'a>>,
    generated_at: NaiveDateTime,
}

impl<'a> Summary<'a> {
    /// Number of instructions in the report.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no instruction matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The reported records, in report order.
    pub fn records(&self) -> impl Iterator<Item = &'a InstructionRecord> + '_ {
        self.entries.iter().map(|entry| entry.record)
    }
}

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let date = long_date(self.date);

        if self.entries.is_empty() {
            return match self.scope {
                Scope::Employee(employee) => write!(
                    f,
                    "No instructions found for employee {employee} on {date}."
                ),
                Scope::Daily => write!(f, "No instructions found for {date}."),
            };
        }

        match self.scope {
            Scope::Employee(employee) => {
                writeln!(f, "DRIVER INSTRUCTION SUMMARY")?;
                writeln!(f, "=========================")?;
                writeln!(f)?;
                writeln!(f, "Employee: {employee}")?;
            }
            Scope::Daily => {
                writeln!(f, "DAILY INSTRUCTION REPORT")?;
                writeln!(f, "========================")?;
                writeln!(f)?;
            }
        }
        writeln!(f, "Date: {date}")?;
        writeln!(f, "Total Instructions: {}", self.entries.len())?;
        writeln!(f)?;
        writeln!(f, "INSTRUCTION DETAILS:")?;
        writeln!(f, "-------------------")?;
        writeln!(f)?;

        for (index, entry) in self.entries.iter().enumerate() {
            let record = entry.record;
            writeln!(f, "{}. Time: {}", index + 1, entry.time.format("%H:%M"))?;
            if self.scope == Scope::Daily {
                writeln!(f, "   Employee: {}", record.employee_label())?;
            }
            writeln!(f, "   Route: {}", record.route)?;
            writeln!(f, "   Running Number: {}", record.running_number)?;
            if let Some(minutes) = record.headway_deviation {
                writeln!(
                    f,
                    "   Headway Deviation: {minutes} mins too close to leader"
                )?;
            }
            match (record.schedule(), &record.early_late) {
                (Some(ScheduleAdherence::Unspecified), Some(text)) => {
                    writeln!(f, "   Schedule: {text}")?;
                }
                (Some(known), _) => writeln!(f, "   Schedule: {known}")?,
                (None, _) => {}
            }
            if let Some(kind) = record.communication_type {
                writeln!(f, "   Communication: {kind}")?;
            }
            writeln!(f, "   Instruction: {}", record.instruction)?;
            writeln!(f)?;
        }

        write!(
            f,
            "Generated on: {} {}",
            long_date(self.generated_at.date()),
            clock_time(self.generated_at)
        )
    }
}

/// Employee daily summary in the local time zone, generated now.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if `employee_id` is blank.
pub fn generate_employee_daily_summary(
    records: &[InstructionRecord],
    employee_id: &str,
    date: NaiveDate,
) -> Result<String> {
    Reporter::new(Local)
        .employee_daily(records, employee_id, date, Utc::now())
        .map(|summary| summary.to_string())
}

/// Daily summary in the local time zone, generated now.
#[must_use]
pub fn generate_daily_summary(records: &[InstructionRecord], date: NaiveDate) -> String {
    Reporter::new(Local)
        .daily(records, date, Utc::now())
        .to_string()
}
