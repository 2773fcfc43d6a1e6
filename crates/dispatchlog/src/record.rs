//! Core record types for dispatchlog.
//!
//! This module defines the instruction record logged by dispatchers, the
//! validated input used to create one, and the narrow update that is the only
//! way a stored record may change.

use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Datelike, SubsecRound, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Label shown in place of an employee number for general information entries.
pub const INFORMATION_ENTRY: &str = "Information Entry";

/// Store-assigned identifier of an instruction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse()
            .map(Self)
            .map_err(|_| Error::invalid_input(format!("not a record id: {s:?}")))
    }
}

/// How an instruction was delivered to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommunicationType {
    /// A text message sent to the vehicle terminal.
    #[serde(rename = "Message Sent")]
    MessageSent,
    /// A voice call over the radio.
    #[serde(rename = "Radio Call")]
    RadioCall,
    /// Logged for information only.
    #[serde(rename = "Information")]
    Information,
}

impl CommunicationType {
    /// All communication types, in display order.
    pub const ALL: [Self; 3] = [Self::MessageSent, Self::RadioCall, Self::Information];

    /// The human-readable label, as printed in reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MessageSent => "Message Sent",
            Self::RadioCall => "Radio Call",
            Self::Information => "Information",
        }
    }
}

impl std::fmt::Display for CommunicationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommunicationType {
    type Err = Error;

    /// Accepts the display label or a kebab/snake-case spelling, ignoring case.
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "messagesent" | "message" => Ok(Self::MessageSent),
            "radiocall" | "radio" => Ok(Self::RadioCall),
            "information" | "info" => Ok(Self::Information),
            _ => Err(Error::invalid_record(
                "communication type",
                format!(
                    "unknown value {s:?}, expected one of {}",
                    Self::ALL.map(Self::as_str).join(", ")
                ),
            )),
        }
    }
}

/// Whether a vehicle was running ahead of or behind its schedule.
///
/// Derived from the free-text early/late field. Text mentioning only "early"
/// or "ahead" is early; text mentioning only "late", "behind" or "delay" is
/// late. Otherwise a leading signed minute count decides: negative is early,
/// positive is late.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleAdherence {
    /// Running ahead of schedule.
    Early,
    /// Running behind schedule.
    Late,
    /// The text does not say which.
    Unspecified,
}

fn early_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\b(early|ahead)").expect("Invalid regex pattern"))
}

fn late_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)\b(late|behind|delay)").expect("Invalid regex pattern"))
}

fn minutes_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*([+-]?\d+(?:\.\d+)?)").expect("Invalid regex pattern")
    })
}

impl ScheduleAdherence {
    /// Classify a free-text early/late description.
    #[must_use]
    pub fn classify(text: &str) -> Self {
        match (early_pattern().is_match(text), late_pattern().is_match(text)) {
            (true, false) => return Self::Early,
            (false, true) => return Self::Late,
            (true, true) => return Self::Unspecified,
            (false, false) => {}
        }

        let minutes = minutes_pattern()
            .captures(text)
            .and_then(|caps| caps[1].parse::<f64>().ok());
        match minutes {
            Some(m) if m < 0.0 => Self::Early,
            Some(m) if m > 0.0 => Self::Late,
            _ => Self::Unspecified,
        }
    }
}

impl std::fmt::Display for ScheduleAdherence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Early => write!(f, "Early"),
            Self::Late => write!(f, "Late"),
            Self::Unspecified => write!(f, "Unspecified"),
        }
    }
}

/// One logged instruction from dispatch to a driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionRecord {
    /// Identifier assigned by the store.
    pub id: RecordId,

    /// The driver this instruction was given to; absent for general
    /// information entries.
    pub employee_number: Option<String>,

    /// Route the vehicle was running.
    pub route: String,

    /// Scheduled trip identifier.
    pub running_number: String,

    /// Minutes of spacing error relative to the preceding vehicle.
    pub headway_deviation: Option<f64>,

    /// Free-text schedule adherence, e.g. "5 min early".
    pub early_late: Option<String>,

    /// How the instruction was delivered.
    pub communication_type: Option<CommunicationType>,

    /// The instruction body.
    pub instruction: String,

    /// When the instruction was given.
    pub timestamp: DateTime<Utc>,
}

impl InstructionRecord {
    /// The employee number, or [`INFORMATION_ENTRY`] when absent.
    #[must_use]
    pub fn employee_label(&self) -> &str {
        self.employee_number.as_deref().unwrap_or(INFORMATION_ENTRY)
    }

    /// Structured classification of the early/late text, if any was logged.
    #[must_use]
    pub fn schedule(&self) -> Option<ScheduleAdherence> {
        self.early_late.as_deref().map(ScheduleAdherence::classify)
    }
}

/// Validated input for creating an instruction record.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInstruction {
    pub(crate) employee_number: Option<String>,
    pub(crate) route: String,
    pub(crate) running_number: String,
    pub(crate) headway_deviation: Option<f64>,
    pub(crate) early_late: Option<String>,
    pub(crate) communication_type: Option<CommunicationType>,
    pub(crate) instruction: String,
    pub(crate) timestamp: DateTime<Utc>,
}

impl NewInstruction {
    /// Start a new instruction with its required fields, timestamped now.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecord`] if any required field is blank.
    pub fn new(
        route: impl Into<String>,
        running_number: impl Into<String>,
        instruction: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            employee_number: None,
            route: required("route", route.into())?,
            running_number: required("running number", running_number.into())?,
            headway_deviation: None,
            early_late: None,
            communication_type: None,
            instruction: required("instruction", instruction.into())?,
            timestamp: Utc::now().trunc_subsecs(TIMESTAMP_PRECISION),
        })
    }

    /// Attribute the instruction to a driver. Blank means a general entry.
    #[must_use]
    pub fn with_employee(mut self, employee_number: Option<String>) -> Self {
        self.employee_number = optional(employee_number);
        self
    }

    /// Record the headway deviation in minutes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecord`] if the value is not finite.
    pub fn with_headway_deviation(mut self, minutes: Option<f64>) -> Result<Self> {
        if let Some(m) = minutes {
            if !m.is_finite() {
                return Err(Error::invalid_record(
                    "headway deviation",
                    format!("{m} is not a finite number of minutes"),
                ));
            }
        }
        self.headway_deviation = minutes;
        Ok(self)
    }

    /// Record the free-text early/late description.
    #[must_use]
    pub fn with_early_late(mut self, early_late: Option<String>) -> Self {
        self.early_late = optional(early_late);
        self
    }

    /// Record how the instruction was delivered.
    #[must_use]
    pub fn with_communication_type(mut self, kind: Option<CommunicationType>) -> Self {
        self.communication_type = kind;
        self
    }

    /// Override the creation timestamp. Sub-millisecond digits are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecord`] if the year is outside 0000-9999.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Result<Self> {
        self.timestamp = storable_timestamp(timestamp)?;
        Ok(self)
    }

    /// Enforce a maximum instruction length in characters (0 = unlimited).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecord`] if the instruction is too long.
    pub fn check_length(&self, max_chars: usize) -> Result<()> {
        let len = self.instruction.chars().count();
        if max_chars > 0 && len > max_chars {
            return Err(Error::invalid_record(
                "instruction",
                format!("{len} characters exceeds the limit of {max_chars}"),
            ));
        }
        Ok(())
    }

    /// The driver this instruction is for, if any.
    #[must_use]
    pub fn employee_number(&self) -> Option<&str> {
        self.employee_number.as_deref()
    }

    /// Route the vehicle is running.
    #[must_use]
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Running number of the trip.
    #[must_use]
    pub fn running_number(&self) -> &str {
        &self.running_number
    }

    /// Minutes too close to the leading vehicle.
    #[must_use]
    pub fn headway_deviation(&self) -> Option<f64> {
        self.headway_deviation
    }

    /// Free-text early/late description.
    #[must_use]
    pub fn early_late(&self) -> Option<&str> {
        self.early_late.as_deref()
    }

    /// How the instruction was delivered.
    #[must_use]
    pub fn communication_type(&self) -> Option<CommunicationType> {
        self.communication_type
    }

    /// The instruction text.
    #[must_use]
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// When the instruction will be recorded as given.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// The only mutation a stored record accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstructionUpdate {
    /// `Some(None)` clears the employee number, `Some(Some(..))` sets it.
    pub employee_number: Option<Option<String>>,
    /// Reassigned timestamp.
    pub timestamp: Option<DateTime<Utc>>,
}

impl InstructionUpdate {
    /// Set or clear the employee number. Blank clears it.
    #[must_use]
    pub fn employee(mut self, employee_number: Option<String>) -> Self {
        self.employee_number = Some(optional(employee_number));
        self
    }

    /// Reassign the timestamp. Sub-millisecond digits are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecord`] if the year is outside 0000-9999.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Result<Self> {
        self.timestamp = Some(storable_timestamp(timestamp)?);
        Ok(self)
    }

    /// True if applying this update would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.employee_number.is_none() && self.timestamp.is_none()
    }
}

/// Fractional-second digits kept on stored timestamps.
const TIMESTAMP_PRECISION: u16 = 3;

/// Stored timestamps are fixed-width RFC 3339 text: four-digit years and
/// millisecond precision, so they round-trip exactly and sort lexically.
fn storable_timestamp(timestamp: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if !(0..=9999).contains(&timestamp.year()) {
        return Err(Error::invalid_record(
            "timestamp",
            format!("year {} is outside 0000-9999", timestamp.year()),
        ));
    }
    Ok(timestamp.trunc_subsecs(TIMESTAMP_PRECISION))
}

fn required(field: &'static str, value: String) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid_record(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
