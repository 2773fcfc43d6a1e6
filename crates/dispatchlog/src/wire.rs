//! JSON exchange format for instruction records.
//!
//! Exported records use the canonical camelCase names of
//! [`InstructionRecord`](crate::record::InstructionRecord). Imports go through [`WireInstruction`], which also
//! accepts the column names older deployments wrote (`Driver ID`, `Run No`,
//! `Delay`, ...) and maps them onto the canonical schema here, so nothing
//! past this module sees them.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::error::{Error, Result};
use crate::record::{CommunicationType, NewInstruction};
use crate::storage::RecordStore;

/// One instruction as found in an import file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireInstruction {
    /// Driver the instruction was given to.
    #[serde(
        default,
        alias = "driverId",
        alias = "Driver ID",
        deserialize_with = "text_or_number"
    )]
    pub employee_number: Option<String>,

    /// Route the vehicle was running.
    #[serde(default, alias = "Route", deserialize_with = "text_or_number")]
    pub route: Option<String>,

    /// Scheduled trip identifier.
    #[serde(default, alias = "Run No", deserialize_with = "text_or_number")]
    pub running_number: Option<String>,

    /// Minutes of headway deviation.
    #[serde(
        default,
        alias = "Headway Deviation",
        deserialize_with = "number_or_text"
    )]
    pub headway_deviation: Option<f64>,

    /// Free-text or numeric early/late value.
    #[serde(default, alias = "Delay", deserialize_with = "text_or_number")]
    pub early_late: Option<String>,

    /// Delivery channel label.
    #[serde(default, deserialize_with = "text_or_number")]
    pub communication_type: Option<String>,

    /// The instruction body.
    #[serde(default, alias = "Instruction", deserialize_with = "text_or_number")]
    pub instruction: Option<String>,

    /// When the instruction was given.
    #[serde(default, alias = "Created at")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl WireInstruction {
    /// Validate and convert into a [`NewInstruction`].
    ///
    /// A missing timestamp means "now".
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecord`](crate::Error::InvalidRecord) if a required field is missing or a
    /// value is out of range.
    pub fn into_new_instruction(self) -> Result<NewInstruction> {
        let communication_type = self
            .communication_type
            .filter(|c| !c.trim().is_empty())
            .map(|c| c.parse::<CommunicationType>())
            .transpose()?;

        let mut new = NewInstruction::new(
            self.route.unwrap_or_default(),
            self.running_number.unwrap_or_default(),
            self.instruction.unwrap_or_default(),
        )?
        .with_employee(self.employee_number)
        .with_headway_deviation(self.headway_deviation)?
        .with_early_late(self.early_late)
        .with_communication_type(communication_type);

        if let Some(timestamp) = self.timestamp {
            new = new.at(timestamp)?;
        }
        Ok(new)
    }
}

/// Parse an import document: one instruction object or an array of them.
///
/// # Errors
///
/// Returns [`Error::Json`](crate::Error::Json) if the document is not valid JSON of that shape.
pub fn parse_import(json: &str) -> Result<Vec<WireInstruction>> {
    // Dispatch on the first token so field errors keep their line and column.
    if json.trim_start().starts_with('[') {
        Ok(serde_json::from_str(json)?)
    } else {
        Ok(vec![serde_json::from_str(json)?])
    }
}

/// Read and parse an import file.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be read, or
/// [`Error::Json`] if it does not parse.
pub fn read_import(path: &Path) -> Result<Vec<WireInstruction>> {
    let json = std::fs::read_to_string(path)?;
    debug!("Read {} bytes from {}", json.len(), path.display());
    parse_import(&json)
}

/// Validate every entry of an import, stopping at the first bad one.
///
/// # Errors
///
/// Returns [`Error::ImportEntry`] naming the first entry that is missing a
/// required field, carries an out-of-range value or exceeds
/// `max_instruction_length` characters (0 = unlimited).
pub fn validate_import(
    items: Vec<WireInstruction>,
    max_instruction_length: usize,
) -> Result<Vec<NewInstruction>> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            item.into_new_instruction()
                .and_then(|new| new.check_length(max_instruction_length).map(|()| new))
                .map_err(|source| Error::ImportEntry {
                    entry: index + 1,
                    source: Box::new(source),
                })
        })
        .collect()
}

/// Validate a whole import, then write it. Nothing is written if any entry
/// is invalid.
///
/// # Errors
///
/// Returns [`Error::ImportEntry`] for an invalid entry, or the store's error
/// if a write fails.
pub fn import_into<S: RecordStore>(
    store: &S,
    items: Vec<WireInstruction>,
    max_instruction_length: usize,
) -> Result<usize> {
    let pending = validate_import(items, max_instruction_length)?;
    for new in &pending {
        store.create(new)?;
    }
    Ok(pending.len())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(serde_json::Number),
}

/// Strings stay strings, numbers become their decimal text, blanks vanish.
fn text_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Scalar>::deserialize(deserializer)?;
    Ok(value
        .map(|scalar| match scalar {
            Scalar::Text(text) => text.trim().to_string(),
            Scalar::Number(number) => number.to_string(),
        })
        .filter(|text| !text.is_empty()))
}

/// Numbers, or strings holding numbers, as `f64`; blanks vanish.
fn number_or_text<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;

    match Option::<Scalar>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Scalar::Number(number)) => number
            .as_f64()
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("{number} is out of range"))),
        Some(Scalar::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Scalar::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("{text:?} is not a number of minutes"))),
    }
}
