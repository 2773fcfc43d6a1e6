//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use chrono::TimeZone;
use clap::{Args, Subcommand, ValueEnum};

use crate::dates::parse_datetime;
use crate::error::{Error, Result};
use crate::record::{CommunicationType, InstructionUpdate, RecordId};
use crate::storage::RecordStore;

/// Add command arguments.
#[derive(Debug, Args)]
pub struct AddCommand {
    /// Route the vehicle is running
    #[arg(short, long)]
    pub route: String,

    /// Running number of the trip
    #[arg(short = 'n', long)]
    pub run: String,

    /// The instruction given
    #[arg(short, long)]
    pub instruction: String,

    /// Employee number of the driver (omit for an information entry)
    #[arg(short, long)]
    pub employee: Option<String>,

    /// Minutes too close to the leading vehicle
    #[arg(long, value_name = "MINUTES", allow_negative_numbers = true)]
    pub headway: Option<f64>,

    /// Early/late value, e.g. "3 min late" or "-2"
    #[arg(long, allow_hyphen_values = true)]
    pub early_late: Option<String>,

    /// How the instruction was delivered
    #[arg(long, value_enum)]
    pub comm: Option<CommunicationTypeArg>,

    /// When the instruction was given (defaults to now)
    #[arg(long, value_name = "TIME")]
    pub at: Option<String>,
}

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Case-insensitive text to match against employee, route, run, headway and early/late
    #[arg(short, long)]
    pub search: Option<String>,

    /// Only instructions on this date (YYYY-MM-DD, today, yesterday)
    #[arg(short, long)]
    pub date: Option<String>,

    /// Only instructions for this employee number
    #[arg(short, long)]
    pub employee: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Edit command arguments.
#[derive(Debug, Args)]
pub struct EditCommand {
    /// Id of the instruction to change
    pub id: i64,

    /// New employee number
    #[arg(short, long, conflicts_with = "clear_employee")]
    pub employee: Option<String>,

    /// Turn the instruction into an information entry
    #[arg(long)]
    pub clear_employee: bool,

    /// New time for the instruction
    #[arg(long, value_name = "TIME")]
    pub at: Option<String>,
}

impl EditCommand {
    /// The update these flags describe, with `--at` read in `tz`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if no change was requested or `--at`
    /// does not parse.
    pub fn to_update<Tz: TimeZone>(&self, tz: &Tz) -> Result<InstructionUpdate> {
        let mut update = InstructionUpdate::default();
        if self.clear_employee {
            update = update.employee(None);
        } else if self.employee.is_some() {
            update = update.employee(self.employee.clone());
        }
        if let Some(at) = &self.at {
            update = update.timestamp(parse_datetime(at, tz)?)?;
        }
        if update.is_empty() {
            return Err(Error::invalid_input(
                "nothing to change: pass --employee, --clear-employee or --at",
            ));
        }
        Ok(update)
    }
}

/// Delete command arguments.
#[derive(Debug, Args)]
pub struct DeleteCommand {
    /// Id of the instruction to delete
    pub id: i64,

    /// Confirm the deletion
    #[arg(short, long)]
    pub yes: bool,
}

impl DeleteCommand {
    /// Delete the record if `--yes` was given. Returns whether it was deleted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordNotFound`] if a confirmed delete names no record.
    pub fn execute<S: RecordStore>(&self, store: &S) -> Result<bool> {
        if !self.yes {
            return Ok(false);
        }
        store.delete(RecordId(self.id))?;
        Ok(true)
    }
}

/// Report commands.
#[derive(Debug, Subcommand)]
pub enum ReportCommand {
    /// Every instruction given on one day
    Daily {
        /// Report date (YYYY-MM-DD, today, yesterday; defaults to today)
        #[arg(short, long)]
        date: Option<String>,

        /// Write the report to this file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Instructions given to one driver on one day
    Employee {
        /// Employee number of the driver
        employee: String,

        /// Report date (YYYY-MM-DD, today, yesterday; defaults to today)
        #[arg(short, long)]
        date: Option<String>,

        /// Write the report to this file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

/// Stats command arguments.
#[derive(Debug, Args)]
pub struct StatsCommand {
    /// Count instructions on this date (defaults to today)
    #[arg(short, long)]
    pub date: Option<String>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Import command arguments.
#[derive(Debug, Args)]
pub struct ImportCommand {
    /// JSON file holding one instruction or an array of them
    pub file: PathBuf,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Communication type argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CommunicationTypeArg {
    /// Sent as a text message
    MessageSent,
    /// Given over the radio
    RadioCall,
    /// Logged for information only
    Information,
}

impl From<CommunicationTypeArg> for CommunicationType {
    fn from(arg: CommunicationTypeArg) -> Self {
        match arg {
            CommunicationTypeArg::MessageSent => Self::MessageSent,
            CommunicationTypeArg::RadioCall => Self::RadioCall,
            CommunicationTypeArg::Information => Self::Information,
        }
    }
}

/// Output format for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// One instruction per line
    Plain,
    /// Aligned columns
    #[default]
    Table,
    /// JSON array
    Json,
}
