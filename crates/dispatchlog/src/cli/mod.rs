//! Command-line interface for dispatchlog.
//!
//! This module provides the CLI structure for the `dlog` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AddCommand, CommunicationTypeArg, ConfigCommand, DeleteCommand, EditCommand, ImportCommand,
    ListCommand, OutputFormat, ReportCommand, StatsCommand, StatusCommand,
};

use crate::logging::Verbosity;

/// dlog - Log the instructions dispatchers give to drivers
///
/// Records every instruction with route, running number and schedule
/// context, and prints the daily and per-driver summaries handed over at
/// the end of a shift.
#[derive(Debug, Parser)]
#[command(name = "dlog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log a new instruction
    Add(AddCommand),

    /// List logged instructions, newest first
    List(ListCommand),

    /// Change the employee number or time of an instruction
    Edit(EditCommand),

    /// Delete an instruction
    Delete(DeleteCommand),

    /// Print a daily or per-driver summary
    #[command(subcommand)]
    Report(ReportCommand),

    /// Show the most-instructed drivers
    Stats(StatsCommand),

    /// List the distinct employee numbers on record
    Employees,

    /// Import instructions from a JSON file
    Import(ImportCommand),

    /// Show database status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }
}
