//! `dispatchlog` - a record of the instructions transit dispatchers give to drivers
//!
//! This library stores instruction records in SQLite, filters them for
//! display, exchanges them as JSON and renders the daily and per-driver
//! plain-text reports dispatchers hand over at the end of a shift.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod dates;
pub mod error;
pub mod logging;
pub mod record;
pub mod report;
pub mod storage;
pub mod view;
pub mod wire;

pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use record::{
    CommunicationType, InstructionRecord, InstructionUpdate, NewInstruction, RecordId,
    ScheduleAdherence,
};
pub use report::{generate_daily_summary, generate_employee_daily_summary, Reporter, Summary};
pub use storage::{RecordStore, Storage, StorageStats};
