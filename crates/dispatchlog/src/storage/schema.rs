//! `SQLite` schema definitions for dispatchlog.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the instructions table.
///
/// `timestamp` holds RFC 3339 UTC text with a fixed precision so that
/// lexical order matches chronological order.
pub const CREATE_INSTRUCTIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS instructions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    employee_number TEXT,
    route TEXT NOT NULL CHECK (length(route) > 0),
    running_number TEXT NOT NULL CHECK (length(running_number) > 0),
    headway_deviation REAL,
    early_late TEXT,
    communication_type TEXT,
    instruction TEXT NOT NULL CHECK (length(instruction) > 0),
    timestamp TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT
)
";

/// SQL statement to create an index on timestamp for the time-ordered listing.
pub const CREATE_TIMESTAMP_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_instructions_timestamp ON instructions(timestamp DESC)
";

/// SQL statement to create an index on `employee_number` for per-driver lookups.
pub const CREATE_EMPLOYEE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_instructions_employee ON instructions(employee_number)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_INSTRUCTIONS_TABLE,
    CREATE_TIMESTAMP_INDEX,
    CREATE_EMPLOYEE_INDEX,
    CREATE_METADATA_TABLE,
];
