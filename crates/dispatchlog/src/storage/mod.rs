//! Storage layer for dispatchlog.
//!
//! This module provides `SQLite`-based persistent storage for instruction
//! records behind the [`RecordStore`] trait. Rows are mapped to the canonical
//! [`InstructionRecord`] here and nowhere else.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::record::{InstructionRecord, InstructionUpdate, NewInstruction, RecordId};

/// The four operations dispatchlog needs from a record store.
pub trait RecordStore {
    /// Persist a new record and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    fn create(&self, new: &NewInstruction) -> Result<InstructionRecord>;

    /// Every record, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the records cannot be read or a stored row is
    /// malformed.
    fn list_all(&self) -> Result<Vec<InstructionRecord>>;

    /// Apply an edit to the employee number and/or timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordNotFound`] if no record has this id.
    fn update(&self, id: RecordId, update: &InstructionUpdate) -> Result<InstructionRecord>;

    /// Permanently remove a record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordNotFound`] if no record has this id.
    fn delete(&self, id: RecordId) -> Result<()>;
}

const SELECT_COLUMNS: &str = r"
    SELECT id, employee_number, route, running_number, headway_deviation,
           early_late, communication_type, instruction, timestamp
    FROM instructions
";

/// `SQLite` storage engine for instruction records.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get a record by its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or the row is malformed.
    pub fn get(&self, id: RecordId) -> Result<Option<InstructionRecord>> {
        let row = self
            .conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                [id.0],
                StoredRow::from_row,
            )
            .optional()?;
        row.map(StoredRow::into_record).transpose()
    }

    /// Count total records in storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM instructions", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or a stored
    /// timestamp is malformed.
    pub fn stats(&self) -> Result<StorageStats> {
        let total_records = self.count()?;

        let bound = |order: &str| -> Result<Option<DateTime<Utc>>> {
            let row: Option<(i64, String)> = self
                .conn
                .query_row(
                    &format!("SELECT id, timestamp FROM instructions ORDER BY timestamp {order} LIMIT 1"),
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            row.map(|(id, value)| {
                parse_timestamp(&value).ok_or(Error::MalformedTimestamp {
                    id: RecordId(id),
                    value,
                })
            })
            .transpose()
        };

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_records,
            oldest_record: bound("ASC")?,
            newest_record: bound("DESC")?,
            db_size_bytes,
        })
    }
}

impl RecordStore for Storage {
    fn create(&self, new: &NewInstruction) -> Result<InstructionRecord> {
        self.conn.execute(
            r"
            INSERT INTO instructions (
                employee_number, route, running_number, headway_deviation,
                early_late, communication_type, instruction, timestamp
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
            params![
                new.employee_number,
                new.route,
                new.running_number,
                new.headway_deviation,
                new.early_late,
                new.communication_type.map(|c| c.as_str()),
                new.instruction,
                format_timestamp(new.timestamp),
            ],
        )?;

        let id = RecordId(self.conn.last_insert_rowid());
        debug!("Inserted instruction with id {}", id);

        Ok(InstructionRecord {
            id,
            employee_number: new.employee_number.clone(),
            route: new.route.clone(),
            running_number: new.running_number.clone(),
            headway_deviation: new.headway_deviation,
            early_late: new.early_late.clone(),
            communication_type: new.communication_type,
            instruction: new.instruction.clone(),
            timestamp: new.timestamp,
        })
    }

    fn list_all(&self) -> Result<Vec<InstructionRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_COLUMNS} ORDER BY timestamp DESC, id DESC"))?;

        let rows = stmt
            .query_map([], StoredRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(StoredRow::into_record).collect()
    }

    fn update(&self, id: RecordId, update: &InstructionUpdate) -> Result<InstructionRecord> {
        if update.is_empty() {
            debug!("Empty update for instruction {}", id);
            return self.get(id)?.ok_or(Error::RecordNotFound { id });
        }

        let (set_employee, employee) = match &update.employee_number {
            Some(value) => (true, value.clone()),
            None => (false, None),
        };

        let affected = self.conn.execute(
            r"
            UPDATE instructions SET
                employee_number = CASE WHEN ?1 THEN ?2 ELSE employee_number END,
                timestamp = COALESCE(?3, timestamp),
                updated_at = ?4
            WHERE id = ?5
            ",
            params![
                set_employee,
                employee,
                update.timestamp.map(format_timestamp),
                format_timestamp(Utc::now()),
                id.0,
            ],
        )?;

        if affected == 0 {
            return Err(Error::RecordNotFound { id });
        }
        info!("Updated instruction {}", id);

        self.get(id)?.ok_or(Error::RecordNotFound { id })
    }

    fn delete(&self, id: RecordId) -> Result<()> {
        let affected = self
            .conn
            .execute("DELETE FROM instructions WHERE id = ?1", [id.0])?;
        if affected == 0 {
            return Err(Error::RecordNotFound { id });
        }
        info!("Deleted instruction {}", id);
        Ok(())
    }
}

/// A row as stored, before its text columns are interpreted.
struct StoredRow {
    id: i64,
    employee_number: Option<String>,
    route: String,
    running_number: String,
    headway_deviation: Option<f64>,
    early_late: Option<String>,
    communication_type: Option<String>,
    instruction: String,
    timestamp: String,
}

impl StoredRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            employee_number: row.get(1)?,
            route: row.get(2)?,
            running_number: row.get(3)?,
            headway_deviation: row.get(4)?,
            early_late: row.get(5)?,
            communication_type: row.get(6)?,
            instruction: row.get(7)?,
            timestamp: row.get(8)?,
        })
    }

    fn into_record(self) -> Result<InstructionRecord> {
        let id = RecordId(self.id);

        let timestamp = parse_timestamp(&self.timestamp).ok_or(Error::MalformedTimestamp {
            id,
            value: self.timestamp,
        })?;

        let communication_type = self.communication_type.and_then(|raw| {
            raw.parse()
                .map_err(|_| {
                    warn!(
                        "Unknown communication type {:?} on instruction {}, ignoring",
                        raw, id
                    );
                })
                .ok()
        });

        Ok(InstructionRecord {
            id,
            employee_number: self.employee_number,
            route: self.route,
            running_number: self.running_number,
            headway_deviation: self.headway_deviation,
            early_late: self.early_late,
            communication_type,
            instruction: self.instruction,
            timestamp,
        })
    }
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Total number of records stored.
    pub total_records: i64,
    /// Timestamp of the oldest record.
    pub oldest_record: Option<DateTime<Utc>>,
    /// Timestamp of the newest record.
    pub newest_record: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Timelike};

    use super::*;
    use crate::logging::init_test_logging;
    use crate::record::CommunicationType;

    fn create_test_storage() -> Storage {
        init_test_logging();
        Storage::open_in_memory().expect("failed to create test storage")
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 5, hour, minute, 0).unwrap()
    }

    fn new_instruction(run: &str, timestamp: DateTime<Utc>) -> NewInstruction {
        NewInstruction::new("12", run, "Hold at stop for 2 minutes")
            .unwrap()
            .at(timestamp)
            .unwrap()
    }

    #[test]
    fn test_open_in_memory() {
        assert!(Storage::open_in_memory().is_ok());
    }

    #[test]
    fn test_create_and_get() {
        let storage = create_test_storage();
        let new = new_instruction("A1", at(8, 0))
            .with_employee(Some("E100".to_string()))
            .with_headway_deviation(Some(2.5))
            .unwrap()
            .with_early_late(Some("3 min early".to_string()))
            .with_communication_type(Some(CommunicationType::RadioCall));

        let created = storage.create(&new).unwrap();
        let fetched = storage.get(created.id).unwrap().unwrap();

        assert_eq!(fetched, created);
        assert_eq!(fetched.employee_number.as_deref(), Some("E100"));
        assert_eq!(fetched.headway_deviation, Some(2.5));
        assert_eq!(fetched.communication_type, Some(CommunicationType::RadioCall));
        assert_eq!(fetched.timestamp, at(8, 0));
    }

    #[test]
    fn test_create_returns_what_is_read_back() {
        let storage = create_test_storage();
        let precise = at(8, 0).with_nanosecond(123_456_789).unwrap();

        let created = storage.create(&new_instruction("A1", precise)).unwrap();
        let fetched = storage.get(created.id).unwrap().unwrap();
        assert_eq!(created, fetched);
        assert_eq!(created, storage.list_all().unwrap()[0]);

        let unstamped = NewInstruction::new("12", "A2", "Hold").unwrap();
        let created = storage.create(&unstamped).unwrap();
        assert_eq!(Some(created.clone()), storage.get(created.id).unwrap());
    }

    #[test]
    fn test_update_timestamp_round_trips_exactly() {
        let storage = create_test_storage();
        let created = storage.create(&new_instruction("A1", at(8, 0))).unwrap();
        let precise = at(9, 15).with_nanosecond(987_654_321).unwrap();

        let update = InstructionUpdate::default().timestamp(precise).unwrap();
        let updated = storage.update(created.id, &update).unwrap();
        assert_eq!(updated.timestamp.timestamp_subsec_millis(), 987);
        assert_eq!(Some(updated.clone()), storage.get(created.id).unwrap());
    }

    #[test]
    fn test_create_assigns_distinct_ids() {
        let storage = create_test_storage();
        let a = storage.create(&new_instruction("A1", at(8, 0))).unwrap();
        let b = storage.create(&new_instruction("A1", at(8, 0))).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(storage.count().unwrap(), 2);
    }

    #[test]
    fn test_get_nonexistent() {
        let storage = create_test_storage();
        assert!(storage.get(RecordId(99_999)).unwrap().is_none());
    }

    #[test]
    fn test_list_all_newest_first() {
        let storage = create_test_storage();
        storage.create(&new_instruction("A1", at(8, 0))).unwrap();
        storage.create(&new_instruction("A3", at(9, 15))).unwrap();
        storage.create(&new_instruction("A2", at(8, 30))).unwrap();

        let runs: Vec<String> = storage
            .list_all()
            .unwrap()
            .into_iter()
            .map(|r| r.running_number)
            .collect();
        assert_eq!(runs, ["A3", "A2", "A1"]);
    }

    #[test]
    fn test_list_all_ties_newest_id_first() {
        let storage = create_test_storage();
        let first = storage.create(&new_instruction("A1", at(8, 0))).unwrap();
        let second = storage.create(&new_instruction("A2", at(8, 0))).unwrap();

        let ids: Vec<RecordId> = storage.list_all().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, [second.id, first.id]);
    }

    #[test]
    fn test_update_employee_only() {
        let storage = create_test_storage();
        let created = storage.create(&new_instruction("A1", at(8, 0))).unwrap();

        let update = InstructionUpdate::default().employee(Some("E200".to_string()));
        let updated = storage.update(created.id, &update).unwrap();

        assert_eq!(updated.employee_number.as_deref(), Some("E200"));
        assert_eq!(updated.timestamp, created.timestamp);
        assert_eq!(updated.route, created.route);
        assert_eq!(updated.instruction, created.instruction);
    }

    #[test]
    fn test_update_clears_employee() {
        let storage = create_test_storage();
        let created = storage
            .create(&new_instruction("A1", at(8, 0)).with_employee(Some("E100".to_string())))
            .unwrap();

        let update = InstructionUpdate::default().employee(None);
        let updated = storage.update(created.id, &update).unwrap();
        assert!(updated.employee_number.is_none());
    }

    #[test]
    fn test_update_timestamp_only_keeps_employee() {
        let storage = create_test_storage();
        let created = storage
            .create(&new_instruction("A1", at(8, 0)).with_employee(Some("E100".to_string())))
            .unwrap();

        let update = InstructionUpdate::default().timestamp(at(10, 45)).unwrap();
        let updated = storage.update(created.id, &update).unwrap();

        assert_eq!(updated.timestamp, at(10, 45));
        assert_eq!(updated.employee_number.as_deref(), Some("E100"));
    }

    #[test]
    fn test_update_empty_returns_current() {
        let storage = create_test_storage();
        let created = storage.create(&new_instruction("A1", at(8, 0))).unwrap();
        let same = storage
            .update(created.id, &InstructionUpdate::default())
            .unwrap();
        assert_eq!(same, created);
    }

    #[test]
    fn test_update_nonexistent() {
        let storage = create_test_storage();
        let update = InstructionUpdate::default().employee(Some("E1".to_string()));
        let err = storage.update(RecordId(404), &update).unwrap_err();
        assert!(err.is_not_found());

        let err = storage
            .update(RecordId(404), &InstructionUpdate::default())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_delete() {
        let storage = create_test_storage();
        let created = storage.create(&new_instruction("A1", at(8, 0))).unwrap();

        storage.delete(created.id).unwrap();
        assert!(storage.get(created.id).unwrap().is_none());
        assert_eq!(storage.count().unwrap(), 0);
    }

    #[test]
    fn test_delete_nonexistent() {
        let storage = create_test_storage();
        assert!(storage.delete(RecordId(99_999)).unwrap_err().is_not_found());
    }

    #[test]
    fn test_malformed_timestamp_fails_fast() {
        let storage = create_test_storage();
        let created = storage.create(&new_instruction("A1", at(8, 0))).unwrap();
        storage
            .conn
            .execute(
                "UPDATE instructions SET timestamp = 'not a time' WHERE id = ?1",
                [created.id.0],
            )
            .unwrap();

        let err = storage.list_all().unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedTimestamp { id, ref value } if id == created.id && value == "not a time"
        ));
    }

    #[test]
    fn test_unknown_communication_type_reads_as_absent() {
        let storage = create_test_storage();
        let created = storage.create(&new_instruction("A1", at(8, 0))).unwrap();
        storage
            .conn
            .execute(
                "UPDATE instructions SET communication_type = 'Telegram' WHERE id = ?1",
                [created.id.0],
            )
            .unwrap();

        let fetched = storage.get(created.id).unwrap().unwrap();
        assert!(fetched.communication_type.is_none());
    }

    #[test]
    fn test_stats_empty() {
        let storage = create_test_storage();
        let stats = storage.stats().unwrap();

        assert_eq!(stats.total_records, 0);
        assert!(stats.oldest_record.is_none());
        assert!(stats.newest_record.is_none());
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[test]
    fn test_stats_with_data() {
        let storage = create_test_storage();
        storage.create(&new_instruction("A1", at(8, 0))).unwrap();
        storage.create(&new_instruction("A2", at(17, 30))).unwrap();

        let stats = storage.stats().unwrap();
        assert_eq!(stats.total_records, 2);
        assert_eq!(stats.oldest_record, Some(at(8, 0)));
        assert_eq!(stats.newest_record, Some(at(17, 30)));
    }

    #[test]
    fn test_unicode_instruction() {
        let storage = create_test_storage();
        let new = NewInstruction::new("12", "A1", "Attendre à l'arrêt ⏱")
            .unwrap()
            .at(at(8, 0))
            .unwrap();
        let created = storage.create(&new).unwrap();
        let fetched = storage.get(created.id).unwrap().unwrap();
        assert_eq!(fetched.instruction, "Attendre à l'arrêt ⏱");
    }

    #[test]
    fn test_open_file_based_persists() {
        let db_path =
            std::env::temp_dir().join(format!("dispatchlog_test_{}.db", std::process::id()));

        let storage = Storage::open(&db_path).unwrap();
        storage.create(&new_instruction("A1", at(8, 0))).unwrap();
        assert_eq!(storage.path(), db_path);
        assert!(storage.stats().unwrap().db_size_bytes > 0);
        drop(storage);

        let reopened = Storage::open(&db_path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
        drop(reopened);

        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let root = std::env::temp_dir().join(format!("dispatchlog_nested_{}", std::process::id()));
        let nested_path = root.join("nested/instructions.db");
        let _ = std::fs::remove_dir_all(&root);

        let storage = Storage::open(&nested_path).unwrap();
        assert!(nested_path.exists());

        drop(storage);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_storage_stats_clone() {
        let stats = StorageStats {
            total_records: 5,
            oldest_record: None,
            newest_record: None,
            db_size_bytes: 512,
        };
        assert_eq!(stats.clone(), stats);
    }
}
