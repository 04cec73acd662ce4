//! SQLite event log and skill record store

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::core::event::{Event, EventKind};
use crate::core::record::SkillRecord;
use crate::error::{ForgeError, Result};
use crate::events::EventSink;
use crate::storage::{SkillStore, migrations};

const SKILL_COLUMNS: &str = "id, name, topic, category, description, content, content_hash, \
     validation_passed, sources_count, attempts, created_at";

/// Aggregate figures over every stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForgeStats {
    pub total: u64,
    pub today: u64,
    pub validated: u64,
    /// Percentage of records that passed validation.
    pub success_rate: f64,
    pub topics: Vec<String>,
}

/// SQLite database shared across pipeline threads.
pub struct Database {
    conn: Mutex<Connection>,
    schema_version: u32,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("schema_version", &self.schema_version)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Open database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        Self::configure_pragmas(&conn)?;
        let schema_version = migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            schema_version,
        })
    }

    /// Current schema version after migrations.
    pub const fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// `PRAGMA integrity_check` reports `ok`.
    pub fn integrity_check(&self) -> Result<bool> {
        let result: String = self
            .conn
            .lock()
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    }

    pub fn insert_event(&self, event: &Event) -> Result<()> {
        let metadata = serde_json::to_string(&event.metadata)?;
        self.conn.lock().execute(
            "INSERT INTO events (id, kind, topic, skill_name, message, metadata_json, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.id,
                event.kind.as_str(),
                event.topic,
                event.skill_name,
                event.message,
                metadata,
                timestamp(&event.created_at),
            ],
        )?;
        Ok(())
    }

    /// Most recent events first, optionally for one topic.
    pub fn list_events(&self, topic: Option<&str>, limit: usize) -> Result<Vec<Event>> {
        let conn = self.conn.lock();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = conn.prepare(
            "SELECT id, kind, topic, skill_name, message, metadata_json, created_at \
             FROM events WHERE (?1 IS NULL OR topic = ?1) \
             ORDER BY created_at DESC, rowid DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![topic, limit], raw_event_from_row)?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?.into_event()?);
        }
        Ok(events)
    }

    pub fn insert_skill(&self, record: &SkillRecord) -> Result<()> {
        self.conn.lock().execute(
            "INSERT INTO skills (id, name, topic, category, description, content, content_hash, \
             validation_passed, sources_count, attempts, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                record.id,
                record.name,
                record.topic,
                record.category,
                record.description,
                record.content,
                record.content_hash,
                record.validation_passed,
                i64::try_from(record.sources_count).unwrap_or(i64::MAX),
                i64::try_from(record.attempts).unwrap_or(i64::MAX),
                timestamp(&record.created_at),
            ],
        )?;
        Ok(())
    }

    /// Latest record per skill name, newest first.
    pub fn latest_skills(&self, limit: usize) -> Result<Vec<SkillRecord>> {
        let conn = self.conn.lock();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = conn.prepare(&format!(
            "SELECT {SKILL_COLUMNS} FROM skills s \
             WHERE s.rowid = (SELECT MAX(rowid) FROM skills WHERE name = s.name) \
             ORDER BY created_at DESC, rowid DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit], skill_from_row)?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// Latest record stored under `name`.
    pub fn get_skill(&self, name: &str) -> Result<Option<SkillRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SKILL_COLUMNS} FROM skills WHERE name = ?1 ORDER BY rowid DESC LIMIT 1"
        ))?;
        let mut rows = stmt.query([name])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(skill_from_row(row)?));
        }
        Ok(None)
    }

    /// Every record created at or after `since`, oldest first.
    pub fn skills_since(&self, since: DateTime<Utc>) -> Result<Vec<SkillRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SKILL_COLUMNS} FROM skills WHERE created_at >= ?1 ORDER BY created_at, rowid"
        ))?;
        let rows = stmt.query_map([timestamp(&since)], skill_from_row)?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    pub fn stats(&self, now: DateTime<Utc>) -> Result<ForgeStats> {
        let conn = self.conn.lock();
        let (total, validated): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(validation_passed), 0) FROM skills",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let today: i64 = conn.query_row(
            "SELECT COUNT(*) FROM skills WHERE created_at >= ?1",
            [timestamp(&start_of_day(now))],
            |row| row.get(0),
        )?;
        let mut stmt = conn.prepare("SELECT DISTINCT topic FROM skills ORDER BY topic")?;
        let topics = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let total = u64::try_from(total).unwrap_or(0);
        let validated = u64::try_from(validated).unwrap_or(0);
        #[allow(clippy::cast_precision_loss)]
        let success_rate = if total == 0 {
            0.0
        } else {
            validated as f64 / total as f64 * 100.0
        };
        Ok(ForgeStats {
            total,
            today: u64::try_from(today).unwrap_or(0),
            validated,
            success_rate,
            topics,
        })
    }

    fn configure_pragmas(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;",
        )?;
        Ok(())
    }
}

impl EventSink for Database {
    fn append(&self, event: &Event) -> Result<()> {
        self.insert_event(event)
    }
}

impl SkillStore for Database {
    fn put(&self, record: &SkillRecord) -> Result<()> {
        self.insert_skill(record)
    }
}

/// UTC midnight of the day containing `now`.
#[must_use]
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map_or(now, |midnight| midnight.and_utc())
}

fn timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| ForgeError::Store(format!("invalid timestamp {value}: {err}")))
}

struct RawEvent {
    id: String,
    kind: String,
    topic: String,
    skill_name: Option<String>,
    message: String,
    metadata_json: String,
    created_at: String,
}

impl RawEvent {
    fn into_event(self) -> Result<Event> {
        let metadata: Map<String, JsonValue> = serde_json::from_str(&self.metadata_json)?;
        Ok(Event {
            id: self.id,
            kind: self.kind.parse::<EventKind>()?,
            topic: self.topic,
            skill_name: self.skill_name,
            message: self.message,
            metadata,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

fn raw_event_from_row(row: &Row<'_>) -> rusqlite::Result<RawEvent> {
    Ok(RawEvent {
        id: row.get(0)?,
        kind: row.get(1)?,
        topic: row.get(2)?,
        skill_name: row.get(3)?,
        message: row.get(4)?,
        metadata_json: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn skill_from_row(row: &Row<'_>) -> rusqlite::Result<SkillRecord> {
    let created_at: String = row.get(10)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(10, rusqlite::types::Type::Text, Box::new(err))
        })?;
    Ok(SkillRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        topic: row.get(2)?,
        category: row.get(3)?,
        description: row.get(4)?,
        content: row.get(5)?,
        content_hash: row.get(6)?,
        validation_passed: row.get(7)?,
        sources_count: usize::try_from(row.get::<_, i64>(8)?).unwrap_or(0),
        attempts: usize::try_from(row.get::<_, i64>(9)?).unwrap_or(0),
        created_at,
    })
}
