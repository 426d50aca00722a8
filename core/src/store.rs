//! SQLite mirror of generated records.
//!
//! RULE: Only store.rs talks to the database.
//!
//! Timestamps are stored as i64 nanoseconds since the Unix epoch in UTC, so
//! an inclusive range scope is a plain `BETWEEN` over an indexed column.
//! The store implements `ScopeBackend`; the harness checks its answers
//! against the in-memory `filter`.

use crate::{
    calendar::CalendarRange,
    error::{HarnessError, HarnessResult},
    scope::ScopeBackend,
    types::{AttrValue, Instant, Record, RecordId},
};
use rusqlite::{params, Connection};

pub struct RecordStore {
    conn: Connection,
}

impl RecordStore {
    /// Open (or create) the mirror database at `path`.
    pub fn open(path: &str) -> HarnessResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> HarnessResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> HarnessResult<()> {
        self.conn.execute_batch(include_str!("../../migrations/001_records.sql"))?;
        Ok(())
    }

    // ── Records ───────────────────────────────────────────────

    pub fn insert_records(&self, records: &[Record]) -> HarnessResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        for record in records {
            tx.execute(
                "INSERT INTO record (record_id, kind, attributes) VALUES (?1, ?2, ?3)",
                params![
                    record.id().to_string(),
                    record.kind(),
                    serde_json::to_string(record.attributes())?,
                ],
            )?;
            for (attribute, value) in record.attributes() {
                if let AttrValue::Timestamp(at) = value {
                    tx.execute(
                        "INSERT INTO record_timestamp (record_id, attribute, at_nanos)
                         VALUES (?1, ?2, ?3)",
                        params![record.id().to_string(), attribute, to_nanos(*at)?],
                    )?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Ids of records whose `attribute` lies in `[range.start, range.end]`,
    /// in insertion order.
    pub fn records_in_range(
        &self,
        attribute: &str,
        range: &CalendarRange,
    ) -> HarnessResult<Vec<RecordId>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.record_id
             FROM record_timestamp t JOIN record r ON r.record_id = t.record_id
             WHERE t.attribute = ?1 AND t.at_nanos BETWEEN ?2 AND ?3
             ORDER BY r.seq ASC",
        )?;
        let ids = stmt
            .query_map(
                params![attribute, to_nanos(range.start())?, to_nanos(range.end())?],
                |row| row.get::<_, String>(0),
            )?
            .collect::<Result<Vec<_>, _>>()?;
        ids.iter().map(|id| RecordId::parse(id)).collect()
    }

    pub fn record_count(&self) -> HarnessResult<i64> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM record", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn delete_all(&self) -> HarnessResult<()> {
        self.conn.execute_batch("DELETE FROM record_timestamp; DELETE FROM record;")?;
        Ok(())
    }
}

impl ScopeBackend for RecordStore {
    fn name(&self) -> &'static str { "sqlite" }

    fn insert(&mut self, records: &[Record]) -> HarnessResult<()> {
        self.insert_records(records)
    }

    fn query(&self, attribute: &str, range: &CalendarRange) -> HarnessResult<Vec<RecordId>> {
        self.records_in_range(attribute, range)
    }

    fn clear(&mut self) -> HarnessResult<()> {
        self.delete_all()
    }
}

fn to_nanos(at: Instant) -> HarnessResult<i64> {
    at.timestamp_nanos_opt().ok_or(HarnessError::TimestampOutOfRange { at })
}
