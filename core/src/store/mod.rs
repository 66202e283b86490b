//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! The engine hands it events and snapshots; it never runs SQL itself.

use crate::{
    error::{SimError, SimResult},
    event::EventLogEntry,
    snapshot::SaveSnapshot,
    types::Tick,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

pub struct SimStore {
    conn: Connection,
}

impl SimStore {
    pub fn open(path: &str) -> SimResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (:memory: ignores it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> SimResult<Self> {
        let conn = Connection::open(":memory:")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> SimResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(&self, run_id: &str, seed: u64, version: &str) -> SimResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO run (run_id, seed, version, started_at) VALUES (?1, ?2, ?3, ?4)",
            params![run_id, seed as i64, version, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn run_seed(&self, run_id: &str) -> SimResult<Option<u64>> {
        let seed = self
            .conn
            .query_row("SELECT seed FROM run WHERE run_id = ?1", params![run_id], |row| {
                row.get::<_, i64>(0)
            })
            .optional()?;
        Ok(seed.map(|s| s as u64))
    }

    // ── Event log ──────────────────────────────────────────────

    /// Append a batch inside one transaction, stamped with the wall-clock
    /// time of the write.
    pub fn append_events(&mut self, entries: &[EventLogEntry]) -> SimResult<()> {
        let created_at = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO event_log (run_id, tick, subsystem, event_type, payload, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for entry in entries {
                stmt.execute(params![
                    entry.run_id,
                    entry.tick as i64,
                    entry.subsystem,
                    entry.event_type,
                    entry.payload,
                    created_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn events_for_tick(&self, run_id: &str, tick: Tick) -> SimResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, tick, subsystem, event_type, payload
             FROM event_log WHERE run_id = ?1 AND tick = ?2
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![run_id, tick as i64], |row| {
                Ok(EventLogEntry {
                    id: Some(row.get(0)?),
                    run_id: row.get(1)?,
                    tick: row.get::<_, i64>(2)? as u64,
                    subsystem: row.get(3)?,
                    event_type: row.get(4)?,
                    payload: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Wall-clock write times of the events journaled for a tick.
    pub fn event_times(&self, run_id: &str, tick: Tick) -> SimResult<Vec<DateTime<Utc>>> {
        let mut stmt = self.conn.prepare(
            "SELECT created_at FROM event_log WHERE run_id = ?1 AND tick = ?2 ORDER BY id ASC",
        )?;
        let raw = stmt
            .query_map(params![run_id, tick as i64], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        raw.iter()
            .map(|s| {
                DateTime::parse_from_rfc3339(s)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| SimError::from(anyhow::anyhow!("bad event_log.created_at '{s}': {e}")))
            })
            .collect()
    }

    pub fn event_count(&self, run_id: &str, event_type: Option<&str>) -> SimResult<i64> {
        let count = match event_type {
            Some(t) => self.conn.query_row(
                "SELECT COUNT(*) FROM event_log WHERE run_id = ?1 AND event_type = ?2",
                params![run_id, t],
                |row| row.get(0),
            )?,
            None => self.conn.query_row(
                "SELECT COUNT(*) FROM event_log WHERE run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )?,
        };
        Ok(count)
    }

    // ── Save slots ─────────────────────────────────────────────

    /// Write a snapshot to a named slot, replacing whatever was there.
    pub fn save_game(&self, slot: &str, snapshot: &SaveSnapshot) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO save_slot (slot, run_id, schema_version, saved_at, snapshot_json)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(slot) DO UPDATE SET
                run_id = excluded.run_id,
                schema_version = excluded.schema_version,
                saved_at = excluded.saved_at,
                snapshot_json = excluded.snapshot_json",
            params![
                slot,
                snapshot.run_id,
                snapshot.schema_version,
                snapshot.saved_at.to_rfc3339(),
                snapshot.to_json()?,
            ],
        )?;
        Ok(())
    }

    pub fn load_game(&self, slot: &str) -> SimResult<Option<SaveSnapshot>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT snapshot_json FROM save_slot WHERE slot = ?1",
                params![slot],
                |row| row.get(0),
            )
            .optional()?;
        json.as_deref().map(SaveSnapshot::from_json).transpose()
    }

    pub fn delete_game(&self, slot: &str) -> SimResult<bool> {
        let n = self.conn.execute("DELETE FROM save_slot WHERE slot = ?1", params![slot])?;
        Ok(n > 0)
    }
}
