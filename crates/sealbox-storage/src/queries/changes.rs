// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Change log and replication cursors.
//!
//! The `changes` table is the durable feed the replicator consumes:
//! append-only, ordered by `seq`, written in the same transaction as
//! the mutation it describes. Cursors record how far each consumer has
//! read.

use sealbox_core::types::{ChangeRecord, ChangeSource};
use sealbox_core::{SealboxError, now_ms};
use std::str::FromStr;

use crate::database::{Database, map_tr_err};

/// Append one change row. Must be called on the same connection (and
/// inside the same transaction) as the mutation being recorded.
pub(crate) fn insert_change(
    conn: &rusqlite::Connection,
    source: ChangeSource,
    old: Option<&serde_json::Value>,
    new: Option<&serde_json::Value>,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO changes (source, old_row, new_row, created_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            source.to_string(),
            old.map(|v| v.to_string()),
            new.map(|v| v.to_string()),
            now_ms(),
        ],
    )?;
    Ok(())
}

fn row_to_change(row: &rusqlite::Row) -> rusqlite::Result<ChangeRecord> {
    let source: String = row.get(1)?;
    let old: Option<String> = row.get(2)?;
    let new: Option<String> = row.get(3)?;
    Ok(ChangeRecord {
        seq: row.get(0)?,
        source: ChangeSource::from_str(&source).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?,
        old: old.map(|s| parse_json(&s, 2)).transpose()?,
        new: new.map(|s| parse_json(&s, 3)).transpose()?,
        created_at: row.get(4)?,
    })
}

fn parse_json(s: &str, col: usize) -> rusqlite::Result<serde_json::Value> {
    serde_json::from_str(s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Fetch up to `limit` change rows with `seq > after_seq`, in seq order.
pub async fn fetch_after(
    db: &Database,
    after_seq: i64,
    limit: i64,
) -> Result<Vec<ChangeRecord>, SealboxError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT seq, source, old_row, new_row, created_at
                 FROM changes WHERE seq > ?1 ORDER BY seq ASC LIMIT ?2",
            )?;
            let rows = stmt.query_map(rusqlite::params![after_seq, limit], row_to_change)?;
            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok(records)
        })
        .await
        .map_err(map_tr_err)
}

/// Last seq a named consumer has fully processed. Zero when the
/// consumer has never run.
pub async fn get_cursor(db: &Database, name: &str) -> Result<i64, SealboxError> {
    use rusqlite::OptionalExtension;

    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            let seq: Option<i64> = conn
                .query_row(
                    "SELECT seq FROM cursors WHERE name = ?1",
                    rusqlite::params![name],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(seq.unwrap_or(0))
        })
        .await
        .map_err(map_tr_err)
}

/// Advance a consumer cursor. Only called after the whole batch up to
/// `seq` has been published.
pub async fn set_cursor(db: &Database, name: &str, seq: i64) -> Result<(), SealboxError> {
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO cursors (name, seq) VALUES (?1, ?2)
                 ON CONFLICT(name) DO UPDATE SET seq = excluded.seq",
                rusqlite::params![name, seq],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
