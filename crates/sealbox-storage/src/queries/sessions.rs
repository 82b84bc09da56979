// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session queries: handshake state, presence, and delivery checkpoints.
//!
//! One row per `client_id`. Issuing a new challenge replaces the row's
//! pending state, so at most one challenge per client is ever valid.

use sealbox_core::types::{Cursor, Position, Session};
use sealbox_core::{SealboxError, now_ms};

use crate::database::{Database, map_tr_err};

fn json_err(e: serde_json::Error) -> rusqlite::Error {
    rusqlite::Error::ToSqlConversionFailure(Box::new(e))
}

fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<Session> {
    let client_position: Option<String> = row.get(7)?;
    let server_position: Option<String> = row.get(8)?;
    Ok(Session {
        client_id: row.get(0)?,
        permalink: row.get(1)?,
        challenge: row.get(2)?,
        authenticated: row.get::<_, i64>(3)? != 0,
        connected: row.get::<_, i64>(4)? != 0,
        time: row.get(5)?,
        session_token: row.get(6)?,
        client_position: client_position.map(|s| parse_position(&s, 7)).transpose()?,
        server_position: server_position.map(|s| parse_position(&s, 8)).transpose()?,
    })
}

fn parse_position(s: &str, col: usize) -> rusqlite::Result<Position> {
    serde_json::from_str(s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
    })
}

const SESSION_COLUMNS: &str = "client_id, permalink, challenge, authenticated, connected, \
                               time, session_token, client_position, server_position";

/// Record a freshly issued challenge for a client.
///
/// Upserts on `client_id`: any previous challenge or authenticated
/// state for this client is discarded.
pub async fn put_challenge(
    db: &Database,
    client_id: &str,
    permalink: &str,
    challenge: &str,
) -> Result<(), SealboxError> {
    let client_id = client_id.to_string();
    let permalink = permalink.to_string();
    let challenge = challenge.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO sessions
                     (client_id, permalink, challenge, authenticated, connected, time)
                 VALUES (?1, ?2, ?3, 0, 0, ?4)
                 ON CONFLICT(client_id) DO UPDATE SET
                     permalink = excluded.permalink,
                     challenge = excluded.challenge,
                     authenticated = 0,
                     connected = 0,
                     time = excluded.time,
                     session_token = NULL",
                rusqlite::params![client_id, permalink, challenge, now_ms()],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_session(
    db: &Database,
    client_id: &str,
) -> Result<Option<Session>, SealboxError> {
    let client_id = client_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE client_id = ?1"),
                rusqlite::params![client_id],
                row_to_session,
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
        })
        .await
        .map_err(map_tr_err)
}

/// All sessions for a permalink, most recent first.
pub async fn sessions_by_permalink(
    db: &Database,
    permalink: &str,
) -> Result<Vec<Session>, SealboxError> {
    let permalink = permalink.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE permalink = ?1 ORDER BY time DESC"
            ))?;
            let rows = stmt.query_map(rusqlite::params![permalink], row_to_session)?;
            let mut sessions = Vec::new();
            for row in rows {
                sessions.push(row?);
            }
            Ok(sessions)
        })
        .await
        .map_err(map_tr_err)
}

/// The most recent authenticated, connected session for a permalink.
/// This is the session live push targets.
pub async fn live_session_by_permalink(
    db: &Database,
    permalink: &str,
) -> Result<Option<Session>, SealboxError> {
    let permalink = permalink.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions
                     WHERE permalink = ?1 AND authenticated = 1 AND connected = 1
                     ORDER BY time DESC LIMIT 1"
                ),
                rusqlite::params![permalink],
                row_to_session,
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Promote a session to authenticated after a verified challenge
/// response. Clears the challenge so it cannot be replayed, stores the
/// issued bearer token, and records the client's reported position.
pub async fn authenticate_session(
    db: &Database,
    client_id: &str,
    session_token: &str,
    client_position: Option<&Position>,
) -> Result<Session, SealboxError> {
    let target = format!("session {client_id}");
    let client_id = client_id.to_string();
    let session_token = session_token.to_string();
    let position_json = client_position
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| SealboxError::Internal(e.to_string()))?;
    let session = db
        .connection()
        .call(move |conn| {
            let affected = conn.execute(
                "UPDATE sessions SET
                     authenticated = 1,
                     connected = 1,
                     challenge = NULL,
                     session_token = ?1,
                     client_position = COALESCE(?2, client_position),
                     time = ?3
                 WHERE client_id = ?4",
                rusqlite::params![session_token, position_json, now_ms(), client_id],
            )?;
            if affected == 0 {
                return Ok(None);
            }
            conn.query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE client_id = ?1"),
                rusqlite::params![client_id],
                row_to_session,
            )
            .map(Some)
        })
        .await
        .map_err(map_tr_err)?;
    session.ok_or(SealboxError::NotFound(target))
}

/// Flip the connected flag for a client. Returns the updated session,
/// or None when the client has no session row.
pub async fn update_presence(
    db: &Database,
    client_id: &str,
    connected: bool,
) -> Result<Option<Session>, SealboxError> {
    let client_id = client_id.to_string();
    db.connection()
        .call(move |conn| {
            let affected = conn.execute(
                "UPDATE sessions SET connected = ?1, time = ?2 WHERE client_id = ?3",
                rusqlite::params![connected as i64, now_ms(), client_id],
            )?;
            if affected == 0 {
                return Ok(None);
            }
            conn.query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE client_id = ?1"),
                rusqlite::params![client_id],
                row_to_session,
            )
            .map(Some)
        })
        .await
        .map_err(map_tr_err)
}

/// Advance the server-side sent checkpoint for a client's session.
///
/// Monotonic: returns false without writing when the stored cursor is
/// at or past `cursor.time`. Errs NotFound when the session is missing.
pub async fn advance_sent_checkpoint(
    db: &Database,
    client_id: &str,
    cursor: Cursor,
) -> Result<bool, SealboxError> {
    let target = format!("session {client_id}");
    let client_id = client_id.to_string();
    let advanced: Option<bool> = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let stored: Option<Option<String>> = tx
                .query_row(
                    "SELECT server_position FROM sessions WHERE client_id = ?1",
                    rusqlite::params![client_id],
                    |row| row.get(0),
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            let Some(stored) = stored else {
                return Ok(None);
            };
            let mut position = stored
                .map(|s| parse_position(&s, 0))
                .transpose()?
                .unwrap_or_default();
            if let Some(sent) = &position.sent {
                if sent.time >= cursor.time {
                    return Ok(Some(false));
                }
            }
            position.sent = Some(cursor);
            let json = serde_json::to_string(&position).map_err(json_err)?;
            tx.execute(
                "UPDATE sessions SET server_position = ?1 WHERE client_id = ?2",
                rusqlite::params![json, client_id],
            )?;
            tx.commit()?;
            Ok(Some(true))
        })
        .await
        .map_err(map_tr_err)?;
    advanced.ok_or(SealboxError::NotFound(target))
}

/// Remove all sessions for a permalink. Returns how many were deleted.
pub async fn delete_sessions_by_permalink(
    db: &Database,
    permalink: &str,
) -> Result<usize, SealboxError> {
    let permalink = permalink.to_string();
    db.connection()
        .call(move |conn| {
            let affected = conn.execute(
                "DELETE FROM sessions WHERE permalink = ?1",
                rusqlite::params![permalink],
            )?;
            Ok(affected)
        })
        .await
        .map_err(map_tr_err)
}

/// Crash recovery: no socket survives a restart, so every session
/// still flagged connected is stale. Returns how many were cleared.
pub async fn mark_all_disconnected(db: &Database) -> Result<usize, SealboxError> {
    db.connection()
        .call(|conn| {
            let affected = conn.execute("UPDATE sessions SET connected = 0 WHERE connected = 1", [])?;
            Ok(affected)
        })
        .await
        .map_err(map_tr_err)
}
