// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seal queries: ledger anchor records keyed by (payload_link, address).
//!
//! Seal rows are never deleted. State transitions (create, written,
//! confirmations observed) append change rows; pure annotations such as
//! submit errors and requeues do not, since they carry no new anchor
//! state for downstream consumers.

use sealbox_core::types::{ChangeSource, SealRecord};
use sealbox_core::{SealboxError, now_ms};

use crate::database::{Database, is_unique_violation, map_tr_err};
use crate::queries::changes::insert_change;

fn row_to_seal(row: &rusqlite::Row) -> rusqlite::Result<SealRecord> {
    Ok(SealRecord {
        payload_link: row.get(0)?,
        address: row.get(1)?,
        unsealed: row.get::<_, i64>(2)? != 0,
        confirmations: row.get(3)?,
        txid: row.get(4)?,
        write_time: row.get(5)?,
        read_time: row.get(6)?,
        confirm_time: row.get(7)?,
        error_count: row.get(8)?,
        last_error: row.get(9)?,
        created_at: row.get(10)?,
    })
}

const SEAL_COLUMNS: &str = "payload_link, address, unsealed, confirmations, txid, \
                            write_time, read_time, confirm_time, error_count, last_error, \
                            created_at";

fn json_err(e: serde_json::Error) -> rusqlite::Error {
    rusqlite::Error::ToSqlConversionFailure(Box::new(e))
}

fn select_seal(
    conn: &rusqlite::Connection,
    payload_link: &str,
    address: &str,
) -> rusqlite::Result<Option<SealRecord>> {
    conn.query_row(
        &format!("SELECT {SEAL_COLUMNS} FROM seals WHERE payload_link = ?1 AND address = ?2"),
        rusqlite::params![payload_link, address],
        row_to_seal,
    )
    .map(Some)
    .or_else(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        other => Err(other),
    })
}

/// Register intent to anchor a payload. The new row starts unsealed
/// (watch state); a duplicate registration errs with
/// [`SealboxError::Duplicate`].
pub async fn create_seal(
    db: &Database,
    payload_link: &str,
    address: &str,
) -> Result<SealRecord, SealboxError> {
    let payload_link = payload_link.to_string();
    let address = address.to_string();
    let dup_link = payload_link.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let record = SealRecord {
                payload_link: payload_link.clone(),
                address: address.clone(),
                unsealed: true,
                confirmations: 0,
                txid: None,
                write_time: None,
                read_time: None,
                confirm_time: None,
                error_count: 0,
                last_error: None,
                created_at: now_ms(),
            };
            tx.execute(
                "INSERT INTO seals (payload_link, address, unsealed, confirmations, created_at)
                 VALUES (?1, ?2, 1, 0, ?3)",
                rusqlite::params![record.payload_link, record.address, record.created_at],
            )?;
            let new = serde_json::to_value(&record).map_err(json_err)?;
            insert_change(&tx, ChangeSource::Seals, None, Some(&new))?;
            tx.commit()?;
            Ok(record)
        })
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                SealboxError::Duplicate { link: dup_link }
            } else {
                map_tr_err(e)
            }
        })
}

pub async fn get_seal(
    db: &Database,
    payload_link: &str,
    address: &str,
) -> Result<Option<SealRecord>, SealboxError> {
    let payload_link = payload_link.to_string();
    let address = address.to_string();
    db.connection()
        .call(move |conn| select_seal(conn, &payload_link, &address))
        .await
        .map_err(map_tr_err)
}

/// Unsealed records awaiting submission, oldest first.
pub async fn pending(db: &Database, limit: i64) -> Result<Vec<SealRecord>, SealboxError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SEAL_COLUMNS} FROM seals
                 WHERE unsealed = 1 ORDER BY created_at ASC LIMIT ?1"
            ))?;
            let rows = stmt.query_map(rusqlite::params![limit], row_to_seal)?;
            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok(records)
        })
        .await
        .map_err(map_tr_err)
}

/// Record a successful ledger submission: leaves watch state, stores
/// the transaction id, and stamps the write time.
pub async fn mark_written(
    db: &Database,
    payload_link: &str,
    address: &str,
    txid: &str,
) -> Result<SealRecord, SealboxError> {
    let target = format!("seal {payload_link} at {address}");
    let payload_link = payload_link.to_string();
    let address = address.to_string();
    let txid = txid.to_string();
    let record = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let Some(old) = select_seal(&tx, &payload_link, &address)? else {
                return Ok(None);
            };
            let mut new = old.clone();
            new.unsealed = false;
            new.txid = Some(txid.clone());
            new.write_time = Some(now_ms());
            tx.execute(
                "UPDATE seals SET unsealed = 0, txid = ?1, write_time = ?2
                 WHERE payload_link = ?3 AND address = ?4",
                rusqlite::params![new.txid, new.write_time, payload_link, address],
            )?;
            let old_json = serde_json::to_value(&old).map_err(json_err)?;
            let new_json = serde_json::to_value(&new).map_err(json_err)?;
            insert_change(&tx, ChangeSource::Seals, Some(&old_json), Some(&new_json))?;
            tx.commit()?;
            Ok(Some(new))
        })
        .await
        .map_err(map_tr_err)?;
    record.ok_or(SealboxError::NotFound(target))
}

/// Annotate a failed submission attempt. The record stays unsealed and
/// eligible for the next sweep.
pub async fn record_submit_error(
    db: &Database,
    payload_link: &str,
    address: &str,
    error: &str,
) -> Result<(), SealboxError> {
    let payload_link = payload_link.to_string();
    let address = address.to_string();
    let error = error.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE seals SET error_count = error_count + 1, last_error = ?1
                 WHERE payload_link = ?2 AND address = ?3",
                rusqlite::params![error, payload_link, address],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Submitted records still below the confirmation threshold, oldest
/// write first.
pub async fn unconfirmed(
    db: &Database,
    threshold: i64,
    limit: i64,
) -> Result<Vec<SealRecord>, SealboxError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SEAL_COLUMNS} FROM seals
                 WHERE unsealed = 0 AND txid IS NOT NULL AND confirmations < ?1
                 ORDER BY write_time ASC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(rusqlite::params![threshold, limit], row_to_seal)?;
            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok(records)
        })
        .await
        .map_err(map_tr_err)
}

/// Store an observed confirmation count.
///
/// Idempotent: returns false without writing when nothing changed.
/// First observation stamps `read_time`; the first non-zero count
/// stamps `confirm_time`.
pub async fn update_confirmations(
    db: &Database,
    payload_link: &str,
    address: &str,
    confirmations: i64,
) -> Result<bool, SealboxError> {
    let target = format!("seal {payload_link} at {address}");
    let payload_link = payload_link.to_string();
    let address = address.to_string();
    let updated = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let Some(old) = select_seal(&tx, &payload_link, &address)? else {
                return Ok(None);
            };
            let mut new = old.clone();
            new.confirmations = confirmations;
            if new.read_time.is_none() {
                new.read_time = Some(now_ms());
            }
            if confirmations > 0 && new.confirm_time.is_none() {
                new.confirm_time = Some(now_ms());
            }
            if new == old {
                return Ok(Some(false));
            }
            tx.execute(
                "UPDATE seals SET confirmations = ?1, read_time = ?2, confirm_time = ?3
                 WHERE payload_link = ?4 AND address = ?5",
                rusqlite::params![
                    new.confirmations,
                    new.read_time,
                    new.confirm_time,
                    payload_link,
                    address
                ],
            )?;
            let old_json = serde_json::to_value(&old).map_err(json_err)?;
            let new_json = serde_json::to_value(&new).map_err(json_err)?;
            insert_change(&tx, ChangeSource::Seals, Some(&old_json), Some(&new_json))?;
            tx.commit()?;
            Ok(Some(true))
        })
        .await
        .map_err(map_tr_err)?;
    updated.ok_or(SealboxError::NotFound(target))
}

/// Submitted records never observed on the ledger whose write is older
/// than `cutoff_ms`. Candidates for resubmission.
pub async fn stuck_in_write(
    db: &Database,
    cutoff_ms: i64,
    limit: i64,
) -> Result<Vec<SealRecord>, SealboxError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SEAL_COLUMNS} FROM seals
                 WHERE unsealed = 0 AND read_time IS NULL AND write_time < ?1
                 ORDER BY write_time ASC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(rusqlite::params![cutoff_ms, limit], row_to_seal)?;
            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok(records)
        })
        .await
        .map_err(map_tr_err)
}

/// Return a stuck record to watch state so the pending sweep submits
/// it again. The failed txid is cleared and the failure annotated.
pub async fn requeue(
    db: &Database,
    payload_link: &str,
    address: &str,
    note: &str,
) -> Result<(), SealboxError> {
    let target = format!("seal {payload_link} at {address}");
    let payload_link = payload_link.to_string();
    let address = address.to_string();
    let note = note.to_string();
    let affected = db
        .connection()
        .call(move |conn| {
            let affected = conn.execute(
                "UPDATE seals SET unsealed = 1, txid = NULL,
                     error_count = error_count + 1, last_error = ?1
                 WHERE payload_link = ?2 AND address = ?3",
                rusqlite::params![note, payload_link, address],
            )?;
            Ok(affected)
        })
        .await
        .map_err(map_tr_err)?;
    if affected == 0 {
        return Err(SealboxError::NotFound(target));
    }
    Ok(())
}
