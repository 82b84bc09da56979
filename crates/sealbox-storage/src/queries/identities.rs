// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity directory queries.

use sealbox_core::types::{ContactStatus, Identity};
use sealbox_core::{SealboxError, now_ms};

use crate::database::{Database, map_tr_err};

fn row_to_identity(row: &rusqlite::Row) -> rusqlite::Result<Identity> {
    let metadata: Option<String> = row.get(3)?;
    Ok(Identity {
        permalink: row.get(0)?,
        pub_key: row.get(1)?,
        endpoint: row.get(2)?,
        metadata: metadata
            .map(|s| {
                serde_json::from_str(&s).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        3,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })
            })
            .transpose()?,
        created_at: row.get(4)?,
    })
}

const IDENTITY_COLUMNS: &str = "permalink, pub_key, endpoint, metadata, created_at";

/// Insert or refresh an identity. Returns whether the permalink was
/// already known to the directory.
pub async fn upsert_identity(
    db: &Database,
    identity: &Identity,
) -> Result<ContactStatus, SealboxError> {
    let identity = identity.clone();
    db.connection()
        .call(move |conn| {
            let known: bool = conn.query_row(
                "SELECT COUNT(*) FROM identities WHERE permalink = ?1",
                rusqlite::params![identity.permalink],
                |row| Ok(row.get::<_, i64>(0)? > 0),
            )?;
            let metadata = identity
                .metadata
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            conn.execute(
                "INSERT INTO identities (permalink, pub_key, endpoint, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(permalink) DO UPDATE SET
                     pub_key = excluded.pub_key,
                     endpoint = excluded.endpoint,
                     metadata = excluded.metadata",
                rusqlite::params![
                    identity.permalink,
                    identity.pub_key,
                    identity.endpoint,
                    metadata,
                    now_ms(),
                ],
            )?;
            Ok(if known {
                ContactStatus::Known
            } else {
                ContactStatus::New
            })
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_by_permalink(
    db: &Database,
    permalink: &str,
) -> Result<Option<Identity>, SealboxError> {
    let permalink = permalink.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE permalink = ?1"),
                rusqlite::params![permalink],
                row_to_identity,
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

pub async fn get_by_pub_key(
    db: &Database,
    pub_key: &str,
) -> Result<Option<Identity>, SealboxError> {
    let pub_key = pub_key.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE pub_key = ?1"),
                rusqlite::params![pub_key],
                row_to_identity,
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
