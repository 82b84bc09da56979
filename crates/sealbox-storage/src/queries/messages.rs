// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbox and outbox queries.
//!
//! Both tables store immutable envelopes keyed by (party, time) with a
//! uniqueness guard on (party, link). The outbox additionally carries
//! mutable delivery metadata. Inserts and delivery transitions append
//! change rows for the replicator.

use sealbox_core::types::{ChangeSource, Direction, Envelope};
use sealbox_core::{SealboxError, now_ms};

use crate::database::{Database, is_unique_violation, map_tr_err};
use crate::models::OutboxEntry;
use crate::queries::changes::insert_change;

/// Filter for message lookups. `direction` is mandatory; everything
/// else narrows the result set.
#[derive(Debug, Clone)]
pub struct MessageQuery {
    pub direction: Direction,
    /// Author for inbound queries, recipient for outbound ones.
    pub party: Option<String>,
    pub link: Option<String>,
    pub payload_link: Option<String>,
    pub context: Option<String>,
    pub after_time: Option<i64>,
    pub before_time: Option<i64>,
    /// Newest first when set; default is ascending time.
    pub reverse: bool,
    pub limit: Option<i64>,
}

impl MessageQuery {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            party: None,
            link: None,
            payload_link: None,
            context: None,
            after_time: None,
            before_time: None,
            reverse: false,
            limit: None,
        }
    }
}

fn table_and_party(direction: Direction) -> (&'static str, &'static str) {
    match direction {
        Direction::Inbound => ("inbox", "author"),
        Direction::Outbound => ("outbox", "recipient"),
    }
}

fn change_source(direction: Direction) -> ChangeSource {
    match direction {
        Direction::Inbound => ChangeSource::Inbox,
        Direction::Outbound => ChangeSource::Outbox,
    }
}

fn row_to_envelope(row: &rusqlite::Row) -> rusqlite::Result<Envelope> {
    let object: String = row.get(6)?;
    Ok(Envelope {
        author: row.get(0)?,
        recipient: row.get(1)?,
        link: row.get(2)?,
        payload_link: row.get(3)?,
        context: row.get(4)?,
        time: row.get(5)?,
        object: serde_json::from_str(&object).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                6,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?,
    })
}

const ENVELOPE_COLUMNS: &str = "author, recipient, link, payload_link, context, time, object";

fn json_err(e: serde_json::Error) -> rusqlite::Error {
    rusqlite::Error::ToSqlConversionFailure(Box::new(e))
}

fn insert_envelope(
    conn: &rusqlite::Connection,
    direction: Direction,
    env: &Envelope,
) -> rusqlite::Result<()> {
    let (table, _) = table_and_party(direction);
    let object = serde_json::to_string(&env.object).map_err(json_err)?;
    conn.execute(
        &format!(
            "INSERT INTO {table}
                 (author, recipient, link, payload_link, context, time, object, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
        ),
        rusqlite::params![
            env.author,
            env.recipient,
            env.link,
            env.payload_link,
            env.context,
            env.time,
            object,
            now_ms(),
        ],
    )?;
    let new_row = serde_json::to_value(env).map_err(json_err)?;
    insert_change(conn, change_source(direction), None, Some(&new_row))?;
    Ok(())
}

/// Store one envelope. A UNIQUE violation on (party, link) or
/// (party, time) surfaces as [`SealboxError::Duplicate`] so callers can
/// treat redelivery as success.
pub async fn put_message(
    db: &Database,
    direction: Direction,
    envelope: &Envelope,
) -> Result<(), SealboxError> {
    let env = envelope.clone();
    let link = envelope.link.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            insert_envelope(&tx, direction, &env)?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                SealboxError::Duplicate { link }
            } else {
                map_tr_err(e)
            }
        })
}

/// Store several envelopes in one transaction. All-or-nothing: any
/// failure, including a duplicate, rolls the whole batch back.
pub async fn batch_put(
    db: &Database,
    direction: Direction,
    envelopes: &[Envelope],
) -> Result<usize, SealboxError> {
    let envs = envelopes.to_vec();
    let count = envs.len();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            for env in &envs {
                insert_envelope(&tx, direction, env)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                SealboxError::BatchPutFailed("duplicate envelope in batch".into())
            } else {
                map_tr_err(e)
            }
        })?;
    Ok(count)
}

/// Query envelopes matching the filter, ordered by time.
pub async fn find(db: &Database, query: MessageQuery) -> Result<Vec<Envelope>, SealboxError> {
    db.connection()
        .call(move |conn| {
            let (table, party_col) = table_and_party(query.direction);
            let mut sql = format!("SELECT {ENVELOPE_COLUMNS} FROM {table} WHERE 1 = 1");
            let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(party) = query.party {
                sql.push_str(&format!(" AND {party_col} = ?{}", params.len() + 1));
                params.push(Box::new(party));
            }
            if let Some(link) = query.link {
                sql.push_str(&format!(" AND link = ?{}", params.len() + 1));
                params.push(Box::new(link));
            }
            if let Some(payload_link) = query.payload_link {
                sql.push_str(&format!(" AND payload_link = ?{}", params.len() + 1));
                params.push(Box::new(payload_link));
            }
            if let Some(context) = query.context {
                sql.push_str(&format!(" AND context = ?{}", params.len() + 1));
                params.push(Box::new(context));
            }
            if let Some(after) = query.after_time {
                sql.push_str(&format!(" AND time > ?{}", params.len() + 1));
                params.push(Box::new(after));
            }
            if let Some(before) = query.before_time {
                sql.push_str(&format!(" AND time < ?{}", params.len() + 1));
                params.push(Box::new(before));
            }

            sql.push_str(if query.reverse {
                " ORDER BY time DESC"
            } else {
                " ORDER BY time ASC"
            });
            if let Some(limit) = query.limit {
                sql.push_str(&format!(" LIMIT {limit}"));
            }

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(params), row_to_envelope)?;
            let mut envelopes = Vec::new();
            for row in rows {
                envelopes.push(row?);
            }
            Ok(envelopes)
        })
        .await
        .map_err(map_tr_err)
}

/// First match for the filter, or None.
pub async fn find_one(
    db: &Database,
    mut query: MessageQuery,
) -> Result<Option<Envelope>, SealboxError> {
    query.limit = Some(1);
    Ok(find(db, query).await?.into_iter().next())
}

/// Fetch a single envelope by its party key and link.
pub async fn get_by_link(
    db: &Database,
    direction: Direction,
    party: &str,
    link: &str,
) -> Result<Envelope, SealboxError> {
    let mut query = MessageQuery::new(direction);
    query.party = Some(party.to_string());
    query.link = Some(link.to_string());
    find_one(db, query)
        .await?
        .ok_or_else(|| SealboxError::NotFound(format!("{direction} message {link}")))
}

/// Outbox envelopes with no delivery yet and no rejection, oldest
/// first, across all recipients.
pub async fn undelivered(db: &Database, limit: i64) -> Result<Vec<Envelope>, SealboxError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENVELOPE_COLUMNS} FROM outbox
                 WHERE delivered_at IS NULL AND rejected_reason IS NULL
                 ORDER BY time ASC LIMIT ?1"
            ))?;
            let rows = stmt.query_map(rusqlite::params![limit], row_to_envelope)?;
            let mut envelopes = Vec::new();
            for row in rows {
                envelopes.push(row?);
            }
            Ok(envelopes)
        })
        .await
        .map_err(map_tr_err)
}

fn row_to_outbox_entry(row: &rusqlite::Row) -> rusqlite::Result<OutboxEntry> {
    Ok(OutboxEntry {
        envelope: row_to_envelope(row)?,
        delivered_at: row.get(7)?,
        delivery_error: row.get(8)?,
        rejected_reason: row.get(9)?,
    })
}

/// Fetch an outbox row together with its delivery metadata, or None
/// when no such row exists.
pub async fn outbox_entry(
    db: &Database,
    recipient: &str,
    link: &str,
) -> Result<Option<OutboxEntry>, SealboxError> {
    let recipient = recipient.to_string();
    let link = link.to_string();
    db.connection()
        .call(move |conn| {
            use rusqlite::OptionalExtension;
            conn.query_row(
                &format!(
                    "SELECT {ENVELOPE_COLUMNS}, delivered_at, delivery_error, rejected_reason
                     FROM outbox WHERE recipient = ?1 AND link = ?2"
                ),
                rusqlite::params![recipient, link],
                row_to_outbox_entry,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

#[derive(serde::Serialize)]
struct DeliveryChange<'a> {
    #[serde(rename = "_recipient")]
    recipient: &'a str,
    #[serde(rename = "_link")]
    link: &'a str,
    time: i64,
    #[serde(rename = "deliveredAt")]
    delivered_at: Option<i64>,
}

/// Mark an outbox envelope delivered. Returns false when it was already
/// delivered (idempotent), errs NotFound when no such row exists.
pub async fn mark_delivered(
    db: &Database,
    recipient: &str,
    link: &str,
    delivered_at: i64,
) -> Result<bool, SealboxError> {
    let target = format!("outbox message {link} for {recipient}");
    let recipient = recipient.to_string();
    let link = link.to_string();
    let updated: Option<bool> = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let existing: Option<(i64, Option<i64>)> = tx
                .query_row(
                    "SELECT time, delivered_at FROM outbox WHERE recipient = ?1 AND link = ?2",
                    rusqlite::params![recipient, link],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            let Some((time, previous)) = existing else {
                return Ok(None);
            };
            if previous.is_some() {
                tx.commit()?;
                return Ok(Some(false));
            }
            tx.execute(
                "UPDATE outbox SET delivered_at = ?1, delivery_error = NULL
                 WHERE recipient = ?2 AND link = ?3",
                rusqlite::params![delivered_at, recipient, link],
            )?;
            let old = serde_json::to_value(DeliveryChange {
                recipient: &recipient,
                link: &link,
                time,
                delivered_at: None,
            })
            .map_err(json_err)?;
            let new = serde_json::to_value(DeliveryChange {
                recipient: &recipient,
                link: &link,
                time,
                delivered_at: Some(delivered_at),
            })
            .map_err(json_err)?;
            insert_change(&tx, ChangeSource::Outbox, Some(&old), Some(&new))?;
            tx.commit()?;
            Ok(Some(true))
        })
        .await
        .map_err(map_tr_err)?;
    updated.ok_or(SealboxError::NotFound(target))
}

/// Record a transient delivery failure. The envelope stays eligible for
/// the retry sweep; no change row is written.
pub async fn mark_delivery_error(
    db: &Database,
    recipient: &str,
    link: &str,
    error: &str,
) -> Result<(), SealboxError> {
    let recipient = recipient.to_string();
    let link = link.to_string();
    let error = error.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE outbox SET delivery_error = ?1
                 WHERE recipient = ?2 AND link = ?3 AND delivered_at IS NULL",
                rusqlite::params![error, recipient, link],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Permanently reject an outbox envelope. Rejected envelopes never
/// re-enter the retry sweep.
pub async fn mark_rejected(
    db: &Database,
    recipient: &str,
    link: &str,
    reason: &str,
) -> Result<(), SealboxError> {
    let target = format!("outbox message {link} for {recipient}");
    let recipient = recipient.to_string();
    let link = link.to_string();
    let reason = reason.to_string();
    let affected = db
        .connection()
        .call(move |conn| {
            let affected = conn.execute(
                "UPDATE outbox SET rejected_reason = ?1
                 WHERE recipient = ?2 AND link = ?3",
                rusqlite::params![reason, recipient, link],
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

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn test_db(dir: &tempfile::TempDir) -> Database {
        Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap()
    }

    fn envelope(author: &str, recipient: &str, time: i64, body: &str) -> Envelope {
        let mut env = Envelope {
            author: author.to_string(),
            recipient: recipient.to_string(),
            link: String::new(),
            payload_link: format!("pl-{body}"),
            context: Some("thread-1".to_string()),
            time,
            object: serde_json::json!({"body": body}),
        };
        env.link = env.compute_link();
        env
    }

    #[tokio::test]
    async fn put_and_get_round_trip() {
        let dir = tempdir().unwrap();
        let db = test_db(&dir).await;
        let env = envelope("alice", "bob", 100, "hello");

        put_message(&db, Direction::Inbound, &env).await.unwrap();
        let got = get_by_link(&db, Direction::Inbound, "alice", &env.link)
            .await
            .unwrap();
        assert_eq!(got, env);
    }

    #[tokio::test]
    async fn duplicate_link_is_rejected_with_duplicate_error() {
        let dir = tempdir().unwrap();
        let db = test_db(&dir).await;
        let env = envelope("alice", "bob", 100, "hello");

        put_message(&db, Direction::Inbound, &env).await.unwrap();
        let err = put_message(&db, Direction::Inbound, &env)
            .await
            .unwrap_err();
        assert!(matches!(err, SealboxError::Duplicate { ref link } if *link == env.link));
    }

    #[tokio::test]
    async fn same_link_different_direction_is_not_a_duplicate() {
        let dir = tempdir().unwrap();
        let db = test_db(&dir).await;
        let env = envelope("alice", "bob", 100, "hello");

        put_message(&db, Direction::Inbound, &env).await.unwrap();
        put_message(&db, Direction::Outbound, &env).await.unwrap();
    }

    #[tokio::test]
    async fn find_filters_by_party_and_orders_by_time() {
        let dir = tempdir().unwrap();
        let db = test_db(&dir).await;
        for (t, body) in [(300, "c"), (100, "a"), (200, "b")] {
            put_message(&db, Direction::Inbound, &envelope("alice", "bob", t, body))
                .await
                .unwrap();
        }
        put_message(&db, Direction::Inbound, &envelope("carol", "bob", 150, "x"))
            .await
            .unwrap();

        let mut query = MessageQuery::new(Direction::Inbound);
        query.party = Some("alice".to_string());
        let found = find(&db, query.clone()).await.unwrap();
        assert_eq!(
            found.iter().map(|e| e.time).collect::<Vec<_>>(),
            vec![100, 200, 300]
        );

        query.reverse = true;
        query.limit = Some(2);
        let found = find(&db, query).await.unwrap();
        assert_eq!(
            found.iter().map(|e| e.time).collect::<Vec<_>>(),
            vec![300, 200]
        );
    }

    #[tokio::test]
    async fn find_filters_by_time_window_and_context() {
        let dir = tempdir().unwrap();
        let db = test_db(&dir).await;
        for t in [100, 200, 300] {
            put_message(
                &db,
                Direction::Outbound,
                &envelope("alice", "bob", t, &format!("m{t}")),
            )
            .await
            .unwrap();
        }

        let mut query = MessageQuery::new(Direction::Outbound);
        query.party = Some("bob".to_string());
        query.after_time = Some(100);
        query.before_time = Some(300);
        let found = find(&db, query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].time, 200);

        let mut query = MessageQuery::new(Direction::Outbound);
        query.context = Some("no-such-thread".to_string());
        assert!(find(&db, query).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn batch_put_rolls_back_on_duplicate() {
        let dir = tempdir().unwrap();
        let db = test_db(&dir).await;
        let first = envelope("alice", "bob", 100, "a");
        put_message(&db, Direction::Inbound, &first).await.unwrap();

        let fresh = envelope("alice", "bob", 200, "b");
        let err = batch_put(&db, Direction::Inbound, &[fresh.clone(), first.clone()])
            .await
            .unwrap_err();
        assert!(matches!(err, SealboxError::BatchPutFailed(_)));

        // The fresh envelope must not have been committed.
        let mut query = MessageQuery::new(Direction::Inbound);
        query.link = Some(fresh.link.clone());
        assert!(find_one(&db, query).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mark_delivered_is_idempotent_and_leaves_sweep() {
        let dir = tempdir().unwrap();
        let db = test_db(&dir).await;
        let env = envelope("alice", "bob", 100, "hello");
        put_message(&db, Direction::Outbound, &env).await.unwrap();

        assert_eq!(undelivered(&db, 10).await.unwrap().len(), 1);
        assert!(mark_delivered(&db, "bob", &env.link, 500).await.unwrap());
        assert!(!mark_delivered(&db, "bob", &env.link, 600).await.unwrap());
        assert!(undelivered(&db, 10).await.unwrap().is_empty());

        let err = mark_delivered(&db, "bob", "no-such-link", 700)
            .await
            .unwrap_err();
        assert!(matches!(err, SealboxError::NotFound(_)));
    }

    #[tokio::test]
    async fn rejected_messages_leave_the_retry_sweep() {
        let dir = tempdir().unwrap();
        let db = test_db(&dir).await;
        let env = envelope("alice", "bob", 100, "hello");
        put_message(&db, Direction::Outbound, &env).await.unwrap();

        mark_delivery_error(&db, "bob", &env.link, "connection refused")
            .await
            .unwrap();
        assert_eq!(undelivered(&db, 10).await.unwrap().len(), 1);

        mark_rejected(&db, "bob", &env.link, "recipient refused payload")
            .await
            .unwrap();
        assert!(undelivered(&db, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn outbox_entry_tracks_delivery_metadata() {
        let dir = tempdir().unwrap();
        let db = test_db(&dir).await;
        let env = envelope("alice", "bob", 100, "hello");
        put_message(&db, Direction::Outbound, &env).await.unwrap();

        let entry = outbox_entry(&db, "bob", &env.link).await.unwrap().unwrap();
        assert_eq!(entry.envelope, env);
        assert_eq!(entry.delivered_at, None);
        assert_eq!(entry.delivery_error, None);
        assert_eq!(entry.rejected_reason, None);

        mark_delivery_error(&db, "bob", &env.link, "connection refused")
            .await
            .unwrap();
        let entry = outbox_entry(&db, "bob", &env.link).await.unwrap().unwrap();
        assert_eq!(entry.delivery_error.as_deref(), Some("connection refused"));

        mark_delivered(&db, "bob", &env.link, 500).await.unwrap();
        let entry = outbox_entry(&db, "bob", &env.link).await.unwrap().unwrap();
        assert_eq!(entry.delivered_at, Some(500));
        assert_eq!(entry.delivery_error, None);

        assert!(
            outbox_entry(&db, "bob", "no-such-link")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn inserts_and_delivery_append_change_rows() {
        let dir = tempdir().unwrap();
        let db = test_db(&dir).await;
        let env = envelope("alice", "bob", 100, "hello");

        put_message(&db, Direction::Outbound, &env).await.unwrap();
        mark_delivered(&db, "bob", &env.link, 500).await.unwrap();

        let records = crate::queries::changes::fetch_after(&db, 0, 10)
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].old.is_none());
        assert_eq!(records[0].new.as_ref().unwrap()["_link"], env.link);
        let update = &records[1];
        assert!(update.old.as_ref().unwrap()["deliveredAt"].is_null());
        assert_eq!(update.new.as_ref().unwrap()["deliveredAt"], 500);
    }
}
