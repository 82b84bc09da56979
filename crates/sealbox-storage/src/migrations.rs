// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded schema migrations, versioned through `PRAGMA user_version`.
//!
//! Each entry in [`MIGRATIONS`] is applied in its own transaction; the
//! user_version is bumped with it so a crash mid-migration rolls back
//! cleanly.

const V1_INITIAL: &str = "
CREATE TABLE identities (
    permalink   TEXT PRIMARY KEY,
    pub_key     TEXT NOT NULL UNIQUE,
    endpoint    TEXT,
    metadata    TEXT,
    created_at  INTEGER NOT NULL
);

CREATE TABLE sessions (
    client_id        TEXT PRIMARY KEY,
    permalink        TEXT NOT NULL,
    challenge        TEXT,
    authenticated    INTEGER NOT NULL DEFAULT 0,
    connected        INTEGER NOT NULL DEFAULT 0,
    time             INTEGER NOT NULL,
    session_token    TEXT,
    client_position  TEXT,
    server_position  TEXT
);
CREATE INDEX idx_sessions_permalink ON sessions (permalink, time);

CREATE TABLE inbox (
    author        TEXT NOT NULL,
    time          INTEGER NOT NULL,
    link          TEXT NOT NULL,
    payload_link  TEXT NOT NULL,
    recipient     TEXT NOT NULL,
    context       TEXT,
    object        TEXT NOT NULL,
    created_at    INTEGER NOT NULL,
    PRIMARY KEY (author, time),
    UNIQUE (author, link)
);
CREATE INDEX idx_inbox_link ON inbox (link, time);
CREATE INDEX idx_inbox_context ON inbox (context, time);

CREATE TABLE outbox (
    recipient        TEXT NOT NULL,
    time             INTEGER NOT NULL,
    link             TEXT NOT NULL,
    payload_link     TEXT NOT NULL,
    author           TEXT NOT NULL,
    context          TEXT,
    object           TEXT NOT NULL,
    created_at       INTEGER NOT NULL,
    delivered_at     INTEGER,
    delivery_error   TEXT,
    rejected_reason  TEXT,
    PRIMARY KEY (recipient, time),
    UNIQUE (recipient, link)
);
CREATE INDEX idx_outbox_payload_link ON outbox (payload_link, time);
CREATE INDEX idx_outbox_context ON outbox (context, time);
CREATE INDEX idx_outbox_undelivered ON outbox (recipient, time)
    WHERE delivered_at IS NULL AND rejected_reason IS NULL;

CREATE TABLE seals (
    payload_link   TEXT NOT NULL,
    address        TEXT NOT NULL,
    unsealed       INTEGER NOT NULL DEFAULT 1,
    confirmations  INTEGER NOT NULL DEFAULT 0,
    txid           TEXT,
    write_time     INTEGER,
    read_time      INTEGER,
    confirm_time   INTEGER,
    error_count    INTEGER NOT NULL DEFAULT 0,
    last_error     TEXT,
    created_at     INTEGER NOT NULL,
    PRIMARY KEY (payload_link, address)
);

CREATE TABLE changes (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    source      TEXT NOT NULL,
    old_row     TEXT,
    new_row     TEXT,
    created_at  INTEGER NOT NULL
);

CREATE TABLE cursors (
    name  TEXT PRIMARY KEY,
    seq   INTEGER NOT NULL
);
";

const MIGRATIONS: &[&str] = &[V1_INITIAL];

/// Apply any migrations newer than the database's current user_version.
pub fn apply(conn: &mut rusqlite::Connection) -> rusqlite::Result<()> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    for (i, sql) in MIGRATIONS.iter().enumerate().skip(version as usize) {
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", (i as i64) + 1)?;
        tx.commit()?;
    }
    Ok(())
}
