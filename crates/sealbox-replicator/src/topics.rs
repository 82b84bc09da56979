// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping from raw change records to event topics.
//!
//! Seal topics encode the anchor lifecycle as observed through
//! before/after pairs:
//! - no old row, new unsealed: `seal:watch` (intent registered)
//! - no old row, new already sealed: `seal:write` (created submitted)
//! - old row was unsealed: `seal:wrote` (submission happened)
//! - old row existed, confirmations now positive: `seal:confirm`
//! - old row existed otherwise: `seal:read` (observed, unconfirmed)

use sealbox_core::types::{ChangeRecord, ChangeSource, DomainEvent};
use sealbox_core::SealboxError;

pub const TOPIC_MESSAGE_RECEIVED: &str = "message:received";
pub const TOPIC_MESSAGE_SENT: &str = "message:sent";
pub const TOPIC_SEAL_WATCH: &str = "seal:watch";
pub const TOPIC_SEAL_WRITE: &str = "seal:write";
pub const TOPIC_SEAL_WROTE: &str = "seal:wrote";
pub const TOPIC_SEAL_READ: &str = "seal:read";
pub const TOPIC_SEAL_CONFIRM: &str = "seal:confirm";

fn field_bool(value: &serde_json::Value, field: &str) -> Result<bool, SealboxError> {
    value[field].as_bool().ok_or_else(|| {
        SealboxError::Internal(format!("change record missing boolean field {field}"))
    })
}

fn field_i64(value: &serde_json::Value, field: &str) -> Result<i64, SealboxError> {
    value[field].as_i64().ok_or_else(|| {
        SealboxError::Internal(format!("change record missing numeric field {field}"))
    })
}

/// Map one change record to its domain event, if it carries one.
///
/// Returns `Ok(None)` for mutations with no external meaning (e.g. an
/// outbox insert, which only becomes `message:sent` once delivery
/// lands). Errs on malformed records so the caller can fail the whole
/// batch and redeliver it.
pub fn map_change(record: &ChangeRecord) -> Result<Option<DomainEvent>, SealboxError> {
    let Some(new) = record.new.as_ref() else {
        // Rows are never deleted; a change without a new image carries
        // nothing to project.
        return Ok(None);
    };

    let event = match record.source {
        ChangeSource::Inbox => match record.old {
            None => Some(DomainEvent::new(TOPIC_MESSAGE_RECEIVED, new.clone())),
            Some(_) => None,
        },
        ChangeSource::Outbox => match record.old.as_ref() {
            None => None,
            Some(old) => {
                if old["deliveredAt"].is_null() && !new["deliveredAt"].is_null() {
                    Some(DomainEvent::new(TOPIC_MESSAGE_SENT, new.clone()))
                } else {
                    None
                }
            }
        },
        ChangeSource::Seals => {
            let topic = match record.old.as_ref() {
                None => {
                    if field_bool(new, "unsealed")? {
                        TOPIC_SEAL_WATCH
                    } else {
                        TOPIC_SEAL_WRITE
                    }
                }
                Some(old) => {
                    if field_bool(old, "unsealed")? {
                        TOPIC_SEAL_WROTE
                    } else if field_i64(new, "confirmations")? > 0 {
                        TOPIC_SEAL_CONFIRM
                    } else {
                        TOPIC_SEAL_READ
                    }
                }
            };
            Some(DomainEvent::new(topic, new.clone()))
        }
    };
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn change(
        source: ChangeSource,
        old: Option<serde_json::Value>,
        new: Option<serde_json::Value>,
    ) -> ChangeRecord {
        ChangeRecord {
            seq: 1,
            source,
            old,
            new,
            created_at: 0,
        }
    }

    #[test]
    fn inbox_insert_is_message_received() {
        let record = change(ChangeSource::Inbox, None, Some(json!({"_link": "l1"})));
        let event = map_change(&record).unwrap().unwrap();
        assert_eq!(event.topic, TOPIC_MESSAGE_RECEIVED);
        assert_eq!(event.data["_link"], "l1");
    }

    #[test]
    fn outbox_insert_is_silent_until_delivery() {
        let record = change(ChangeSource::Outbox, None, Some(json!({"_link": "l1"})));
        assert!(map_change(&record).unwrap().is_none());
    }

    #[test]
    fn delivery_transition_is_message_sent() {
        let record = change(
            ChangeSource::Outbox,
            Some(json!({"_link": "l1", "deliveredAt": null})),
            Some(json!({"_link": "l1", "deliveredAt": 500})),
        );
        let event = map_change(&record).unwrap().unwrap();
        assert_eq!(event.topic, TOPIC_MESSAGE_SENT);

        // Re-writing an already delivered row is not a second send.
        let record = change(
            ChangeSource::Outbox,
            Some(json!({"_link": "l1", "deliveredAt": 500})),
            Some(json!({"_link": "l1", "deliveredAt": 500})),
        );
        assert!(map_change(&record).unwrap().is_none());
    }

    #[test]
    fn seal_lifecycle_maps_to_all_five_topics() {
        let watch = change(
            ChangeSource::Seals,
            None,
            Some(json!({"unsealed": true, "confirmations": 0})),
        );
        assert_eq!(map_change(&watch).unwrap().unwrap().topic, TOPIC_SEAL_WATCH);

        let write = change(
            ChangeSource::Seals,
            None,
            Some(json!({"unsealed": false, "confirmations": 0})),
        );
        assert_eq!(map_change(&write).unwrap().unwrap().topic, TOPIC_SEAL_WRITE);

        let wrote = change(
            ChangeSource::Seals,
            Some(json!({"unsealed": true, "confirmations": 0})),
            Some(json!({"unsealed": false, "confirmations": 0})),
        );
        assert_eq!(map_change(&wrote).unwrap().unwrap().topic, TOPIC_SEAL_WROTE);

        let read = change(
            ChangeSource::Seals,
            Some(json!({"unsealed": false, "confirmations": 0})),
            Some(json!({"unsealed": false, "confirmations": 0})),
        );
        assert_eq!(map_change(&read).unwrap().unwrap().topic, TOPIC_SEAL_READ);

        let confirm = change(
            ChangeSource::Seals,
            Some(json!({"unsealed": false, "confirmations": 0})),
            Some(json!({"unsealed": false, "confirmations": 3})),
        );
        assert_eq!(
            map_change(&confirm).unwrap().unwrap().topic,
            TOPIC_SEAL_CONFIRM
        );
    }

    #[test]
    fn malformed_seal_record_is_an_error() {
        let record = change(ChangeSource::Seals, None, Some(json!({"no": "fields"})));
        assert!(map_change(&record).is_err());
    }

    #[test]
    fn change_without_new_image_is_silent() {
        let record = change(ChangeSource::Inbox, Some(json!({"_link": "l1"})), None);
        assert!(map_change(&record).unwrap().is_none());
    }
}
