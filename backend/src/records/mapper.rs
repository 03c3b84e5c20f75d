//! Validation and field mapping from wire records to stored records.
//!
//! A record is valid when it carries its identity (`interaction_id`).
//! Date strings are parsed as ISO-8601 first, then as
//! `yyyy-MM-dd HH:mm:ss`; a date that matches neither becomes `None`
//! without rejecting the record.

use chrono::{DateTime, NaiveDateTime};
use tracing::debug;

use crate::records::model::{IdentityKey, StoredRecord};
use crate::source::SourceRecord;
use crate::time::TIMESTAMP_FORMAT;

const ISO_LOCAL_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

pub fn identity_of(record: &SourceRecord) -> Option<IdentityKey> {
    record.interaction_id
}

pub fn is_valid(record: &SourceRecord) -> bool {
    identity_of(record).is_some()
}

/// Converts a wire record; `None` when the record has no identity.
pub fn map_record(record: SourceRecord) -> Option<StoredRecord> {
    let Some(interaction_id) = identity_of(&record) else {
        debug!(
            remote_id = ?record.remote_id,
            classified_at = ?record.classified_at,
            "dropping record without identity"
        );
        return None;
    };

    Some(StoredRecord {
        interaction_id,
        remote_id: record.remote_id,
        company: record.company,
        campaign: record.campaign,
        base_segment: record.base_segment,
        strategy: record.strategy,
        channel_type: record.channel_type,
        dial_type: record.dial_type,
        contact_code: record.contact_code,
        contact: record.contact,
        contact_created_at: parse_datetime(record.contact_created_at.as_deref()),
        contact_updated_at: parse_datetime(record.contact_updated_at.as_deref()),
        product_code: record.product_code,
        phone: record.phone,
        contact_group: record.contact_group,
        group_code: record.group_code,
        result: record.result,
        result_code: record.result_code,
        reason: record.reason,
        reason_code: record.reason_code,
        sub_reason: record.sub_reason,
        sub_reason_code: record.sub_reason_code,
        classification_comment: record.classification_comment,
        atk_result: record.atk_result,
        zip_code: record.zip_code,
        ticket_assigned_at: parse_datetime(record.ticket_assigned_at.as_deref()),
        classified_at: parse_datetime(record.classified_at.as_deref()),
        ticket_resolved_at: parse_datetime(record.ticket_resolved_at.as_deref()),
        promise_date: record.promise_date,
        promise_amount: record.promise_amount,
        scheduled_for: record.scheduled_for,
        agent_id: record.agent_id,
        agent_name: record.agent_name,
        agent_extension: record.agent_extension,
        call_id: record.call_id,
        ticket_id: record.ticket_id,
        synced_at: parse_datetime(record.synced_at.as_deref()),
    })
}

pub fn parse_datetime(raw: Option<&str>) -> Option<NaiveDateTime> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_local());
    }

    ISO_LOCAL_FORMATS
        .iter()
        .chain(std::iter::once(&TIMESTAMP_FORMAT))
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            debug!(value = raw, "unparseable date; storing null");
            None
        })
}
