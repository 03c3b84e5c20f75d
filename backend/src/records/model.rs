use chrono::NaiveDateTime;

/// Business identity of a record; the dedup key.
pub type IdentityKey = i64;

/// Canonical persisted form of a valid source record.
///
/// Append-only: rows are never updated after insert.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub interaction_id: IdentityKey,
    pub remote_id: Option<i64>,

    pub company: Option<String>,
    pub campaign: Option<String>,
    pub base_segment: Option<String>,
    pub strategy: Option<String>,
    pub channel_type: Option<String>,
    pub dial_type: Option<String>,

    pub contact_code: Option<String>,
    pub contact: Option<String>,
    pub contact_created_at: Option<NaiveDateTime>,
    pub contact_updated_at: Option<NaiveDateTime>,
    pub product_code: Option<String>,
    pub phone: Option<String>,

    pub contact_group: Option<String>,
    pub group_code: Option<String>,
    pub result: Option<String>,
    pub result_code: Option<String>,
    pub reason: Option<String>,
    pub reason_code: Option<String>,
    pub sub_reason: Option<String>,
    pub sub_reason_code: Option<String>,
    pub classification_comment: Option<String>,
    pub atk_result: Option<String>,
    pub zip_code: Option<String>,

    pub ticket_assigned_at: Option<NaiveDateTime>,
    pub classified_at: Option<NaiveDateTime>,
    pub ticket_resolved_at: Option<NaiveDateTime>,

    /// Kept verbatim; the source mixes formats here.
    pub promise_date: Option<String>,
    pub promise_amount: Option<f64>,
    pub scheduled_for: Option<String>,

    pub agent_id: Option<i64>,
    pub agent_name: Option<String>,
    pub agent_extension: Option<String>,
    pub call_id: Option<String>,
    pub ticket_id: Option<i64>,
    pub synced_at: Option<NaiveDateTime>,
}
