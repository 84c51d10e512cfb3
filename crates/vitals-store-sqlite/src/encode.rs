//! Encoding helpers between domain documents and SQLite rows.
//!
//! Timestamps are stored as RFC 3339 strings and dates as `YYYY-MM-DD`.
//! Documents are stored whole as compact JSON; the extra columns exist only
//! for keys, ordering and filtering.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Serialize, de::DeserializeOwned};
use vitals_core::{
  canonical::CanonicalEvent,
  event::{RawEvent, WebhookReceipt},
  failure::Failure,
};

use crate::Result;

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn encode_day(day: NaiveDate) -> String { day.format("%Y-%m-%d").to_string() }

// ─── Documents ───────────────────────────────────────────────────────────────

pub fn encode_doc<T: Serialize>(doc: &T) -> Result<String> {
  Ok(serde_json::to_string(doc)?)
}

pub fn decode_doc<T: DeserializeOwned>(s: &str) -> Result<T> {
  Ok(serde_json::from_str(s)?)
}

pub fn decode_docs<T: DeserializeOwned>(rows: Vec<String>) -> Result<Vec<T>> {
  rows.iter().map(|s| decode_doc(s)).collect()
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column values for a `raw_events` insert.
pub struct RawEventRow {
  pub user_id:     String,
  pub id:          String,
  pub source_id:   String,
  pub kind:        String,
  pub fingerprint: String,
  pub received_at: String,
  pub doc:         String,
}

impl RawEventRow {
  pub fn encode(event: &RawEvent) -> Result<Self> {
    Ok(Self {
      user_id:     event.user_id.clone(),
      id:          event.id.clone(),
      source_id:   event.source_id.clone(),
      kind:        event.kind.clone(),
      fingerprint: event.fingerprint.clone(),
      received_at: encode_dt(event.received_at),
      doc:         encode_doc(event)?,
    })
  }

  /// Create-only insert; returns the number of rows written (0 or 1).
  pub fn insert(&self, conn: &rusqlite::Connection) -> rusqlite::Result<usize> {
    conn.execute(
      "INSERT INTO raw_events
         (user_id, id, source_id, kind, fingerprint, received_at, doc)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
       ON CONFLICT (user_id, id) DO NOTHING",
      rusqlite::params![
        self.user_id,
        self.id,
        self.source_id,
        self.kind,
        self.fingerprint,
        self.received_at,
        self.doc,
      ],
    )
  }
}

/// Column values for a `canonical_events` insert.
pub struct CanonicalEventRow {
  pub user_id:    String,
  pub id:         String,
  pub kind:       String,
  pub day:        String,
  pub start_at:   String,
  pub created_at: String,
  pub doc:        String,
}

impl CanonicalEventRow {
  pub fn encode(event: &CanonicalEvent) -> Result<Self> {
    Ok(Self {
      user_id:    event.user_id.clone(),
      id:         event.id.clone(),
      kind:       event.kind().to_string(),
      day:        encode_day(event.day),
      start_at:   event.start_iso(),
      created_at: encode_dt(event.created_at),
      doc:        encode_doc(event)?,
    })
  }
}

/// Column values for a `failures` insert.
pub struct FailureRow {
  pub user_id:      String,
  pub id:           String,
  pub kind:         String,
  pub raw_event_id: Option<String>,
  pub created_at:   String,
  pub doc:          String,
}

impl FailureRow {
  pub fn encode(failure: &Failure) -> Result<Self> {
    let kind = serde_json::to_value(failure.kind)?
      .as_str()
      .unwrap_or_default()
      .to_owned();
    Ok(Self {
      user_id: failure.user_id.clone(),
      id: failure.id.clone(),
      kind,
      raw_event_id: failure.raw_event_id.clone(),
      created_at: encode_dt(failure.created_at),
      doc: encode_doc(failure)?,
    })
  }
}

/// Column values for a `webhook_receipts` insert.
pub struct WebhookReceiptRow {
  pub provider:    String,
  pub id:          String,
  pub received_at: String,
  pub doc:         String,
}

impl WebhookReceiptRow {
  pub fn encode(receipt: &WebhookReceipt) -> Result<Self> {
    Ok(Self {
      provider:    receipt.provider.to_string(),
      id:          receipt.id.clone(),
      received_at: encode_dt(receipt.received_at),
      doc:         encode_doc(receipt)?,
    })
  }
}
