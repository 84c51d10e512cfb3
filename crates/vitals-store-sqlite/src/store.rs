//! [`SqliteStore`]: the SQLite implementation of [`TruthStore`].

use std::path::Path;

use chrono::NaiveDate;
use rusqlite::OptionalExtension as _;
use vitals_core::{
  canonical::CanonicalEvent,
  context::IntelligenceContext,
  event::{RawEvent, WebhookReceipt},
  facts::DailyFacts,
  failure::Failure,
  insight::Insight,
  store::{TruthStore, WriteOutcome},
};

use crate::{
  Result,
  encode::{
    CanonicalEventRow, FailureRow, RawEventRow, WebhookReceiptRow, decode_doc,
    decode_docs, encode_day, encode_doc, encode_dt,
  },
  schema::SCHEMA,
};

fn outcome(changed: usize) -> WriteOutcome {
  if changed == 0 {
    WriteOutcome::AlreadyExists
  } else {
    WriteOutcome::Created
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A truth store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "opening sqlite store");
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store: useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Fetch the `doc` column of at most one row.
  async fn query_doc(
    &self,
    sql: &'static str,
    a: String,
    b: String,
  ) -> Result<Option<String>> {
    let doc = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(sql, rusqlite::params![a, b], |row| row.get(0))
            .optional()?,
        )
      })
      .await?;
    Ok(doc)
  }
}

// ─── TruthStore impl ─────────────────────────────────────────────────────────

impl TruthStore for SqliteStore {
  type Error = crate::Error;

  // ── Raw events ────────────────────────────────────────────────────────────

  async fn create_raw_event(&self, event: RawEvent) -> Result<WriteOutcome> {
    let row = RawEventRow::encode(&event)?;
    let changed = self.conn.call(move |conn| Ok(row.insert(conn)?)).await?;
    Ok(outcome(changed))
  }

  async fn create_raw_events(&self, events: Vec<RawEvent>) -> Result<Vec<WriteOutcome>> {
    let rows = events
      .iter()
      .map(RawEventRow::encode)
      .collect::<Result<Vec<_>>>()?;

    // Autocommit per row: each insert is its own atomic write.
    let changed: Vec<usize> = self
      .conn
      .call(move |conn| {
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
          out.push(row.insert(conn)?);
        }
        Ok(out)
      })
      .await?;

    Ok(changed.into_iter().map(outcome).collect())
  }

  async fn get_raw_event(&self, user_id: &str, id: &str) -> Result<Option<RawEvent>> {
    self
      .query_doc(
        "SELECT doc FROM raw_events WHERE user_id = ?1 AND id = ?2",
        user_id.to_owned(),
        id.to_owned(),
      )
      .await?
      .as_deref()
      .map(decode_doc)
      .transpose()
  }

  async fn is_raw_event_settled(&self, user_id: &str, raw_event_id: &str) -> Result<bool> {
    let user_id = user_id.to_owned();
    let raw_event_id = raw_event_id.to_owned();

    let settled = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT EXISTS (
             SELECT 1 FROM canonical_events WHERE user_id = ?1 AND id = ?2
           ) OR EXISTS (
             SELECT 1 FROM failures
             WHERE user_id = ?1 AND raw_event_id = ?2 AND kind = 'RAW_EVENT_INVALID'
           )",
          rusqlite::params![user_id, raw_event_id],
          |row| row.get::<_, bool>(0),
        )?)
      })
      .await?;
    Ok(settled)
  }

  // ── Canonical events ──────────────────────────────────────────────────────

  async fn create_canonical_event(&self, event: CanonicalEvent) -> Result<WriteOutcome> {
    let row = CanonicalEventRow::encode(&event)?;
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO canonical_events
             (user_id, id, kind, day, start_at, created_at, doc)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
           ON CONFLICT (user_id, id) DO NOTHING",
          rusqlite::params![
            row.user_id,
            row.id,
            row.kind,
            row.day,
            row.start_at,
            row.created_at,
            row.doc,
          ],
        )?)
      })
      .await?;
    Ok(outcome(changed))
  }

  async fn list_canonical_events(
    &self,
    user_id: &str,
    day: NaiveDate,
  ) -> Result<Vec<CanonicalEvent>> {
    let user_id = user_id.to_owned();
    let day = encode_day(day);

    let docs: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT doc FROM canonical_events
           WHERE user_id = ?1 AND day = ?2
           ORDER BY start_at, id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![user_id, day], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;

    decode_docs(docs)
  }

  // ── Failures ──────────────────────────────────────────────────────────────

  async fn create_failure(&self, failure: Failure) -> Result<WriteOutcome> {
    let row = FailureRow::encode(&failure)?;
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO failures (user_id, id, kind, raw_event_id, created_at, doc)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT (user_id, id) DO NOTHING",
          rusqlite::params![
            row.user_id,
            row.id,
            row.kind,
            row.raw_event_id,
            row.created_at,
            row.doc,
          ],
        )?)
      })
      .await?;
    Ok(outcome(changed))
  }

  async fn list_failures(&self, user_id: &str, limit: usize) -> Result<Vec<Failure>> {
    let user_id = user_id.to_owned();
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let docs: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT doc FROM failures
           WHERE user_id = ?1
           ORDER BY created_at DESC, id
           LIMIT ?2",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![user_id, limit], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;

    decode_docs(docs)
  }

  // ── Webhook receipts ──────────────────────────────────────────────────────

  async fn create_webhook_receipt(&self, receipt: WebhookReceipt) -> Result<WriteOutcome> {
    let row = WebhookReceiptRow::encode(&receipt)?;
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO webhook_receipts (provider, id, received_at, doc)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (provider, id) DO NOTHING",
          rusqlite::params![row.provider, row.id, row.received_at, row.doc],
        )?)
      })
      .await?;
    Ok(outcome(changed))
  }

  // ── Daily facts ───────────────────────────────────────────────────────────

  async fn put_daily_facts(&self, facts: DailyFacts) -> Result<()> {
    let user_id = facts.user_id.clone();
    let date = encode_day(facts.date);
    let computed_at = encode_dt(facts.computed_at);
    let doc = encode_doc(&facts)?;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO daily_facts (user_id, date, computed_at, doc)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (user_id, date)
           DO UPDATE SET computed_at = excluded.computed_at, doc = excluded.doc",
          rusqlite::params![user_id, date, computed_at, doc],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_daily_facts(
    &self,
    user_id: &str,
    date: NaiveDate,
  ) -> Result<Option<DailyFacts>> {
    self
      .query_doc(
        "SELECT doc FROM daily_facts WHERE user_id = ?1 AND date = ?2",
        user_id.to_owned(),
        encode_day(date),
      )
      .await?
      .as_deref()
      .map(decode_doc)
      .transpose()
  }

  async fn list_daily_facts(
    &self,
    user_id: &str,
    from: NaiveDate,
    to: NaiveDate,
  ) -> Result<Vec<DailyFacts>> {
    let user_id = user_id.to_owned();
    let (from, to) = (encode_day(from), encode_day(to));

    let docs: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT doc FROM daily_facts
           WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
           ORDER BY date",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![user_id, from, to], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;

    decode_docs(docs)
  }

  // ── Insights ──────────────────────────────────────────────────────────────

  async fn replace_insights(
    &self,
    user_id: &str,
    date: NaiveDate,
    kinds: &[&str],
    insights: Vec<Insight>,
  ) -> Result<()> {
    let user_id = user_id.to_owned();
    let date = encode_day(date);
    let kinds: Vec<String> = kinds.iter().map(|k| (*k).to_owned()).collect();
    let rows = insights
      .iter()
      .map(|i| Ok((i.kind.clone(), encode_doc(i)?)))
      .collect::<Result<Vec<(String, String)>>>()?;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for kind in &kinds {
          tx.execute(
            "DELETE FROM insights WHERE user_id = ?1 AND date = ?2 AND kind = ?3",
            rusqlite::params![user_id, date, kind],
          )?;
        }
        for (kind, doc) in &rows {
          tx.execute(
            "INSERT INTO insights (user_id, date, kind, doc)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (user_id, date, kind) DO UPDATE SET doc = excluded.doc",
            rusqlite::params![user_id, date, kind, doc],
          )?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn list_insights(&self, user_id: &str, date: NaiveDate) -> Result<Vec<Insight>> {
    let user_id = user_id.to_owned();
    let date = encode_day(date);

    let docs: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT doc FROM insights WHERE user_id = ?1 AND date = ?2 ORDER BY kind",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![user_id, date], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;

    decode_docs(docs)
  }

  // ── Intelligence context ──────────────────────────────────────────────────

  async fn put_intelligence_context(&self, context: IntelligenceContext) -> Result<()> {
    let user_id = context.user_id.clone();
    let date = encode_day(context.date);
    let computed_at = encode_dt(context.computed_at);
    let doc = encode_doc(&context)?;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO intelligence_context (user_id, date, computed_at, doc)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (user_id, date)
           DO UPDATE SET computed_at = excluded.computed_at, doc = excluded.doc",
          rusqlite::params![user_id, date, computed_at, doc],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_intelligence_context(
    &self,
    user_id: &str,
    date: NaiveDate,
  ) -> Result<Option<IntelligenceContext>> {
    self
      .query_doc(
        "SELECT doc FROM intelligence_context WHERE user_id = ?1 AND date = ?2",
        user_id.to_owned(),
        encode_day(date),
      )
      .await?
      .as_deref()
      .map(decode_doc)
      .transpose()
  }

  // ── Users and integrations ────────────────────────────────────────────────

  async fn list_user_ids(&self) -> Result<Vec<String>> {
    let ids = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT DISTINCT user_id FROM raw_events ORDER BY user_id")?;
        let rows = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(ids)
  }

  async fn access_token(&self, user_id: &str, provider: &str) -> Result<Option<String>> {
    self
      .query_doc(
        "SELECT access_token FROM integration_tokens
         WHERE user_id = ?1 AND provider = ?2",
        user_id.to_owned(),
        provider.to_owned(),
      )
      .await
  }

  async fn put_access_token(&self, user_id: &str, provider: &str, token: &str) -> Result<()> {
    let (user_id, provider, token) =
      (user_id.to_owned(), provider.to_owned(), token.to_owned());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO integration_tokens (user_id, provider, access_token)
           VALUES (?1, ?2, ?3)
           ON CONFLICT (user_id, provider)
           DO UPDATE SET access_token = excluded.access_token",
          rusqlite::params![user_id, provider, token],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
