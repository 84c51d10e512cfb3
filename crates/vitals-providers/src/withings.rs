//! Withings measure API client. Only body measurements are pulled: weight
//! (type 1) and fat ratio (type 6).

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use vitals_core::event::{IngestEnvelope, OccurredAt, Provenance, Provider};

use crate::{Error, Result, http::read_json};

const PROVIDER: Provider = Provider::Withings;
const MEASURE_WEIGHT: i64 = 1;
const MEASURE_FAT_RATIO: i64 = 6;

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Envelope {
  status: i64,
  #[serde(default)]
  body:   Option<MeasureBody>,
  #[serde(default)]
  error:  Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MeasureBody {
  #[serde(default)]
  pub measuregrps: Vec<MeasureGroup>,
  #[serde(default)]
  pub timezone:    Option<String>,
  #[serde(default)]
  pub more:        i64,
  #[serde(default)]
  pub offset:      i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeasureGroup {
  pub grpid:    i64,
  /// Unix seconds.
  pub date:     i64,
  #[serde(default)]
  pub measures: Vec<Measure>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Measure {
  pub value: i64,
  #[serde(rename = "type")]
  pub kind:  i64,
  pub unit:  i32,
}

impl Measure {
  /// `value × 10^unit`.
  pub fn real(self) -> f64 { self.value as f64 * 10f64.powi(self.unit) }
}

// ─── Client ──────────────────────────────────────────────────────────────────

pub struct WithingsClient {
  http:     Client,
  api_base: String,
}

impl WithingsClient {
  pub fn new(http: Client, api_base: &str) -> Self {
    Self { http, api_base: api_base.trim_end_matches('/').to_owned() }
  }

  /// Fetch body measurements taken in `[start, end]`, following `more` /
  /// `offset` paging.
  pub async fn fetch(
    &self,
    token: &str,
    start: NaiveDate,
    end: NaiveDate,
  ) -> Result<Vec<IngestEnvelope>> {
    let start_ts = start.and_time(NaiveTime::MIN).and_utc().timestamp();
    let end_ts = (end + chrono::Duration::days(1)).and_time(NaiveTime::MIN).and_utc().timestamp();
    let url = format!("{}/measure", self.api_base);

    let mut out = Vec::new();
    let mut offset = 0;
    loop {
      let mut form = vec![
        ("action", "getmeas".to_owned()),
        ("meastype", format!("{MEASURE_WEIGHT},{MEASURE_FAT_RATIO}")),
        ("category", "1".to_owned()),
        ("startdate", start_ts.to_string()),
        ("enddate", end_ts.to_string()),
      ];
      if offset > 0 {
        form.push(("offset", offset.to_string()));
      }

      let resp = self
        .http
        .post(&url)
        .bearer_auth(token)
        .form(&form)
        .send()
        .await
        .map_err(|source| Error::Http { provider: PROVIDER, source })?;
      let envelope: Envelope = read_json(PROVIDER, resp).await?;

      if envelope.status != 0 {
        return Err(Error::ProviderResponse {
          provider: PROVIDER,
          message:  format!(
            "status {}{}",
            envelope.status,
            envelope.error.map(|e| format!(": {e}")).unwrap_or_default()
          ),
        });
      }
      let body = envelope.body.unwrap_or_default();
      let zone = body.timezone.clone();
      out.extend(body.measuregrps.iter().filter_map(|g| normalize_group(g, zone.as_deref())));

      if body.more == 0 || body.offset <= offset {
        break;
      }
      offset = body.offset;
    }

    tracing::debug!(count = out.len(), "fetched withings measurements");
    Ok(out)
  }
}

// ─── Normalisation ───────────────────────────────────────────────────────────

/// A weight event for a measure group, keyed by its `grpid`. Groups without a
/// weight measure are skipped.
pub fn normalize_group(group: &MeasureGroup, zone: Option<&str>) -> Option<IngestEnvelope> {
  let find = |kind| group.measures.iter().find(|m| m.kind == kind).map(|m| m.real());
  let weight_kg = find(MEASURE_WEIGHT)?;
  let at = DateTime::<Utc>::from_timestamp(group.date, 0)?;

  let mut payload = Map::new();
  payload.insert("weightKg".into(), json!(weight_kg));
  if let Some(fat) = find(MEASURE_FAT_RATIO) {
    payload.insert("bodyFatPercent".into(), json!(fat));
  }

  Some(IngestEnvelope {
    provider:                   PROVIDER.to_string(),
    kind:                       "weight".to_owned(),
    occurred_at:                OccurredAt::Instant(at),
    time_zone:                  zone.map(str::to_owned),
    payload:                    Value::Object(payload),
    provenance:                 Some(Provenance::Backfill),
    correction_of_raw_event_id: None,
    uncertainty_state:          None,
    idempotency_key:            Some(group.grpid.to_string()),
    schema_version:             None,
  })
}
