//! Oura API v2 client and normalisation of its documents into ingestion
//! envelopes.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};
use vitals_core::event::{IngestEnvelope, OccurredAt, Provenance, Provider};

use crate::{Error, Result, http::read_json};

const PROVIDER: Provider = Provider::Oura;

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Page<T> {
  data:       Vec<T>,
  #[serde(default)]
  next_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OuraSleep {
  pub id:                   String,
  pub bedtime_start:        DateTime<FixedOffset>,
  pub bedtime_end:          DateTime<FixedOffset>,
  #[serde(default, rename = "type")]
  pub sleep_type:           Option<String>,
  /// Seconds.
  #[serde(default)]
  pub total_sleep_duration: Option<f64>,
  #[serde(default)]
  pub efficiency:           Option<f64>,
  /// Seconds.
  #[serde(default)]
  pub latency:              Option<f64>,
  #[serde(default)]
  pub average_hrv:          Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OuraDailyActivity {
  pub id:                          String,
  pub day:                         NaiveDate,
  #[serde(default)]
  pub steps:                       Option<u64>,
  /// Metres.
  #[serde(default)]
  pub equivalent_walking_distance: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OuraWorkout {
  pub id:             String,
  pub activity:       String,
  pub start_datetime: DateTime<FixedOffset>,
  pub end_datetime:   DateTime<FixedOffset>,
  #[serde(default)]
  pub calories:       Option<f64>,
}

// ─── Client ──────────────────────────────────────────────────────────────────

pub struct OuraClient {
  http:     Client,
  api_base: String,
}

impl OuraClient {
  pub fn new(http: Client, api_base: &str) -> Self {
    Self { http, api_base: api_base.trim_end_matches('/').to_owned() }
  }

  /// Fetch every supported document in `[start, end]` and normalise it.
  /// Any request failure fails the whole fetch.
  pub async fn fetch(
    &self,
    token: &str,
    start: NaiveDate,
    end: NaiveDate,
  ) -> Result<Vec<IngestEnvelope>> {
    let sleep: Vec<OuraSleep> = self.collection(token, "sleep", start, end).await?;
    let activity: Vec<OuraDailyActivity> =
      self.collection(token, "daily_activity", start, end).await?;
    let workouts: Vec<OuraWorkout> = self.collection(token, "workout", start, end).await?;

    tracing::debug!(
      sleep = sleep.len(),
      activity = activity.len(),
      workouts = workouts.len(),
      "fetched oura documents"
    );

    let mut out = Vec::new();
    for s in &sleep {
      out.extend(normalize_sleep(s));
    }
    out.extend(activity.iter().filter_map(normalize_activity));
    out.extend(workouts.iter().map(normalize_workout));
    Ok(out)
  }

  /// `GET /v2/usercollection/{name}`, following `next_token` to the end.
  async fn collection<T: DeserializeOwned>(
    &self,
    token: &str,
    name: &str,
    start: NaiveDate,
    end: NaiveDate,
  ) -> Result<Vec<T>> {
    let url = format!("{}/v2/usercollection/{name}", self.api_base);
    let mut items = Vec::new();
    let mut next: Option<String> = None;

    loop {
      let mut query = vec![
        ("start_date", start.to_string()),
        ("end_date", end.to_string()),
      ];
      if let Some(t) = &next {
        query.push(("next_token", t.clone()));
      }

      let resp = self
        .http
        .get(&url)
        .bearer_auth(token)
        .query(&query)
        .send()
        .await
        .map_err(|source| Error::Http { provider: PROVIDER, source })?;
      let page: Page<T> = read_json(PROVIDER, resp).await?;

      items.extend(page.data);
      match page.next_token.filter(|t| !t.is_empty()) {
        Some(t) => next = Some(t),
        None => break,
      }
    }
    Ok(items)
  }
}

// ─── Normalisation ───────────────────────────────────────────────────────────

/// An IANA `Etc/GMT±N` zone for a whole-hour UTC offset. Note the inverted
/// sign of the `Etc` names. Other offsets have no IANA equivalent.
pub fn offset_zone(offset: FixedOffset) -> Option<String> {
  let secs = offset.local_minus_utc();
  if secs % 3600 != 0 {
    return None;
  }
  Some(match secs / 3600 {
    0 => "UTC".to_owned(),
    h if h > 0 => format!("Etc/GMT-{h}"),
    h => format!("Etc/GMT+{}", -h),
  })
}

fn envelope(
  kind: &str,
  key: String,
  occurred_at: OccurredAt,
  time_zone: Option<String>,
  payload: Map<String, Value>,
) -> IngestEnvelope {
  IngestEnvelope {
    provider: PROVIDER.to_string(),
    kind: kind.to_owned(),
    occurred_at,
    time_zone,
    payload: Value::Object(payload),
    provenance: Some(Provenance::Backfill),
    correction_of_raw_event_id: None,
    uncertainty_state: None,
    idempotency_key: Some(key),
    schema_version: None,
  }
}

fn insert_opt(payload: &mut Map<String, Value>, key: &str, value: Option<f64>) {
  if let Some(v) = value {
    payload.insert(key.to_owned(), json!(v));
  }
}

/// A sleep period, plus an HRV event when the period reports one.
pub fn normalize_sleep(s: &OuraSleep) -> Vec<IngestEnvelope> {
  let occurred_at = OccurredAt::Range {
    start: s.bedtime_start.with_timezone(&Utc),
    end:   s.bedtime_end.with_timezone(&Utc),
  };
  let zone = offset_zone(*s.bedtime_start.offset());

  let total_minutes = s.total_sleep_duration.map_or_else(
    || (s.bedtime_end - s.bedtime_start).num_seconds() as f64 / 60.0,
    |secs| secs / 60.0,
  );
  let mut payload = Map::new();
  payload.insert("totalMinutes".into(), json!(total_minutes.max(0.0)));
  payload.insert(
    "isMainSleep".into(),
    json!(s.sleep_type.as_deref() == Some("long_sleep")),
  );
  insert_opt(&mut payload, "efficiency", s.efficiency);
  insert_opt(&mut payload, "latencyMinutes", s.latency.map(|secs| secs / 60.0));

  let mut out = vec![envelope(
    "sleep",
    s.id.clone(),
    occurred_at.clone(),
    zone.clone(),
    payload,
  )];

  if let Some(hrv) = s.average_hrv.filter(|v| *v > 0.0) {
    let mut payload = Map::new();
    payload.insert("rmssdMs".into(), json!(hrv));
    payload.insert("measurementType".into(), json!("sleep_average"));
    out.push(envelope("hrv", format!("{}-hrv", s.id), occurred_at, zone, payload));
  }
  out
}

/// Daily activity is anchored at midday UTC of its `day`, so it buckets to
/// that day without a zone.
pub fn normalize_activity(a: &OuraDailyActivity) -> Option<IngestEnvelope> {
  let steps = a.steps?;
  let mut payload = Map::new();
  payload.insert("steps".into(), json!(steps));
  insert_opt(
    &mut payload,
    "distanceKm",
    a.equivalent_walking_distance.map(|m| m / 1000.0),
  );
  let noon = a.day.and_time(NaiveTime::MIN) + chrono::Duration::hours(12);
  Some(envelope(
    "steps",
    a.id.clone(),
    OccurredAt::Instant(noon.and_utc()),
    None,
    payload,
  ))
}

pub fn normalize_workout(w: &OuraWorkout) -> IngestEnvelope {
  let minutes = (w.end_datetime - w.start_datetime).num_seconds().max(0) as f64 / 60.0;
  let mut payload = Map::new();
  payload.insert("sport".into(), json!(w.activity));
  payload.insert("durationMinutes".into(), json!(minutes));
  insert_opt(&mut payload, "caloriesKcal", w.calories);

  envelope(
    "workout",
    w.id.clone(),
    OccurredAt::Range {
      start: w.start_datetime.with_timezone(&Utc),
      end:   w.end_datetime.with_timezone(&Utc),
    },
    offset_zone(*w.start_datetime.offset()),
    payload,
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sleep_doc(value: Value) -> OuraSleep { serde_json::from_value(value).unwrap() }

  #[test]
  fn whole_hour_offsets_map_to_etc_zones() {
    let east = FixedOffset::east_opt(2 * 3600).unwrap();
    let west = FixedOffset::west_opt(5 * 3600).unwrap();
    assert_eq!(offset_zone(east).as_deref(), Some("Etc/GMT-2"));
    assert_eq!(offset_zone(west).as_deref(), Some("Etc/GMT+5"));
    assert_eq!(offset_zone(FixedOffset::east_opt(0).unwrap()).as_deref(), Some("UTC"));
    assert_eq!(offset_zone(FixedOffset::east_opt(19800).unwrap()), None);
  }

  #[test]
  fn long_sleep_is_main_sleep_with_hrv_split_out() {
    let s = sleep_doc(json!({
      "id": "s1",
      "bedtime_start": "2025-01-15T23:10:00-05:00",
      "bedtime_end": "2025-01-16T07:00:00-05:00",
      "type": "long_sleep",
      "total_sleep_duration": 25200,
      "efficiency": 88,
      "latency": 600,
      "average_hrv": 42
    }));
    let out = normalize_sleep(&s);
    assert_eq!(out.len(), 2);

    let sleep = &out[0];
    assert_eq!(sleep.kind, "sleep");
    assert_eq!(sleep.idempotency_key.as_deref(), Some("s1"));
    assert_eq!(sleep.time_zone.as_deref(), Some("Etc/GMT+5"));
    assert_eq!(sleep.payload["totalMinutes"], json!(420.0));
    assert_eq!(sleep.payload["isMainSleep"], json!(true));
    assert_eq!(sleep.payload["latencyMinutes"], json!(10.0));

    let hrv = &out[1];
    assert_eq!(hrv.kind, "hrv");
    assert_eq!(hrv.idempotency_key.as_deref(), Some("s1-hrv"));
    assert_eq!(hrv.payload["rmssdMs"], json!(42.0));
  }

  #[test]
  fn nap_without_hrv_yields_one_event() {
    let s = sleep_doc(json!({
      "id": "s2",
      "bedtime_start": "2025-01-15T14:00:00+00:00",
      "bedtime_end": "2025-01-15T14:30:00+00:00",
      "type": "sleep",
      "average_hrv": null
    }));
    let out = normalize_sleep(&s);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].payload["isMainSleep"], json!(false));
    assert_eq!(out[0].payload["totalMinutes"], json!(30.0));
  }

  #[test]
  fn activity_converts_metres_and_anchors_at_noon() {
    let a: OuraDailyActivity = serde_json::from_value(json!({
      "id": "a1",
      "day": "2025-01-15",
      "steps": 8123,
      "equivalent_walking_distance": 6400
    }))
    .unwrap();
    let env = normalize_activity(&a).unwrap();
    assert_eq!(env.payload["steps"], json!(8123));
    assert_eq!(env.payload["distanceKm"], json!(6.4));
    assert_eq!(env.occurred_at.start().to_rfc3339(), "2025-01-15T12:00:00+00:00");
  }

  #[test]
  fn workout_duration_comes_from_its_bounds() {
    let w: OuraWorkout = serde_json::from_value(json!({
      "id": "w1",
      "activity": "running",
      "start_datetime": "2025-01-15T07:00:00+01:00",
      "end_datetime": "2025-01-15T07:45:00+01:00",
      "calories": 512.5
    }))
    .unwrap();
    let env = normalize_workout(&w);
    assert_eq!(env.payload["durationMinutes"], json!(45.0));
    assert_eq!(env.payload["sport"], json!("running"));
    assert_eq!(env.provenance, Some(Provenance::Backfill));
  }
}
