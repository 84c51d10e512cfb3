//! The daily facts aggregator.
//!
//! Folds one user's canonical events for one day into a [`DailyFacts`]
//! document. The fold is deterministic: events are sorted by `(start, id)`
//! first, so neither input order nor float summation order can change the
//! output. A field is present only when at least one event contributed to it.
//! An event named by a correction bucketed to the same day is left out, so a
//! correction replaces its original instead of adding to it.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use vitals_core::{
  PIPELINE_VERSION, SCHEMA_VERSION,
  canonical::{CanonicalBody, CanonicalEvent, WeightFields},
  event::UncertaintyState,
  facts::{
    ActivityFacts, BodyFacts, DailyFacts, Domain, FactsMeta, NutritionFacts,
    RecoveryFacts, SleepFacts, StrengthFacts,
  },
};

// ─── Accumulators ────────────────────────────────────────────────────────────

/// A sum that stays absent until something is added to it.
#[derive(Debug, Default, Clone, Copy)]
struct Sum(Option<f64>);

impl Sum {
  fn add(&mut self, v: f64) { self.0 = Some(self.0.unwrap_or(0.0) + v); }

  fn add_opt(&mut self, v: Option<f64>) {
    if let Some(v) = v {
      self.add(v);
    }
  }

  fn get(self) -> Option<f64> { self.0 }
}

#[derive(Debug, Default, Clone, Copy)]
struct Count(Option<u64>);

impl Count {
  fn add(&mut self, v: u64) { self.0 = Some(self.0.unwrap_or(0).saturating_add(v)); }

  fn get(self) -> Option<u64> { self.0 }

  fn get_u32(self) -> Option<u32> {
    self.0.map(|n| u32::try_from(n).unwrap_or(u32::MAX))
  }
}

#[derive(Debug, Default, Clone, Copy)]
struct Mean {
  sum: f64,
  n:   u32,
}

impl Mean {
  fn add(&mut self, v: f64) {
    self.sum += v;
    self.n += 1;
  }

  fn add_opt(&mut self, v: Option<f64>) {
    if let Some(v) = v {
      self.add(v);
    }
  }

  fn get(self) -> Option<f64> { (self.n > 0).then(|| self.sum / f64::from(self.n)) }
}

/// Per-domain confidence: the mean uncertainty weight of contributors.
#[derive(Debug, Default)]
struct Confidence(BTreeMap<Domain, Mean>);

impl Confidence {
  fn note(&mut self, domain: Domain, state: UncertaintyState) {
    self.0.entry(domain).or_default().add(state.weight());
  }

  fn finish(self, present: &[Domain]) -> BTreeMap<Domain, f64> {
    self
      .0
      .into_iter()
      .filter(|(d, _)| present.contains(d))
      .filter_map(|(d, m)| m.get().map(|v| (d, round3(v))))
      .collect()
  }
}

fn round3(v: f64) -> f64 { (v * 1000.0).round() / 1000.0 }

// ─── Folds ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct SleepFold {
  total:      Sum,
  main:       Sum,
  efficiency: Mean,
  latency:    Mean,
  awakenings: Count,
}

impl SleepFold {
  fn finish(self) -> Option<SleepFacts> {
    let total_minutes = self.total.get()?;
    Some(SleepFacts {
      total_minutes:      Some(total_minutes),
      main_sleep_minutes: self.main.get(),
      efficiency:         self.efficiency.get(),
      latency_minutes:    self.latency.get(),
      awakenings:         self.awakenings.get_u32(),
    })
  }
}

#[derive(Default)]
struct ActivityFold {
  steps:           Count,
  distance:        Sum,
  load:            Sum,
  workout_minutes: Sum,
  workouts:        Count,
}

impl ActivityFold {
  fn finish(self) -> Option<ActivityFacts> {
    let facts = ActivityFacts {
      steps:           self.steps.get(),
      distance_km:     self.distance.get(),
      training_load:   self.load.get(),
      workout_minutes: self.workout_minutes.get(),
      workout_count:   self.workouts.get_u32(),
    };
    (facts != ActivityFacts::default()).then_some(facts)
  }
}

#[derive(Default)]
struct NutritionFold {
  kcal:    Sum,
  protein: Sum,
  carbs:   Sum,
  fat:     Sum,
}

impl NutritionFold {
  fn finish(self) -> Option<NutritionFacts> {
    let total_kcal = self.kcal.get()?;
    Some(NutritionFacts {
      total_kcal: Some(total_kcal),
      protein_g:  self.protein.get(),
      carbs_g:    self.carbs.get(),
      fat_g:      self.fat.get(),
    })
  }
}

#[derive(Default)]
struct StrengthFold {
  sets:      Count,
  reps:      Count,
  volume:    Sum,
  exercises: Count,
}

impl StrengthFold {
  fn finish(self) -> Option<StrengthFacts> {
    let exercise_count = self.exercises.get_u32()?;
    Some(StrengthFacts {
      total_sets:      self.sets.get_u32(),
      total_reps:      self.reps.get_u32(),
      total_volume_kg: self.volume.get(),
      exercise_count:  Some(exercise_count),
    })
  }
}

// ─── Aggregate ───────────────────────────────────────────────────────────────

/// Fold the events of `(user_id, date)` into daily facts. Events for other
/// users or days are ignored.
pub fn aggregate(
  user_id: &str,
  date: NaiveDate,
  computed_at: DateTime<Utc>,
  events: &[CanonicalEvent],
) -> DailyFacts {
  aggregate_with_history(user_id, date, computed_at, events, &[])
}

/// Like [`aggregate`], additionally deriving `recovery.hrvBaselineMs` from
/// the HRV of days before `date` found in `history`.
pub fn aggregate_with_history(
  user_id: &str,
  date: NaiveDate,
  computed_at: DateTime<Utc>,
  events: &[CanonicalEvent],
  history: &[DailyFacts],
) -> DailyFacts {
  let on_day = |e: &CanonicalEvent| e.user_id == user_id && e.day == date;
  // A correction replaces the event it points at.
  let corrected: HashSet<&str> = events
    .iter()
    .filter(|e| on_day(e))
    .filter_map(|e| e.correction_of_raw_event_id.as_deref())
    .collect();
  let mut events: Vec<&CanonicalEvent> = events
    .iter()
    .filter(|e| on_day(e) && !corrected.contains(e.id.as_str()))
    .collect();
  events.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));

  let mut sleep = SleepFold::default();
  let mut activity = ActivityFold::default();
  let mut nutrition = NutritionFold::default();
  let mut strength = StrengthFold::default();
  let mut hrv = Mean::default();
  let mut confidence = Confidence::default();
  // Latest wins: compare fixed-width ISO strings; ties go to the later event.
  let mut latest_weight: Option<(String, &WeightFields, UncertaintyState)> = None;

  for event in &events {
    let state = event.uncertainty_state;
    match &event.body {
      CanonicalBody::Sleep(s) => {
        sleep.total.add(s.total_minutes);
        if s.is_main_sleep {
          sleep.main.add(s.total_minutes);
        }
        sleep.efficiency.add_opt(s.efficiency);
        sleep.latency.add_opt(s.latency_minutes);
        if let Some(n) = s.awakenings {
          sleep.awakenings.add(u64::from(n));
        }
        confidence.note(Domain::Sleep, state);
      }
      CanonicalBody::Steps(s) => {
        activity.steps.add(s.steps);
        activity.distance.add_opt(s.distance_km);
        confidence.note(Domain::Activity, state);
      }
      CanonicalBody::Workout(w) => {
        activity.load.add_opt(w.training_load);
        activity.workout_minutes.add(w.duration_minutes);
        activity.workouts.add(1);
        confidence.note(Domain::Activity, state);
      }
      CanonicalBody::Weight(w) => {
        let iso = event.start_iso();
        let newer = latest_weight
          .as_ref()
          .is_none_or(|(best, ..)| iso.as_str() >= best.as_str());
        if newer {
          latest_weight = Some((iso, w, state));
        }
      }
      CanonicalBody::Hrv(h) => {
        hrv.add(h.rmssd_ms);
        confidence.note(Domain::Recovery, state);
      }
      CanonicalBody::Nutrition(n) => {
        nutrition.kcal.add(n.total_kcal);
        nutrition.protein.add_opt(n.protein_g);
        nutrition.carbs.add_opt(n.carbs_g);
        nutrition.fat.add_opt(n.fat_g);
        confidence.note(Domain::Nutrition, state);
      }
      CanonicalBody::StrengthWorkout(s) => {
        for exercise in &s.exercises {
          strength.exercises.add(1);
          for set in &exercise.sets {
            strength.sets.add(1);
            strength.reps.add(u64::from(set.reps));
            strength.volume.add(f64::from(set.reps) * set.load_kg);
          }
        }
        confidence.note(Domain::Strength, state);
      }
    }
  }

  let body = latest_weight.map(|(_, w, state)| {
    confidence.note(Domain::Body, state);
    BodyFacts {
      weight_kg:        w.weight_kg,
      body_fat_percent: w.body_fat_percent,
    }
  });

  let recovery = hrv.get().map(|rmssd| RecoveryFacts {
    hrv_rmssd_ms:     Some(rmssd),
    hrv_sample_count: Some(hrv.n),
    hrv_baseline_ms:  hrv_baseline(user_id, date, history),
  });

  let mut facts = DailyFacts {
    user_id: user_id.to_owned(),
    date,
    schema_version: SCHEMA_VERSION,
    sleep: sleep.finish(),
    activity: activity.finish(),
    body,
    recovery,
    nutrition: nutrition.finish(),
    strength: strength.finish(),
    confidence: BTreeMap::new(),
    meta: FactsMeta {
      events_count:              u32::try_from(events.len()).unwrap_or(u32::MAX),
      latest_canonical_event_at: events.iter().map(|e| e.created_at).max(),
      source_ids:                events
        .iter()
        .map(|e| e.source_id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect(),
    },
    computed_at,
    pipeline_version: PIPELINE_VERSION,
  };
  facts.confidence = confidence.finish(&facts.present_domains());
  facts
}

/// Mean HRV of the user's days strictly before `date`.
fn hrv_baseline(user_id: &str, date: NaiveDate, history: &[DailyFacts]) -> Option<f64> {
  let mut prior: Vec<&DailyFacts> = history
    .iter()
    .filter(|f| f.user_id == user_id && f.date < date)
    .collect();
  prior.sort_by_key(|f| f.date);

  let mut mean = Mean::default();
  for f in prior {
    mean.add_opt(f.recovery.as_ref().and_then(|r| r.hrv_rmssd_ms));
  }
  mean.get()
}
