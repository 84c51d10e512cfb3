//! Per-kind payload guards. Each reads and validates every field it needs
//! before building the typed body.

use vitals_core::canonical::{
  HrvFields, NutritionFields, SleepFields, StepsFields, StrengthExercise,
  StrengthFields, StrengthSet, WeightFields, WorkoutFields,
};

use super::{
  Rejection,
  reader::{Bound, Fields},
};

type Parsed<T> = Result<T, Rejection>;

pub fn sleep(f: &Fields<'_>) -> Parsed<SleepFields> {
  Ok(SleepFields {
    total_minutes:   f.f64("totalMinutes", Bound::NonNegative)?,
    is_main_sleep:   f.bool_or("isMainSleep", false)?,
    efficiency:      f.opt_f64("efficiency", Bound::Within(0.0, 100.0))?,
    latency_minutes: f.opt_f64("latencyMinutes", Bound::NonNegative)?,
    awakenings:      f.opt_u32("awakenings")?,
  })
}

pub fn steps(f: &Fields<'_>) -> Parsed<StepsFields> {
  Ok(StepsFields {
    steps:       f.u64("steps")?,
    distance_km: f.opt_f64("distanceKm", Bound::NonNegative)?,
  })
}

pub fn workout(f: &Fields<'_>) -> Parsed<WorkoutFields> {
  Ok(WorkoutFields {
    sport:            f.text("sport")?,
    duration_minutes: f.f64("durationMinutes", Bound::NonNegative)?,
    training_load:    f.opt_f64("trainingLoad", Bound::NonNegative)?,
    calories_kcal:    f.opt_f64("caloriesKcal", Bound::NonNegative)?,
    avg_heart_rate:   f.opt_f64("avgHeartRate", Bound::Positive)?,
  })
}

pub fn weight(f: &Fields<'_>) -> Parsed<WeightFields> {
  Ok(WeightFields {
    weight_kg:        f.f64("weightKg", Bound::Positive)?,
    body_fat_percent: f.opt_f64("bodyFatPercent", Bound::Within(0.0, 100.0))?,
  })
}

pub fn hrv(f: &Fields<'_>) -> Parsed<HrvFields> {
  Ok(HrvFields {
    rmssd_ms:         f.f64("rmssdMs", Bound::Positive)?,
    measurement_type: f.opt_str("measurementType")?,
  })
}

pub fn nutrition(f: &Fields<'_>) -> Parsed<NutritionFields> {
  Ok(NutritionFields {
    total_kcal: f.f64("totalKcal", Bound::NonNegative)?,
    protein_g:  f.opt_f64("proteinG", Bound::NonNegative)?,
    carbs_g:    f.opt_f64("carbsG", Bound::NonNegative)?,
    fat_g:      f.opt_f64("fatG", Bound::NonNegative)?,
  })
}

pub fn strength(f: &Fields<'_>) -> Parsed<StrengthFields> {
  let exercises = f
    .objects("exercises")?
    .iter()
    .map(|ex| -> Parsed<StrengthExercise> {
      let sets = ex
        .objects("sets")?
        .iter()
        .map(|set| -> Parsed<StrengthSet> {
          let reps = set.u64("reps")?;
          let reps = u32::try_from(reps)
            .ok()
            .filter(|r| *r >= 1)
            .ok_or_else(|| Rejection::malformed(set.path("reps"), "must be an integer >= 1"))?;
          Ok(StrengthSet {
            reps,
            load_kg: set.f64("loadKg", Bound::NonNegative)?,
            rpe: set.opt_f64("rpe", Bound::Within(0.0, 10.0))?,
          })
        })
        .collect::<Parsed<Vec<_>>>()?;
      Ok(StrengthExercise { name: ex.text("name")?, sets })
    })
    .collect::<Parsed<Vec<_>>>()?;

  Ok(StrengthFields { exercises })
}
