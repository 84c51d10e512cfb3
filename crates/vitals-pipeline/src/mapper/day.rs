//! Calendar-day bucketing in the event's own time zone.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

/// Resolve an IANA zone name. `"UTC"` is accepted in any case.
pub fn resolve_zone(name: &str) -> Option<Tz> {
  let name = name.trim();
  if name.eq_ignore_ascii_case("utc") {
    return Some(Tz::UTC);
  }
  name.parse::<Tz>().ok()
}

/// The `YYYY-MM-DD` day on which `start` falls in `zone`, and the zone name
/// actually used. An absent or unknown zone falls back to UTC.
pub fn day_for(start: DateTime<Utc>, zone: Option<&str>) -> (NaiveDate, String) {
  match zone.and_then(resolve_zone) {
    Some(tz) => (start.with_timezone(&tz).date_naive(), tz.name().to_owned()),
    None => (start.date_naive(), "UTC".to_owned()),
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn ymd(y: i32, m: u32, d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, d).unwrap() }

  #[test]
  fn late_evening_in_new_york_stays_on_the_local_day() {
    let start = Utc.with_ymd_and_hms(2025, 1, 15, 23, 50, 0).unwrap();
    let (day, tz) = day_for(start, Some("America/New_York"));
    assert_eq!(day, ymd(2025, 1, 15));
    assert_eq!(tz, "America/New_York");
  }

  #[test]
  fn zone_ahead_of_utc_moves_to_the_next_day() {
    let start = Utc.with_ymd_and_hms(2025, 1, 15, 23, 50, 0).unwrap();
    let (day, _) = day_for(start, Some("Europe/Berlin"));
    assert_eq!(day, ymd(2025, 1, 16));
  }

  #[test]
  fn invalid_or_missing_zone_falls_back_to_utc() {
    let start = Utc.with_ymd_and_hms(2025, 1, 15, 23, 50, 0).unwrap();
    assert_eq!(day_for(start, Some("Mars/Olympus")), (ymd(2025, 1, 15), "UTC".into()));
    assert_eq!(day_for(start, None), (ymd(2025, 1, 15), "UTC".into()));
    assert_eq!(day_for(start, Some("utc")).1, "UTC");
  }
}
