//! Typed, path-aware field access over an opaque JSON payload.
//!
//! Every accessor checks shape and range before handing a value out, and
//! reports the offending path on failure. `null` is treated as absent.

use serde_json::{Map, Value};

use super::Rejection;

/// Accepted range for a numeric field.
#[derive(Debug, Clone, Copy)]
pub enum Bound {
  NonNegative,
  Positive,
  /// Inclusive on both ends.
  Within(f64, f64),
}

impl Bound {
  fn admits(self, v: f64) -> bool {
    match self {
      Self::NonNegative => v >= 0.0,
      Self::Positive => v > 0.0,
      Self::Within(lo, hi) => (lo..=hi).contains(&v),
    }
  }

  fn describe(self) -> String {
    match self {
      Self::NonNegative => "must be >= 0".to_owned(),
      Self::Positive => "must be > 0".to_owned(),
      Self::Within(lo, hi) => format!("must be between {lo} and {hi}"),
    }
  }
}

pub struct Fields<'a> {
  obj:    &'a Map<String, Value>,
  prefix: String,
}

impl<'a> Fields<'a> {
  /// The payload root. Anything other than a JSON object is malformed.
  pub fn root(payload: &'a Value) -> Result<Self, Rejection> {
    Self::at(payload, String::new())
  }

  fn at(value: &'a Value, prefix: String) -> Result<Self, Rejection> {
    match value {
      Value::Object(obj) => Ok(Self { obj, prefix }),
      _ => {
        let path = if prefix.is_empty() { "payload".to_owned() } else { prefix };
        Err(Rejection::malformed(path, "expected an object"))
      }
    }
  }

  pub fn path(&self, key: &str) -> String {
    if self.prefix.is_empty() {
      key.to_owned()
    } else {
      format!("{}.{key}", self.prefix)
    }
  }

  fn get(&self, key: &str) -> Option<&'a Value> {
    self.obj.get(key).filter(|v| !v.is_null())
  }

  fn missing(&self, key: &str) -> Rejection {
    Rejection::malformed(self.path(key), "required field is missing")
  }

  // ── Numbers ───────────────────────────────────────────────────────────────

  pub fn opt_f64(&self, key: &str, bound: Bound) -> Result<Option<f64>, Rejection> {
    let Some(value) = self.get(key) else {
      return Ok(None);
    };
    let n = value
      .as_f64()
      .filter(|n| n.is_finite())
      .ok_or_else(|| Rejection::malformed(self.path(key), "expected a number"))?;
    if !bound.admits(n) {
      return Err(Rejection::malformed(self.path(key), bound.describe()));
    }
    Ok(Some(n))
  }

  pub fn f64(&self, key: &str, bound: Bound) -> Result<f64, Rejection> {
    self.opt_f64(key, bound)?.ok_or_else(|| self.missing(key))
  }

  /// A non-negative integer. Integral floats such as `12.0` are accepted.
  pub fn opt_u64(&self, key: &str) -> Result<Option<u64>, Rejection> {
    let Some(value) = self.get(key) else {
      return Ok(None);
    };
    if let Some(n) = value.as_u64() {
      return Ok(Some(n));
    }
    match value.as_f64() {
      Some(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => {
        Ok(Some(f as u64))
      }
      _ => Err(Rejection::malformed(
        self.path(key),
        "expected a non-negative integer",
      )),
    }
  }

  pub fn u64(&self, key: &str) -> Result<u64, Rejection> {
    self.opt_u64(key)?.ok_or_else(|| self.missing(key))
  }

  pub fn opt_u32(&self, key: &str) -> Result<Option<u32>, Rejection> {
    self
      .opt_u64(key)?
      .map(|n| {
        u32::try_from(n)
          .map_err(|_| Rejection::malformed(self.path(key), "integer out of range"))
      })
      .transpose()
  }

  // ── Other scalars ─────────────────────────────────────────────────────────

  pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, Rejection> {
    match self.get(key) {
      None => Ok(default),
      Some(Value::Bool(b)) => Ok(*b),
      Some(_) => Err(Rejection::malformed(self.path(key), "expected a boolean")),
    }
  }

  pub fn opt_str(&self, key: &str) -> Result<Option<String>, Rejection> {
    match self.get(key) {
      None => Ok(None),
      Some(Value::String(s)) => Ok(Some(s.clone())),
      Some(_) => Err(Rejection::malformed(self.path(key), "expected a string")),
    }
  }

  /// A required string that is non-empty after trimming.
  pub fn text(&self, key: &str) -> Result<String, Rejection> {
    let s = self.opt_str(key)?.ok_or_else(|| self.missing(key))?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
      return Err(Rejection::malformed(self.path(key), "must not be empty"));
    }
    Ok(trimmed.to_owned())
  }

  // ── Nesting ───────────────────────────────────────────────────────────────

  /// The elements of a required, non-empty array of objects.
  pub fn objects(&self, key: &str) -> Result<Vec<Fields<'a>>, Rejection> {
    let items = match self.get(key) {
      None => return Err(self.missing(key)),
      Some(Value::Array(items)) => items,
      Some(_) => {
        return Err(Rejection::malformed(self.path(key), "expected an array"));
      }
    };
    if items.is_empty() {
      return Err(Rejection::malformed(self.path(key), "must not be empty"));
    }
    items
      .iter()
      .enumerate()
      .map(|(i, item)| Fields::at(item, format!("{}[{i}]", self.path(key))))
      .collect()
  }
}
