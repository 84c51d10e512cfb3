//! Provider integration settings. A provider whose table is absent is "not
//! configured".

use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
  pub oura:     Option<OuraConfig>,
  pub withings: Option<WithingsConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OuraConfig {
  #[serde(default = "OuraConfig::default_api_base")]
  pub api_base:       String,
  /// Shared secret for webhook signatures.
  #[serde(default)]
  pub webhook_secret: Option<String>,
}

impl OuraConfig {
  fn default_api_base() -> String { "https://api.ouraring.com".to_owned() }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WithingsConfig {
  #[serde(default = "WithingsConfig::default_api_base")]
  pub api_base: String,
}

impl WithingsConfig {
  fn default_api_base() -> String { "https://wbsapi.withings.net".to_owned() }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ResyncConfig {
  /// Days of history to pull, ending today.
  pub days:       u32,
  /// Raw events per write batch.
  pub chunk_size: usize,
}

impl Default for ResyncConfig {
  fn default() -> Self { Self { days: 30, chunk_size: 450 } }
}
