//! Shared response handling for provider requests.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use vitals_core::event::Provider;

use crate::{Error, Result};

/// The HTTP client used for every provider call.
pub fn client() -> Result<Client> {
  Client::builder()
    .timeout(Duration::from_secs(30))
    .build()
    .map_err(Error::Client)
}

/// Decode a successful JSON response; any non-2xx status is a provider error
/// carrying the body text.
pub async fn read_json<T: DeserializeOwned>(provider: Provider, resp: Response) -> Result<T> {
  let status = resp.status();
  if !status.is_success() {
    let body = resp.text().await.unwrap_or_default();
    return Err(Error::ProviderStatus { provider, status: status.as_u16(), body });
  }
  resp
    .json()
    .await
    .map_err(|source| Error::Http { provider, source })
}
