use tracing::info;

use super::FetchError;
use crate::consts::APP_NAME;

/// Download `url` fully into memory.
///
/// Any transport error or non-success status is fatal.
pub fn download(url: &str) -> Result<Vec<u8>, FetchError> {
  info!(url = %url, "downloading sources");

  let http_err = |e: reqwest::Error| FetchError::Http {
    url: url.to_string(),
    message: e.to_string(),
  };

  let client = reqwest::blocking::Client::builder()
    .user_agent(format!("{}/{}", APP_NAME, env!("CARGO_PKG_VERSION")))
    .timeout(None::<std::time::Duration>)
    .build()
    .map_err(http_err)?;
  let response = client.get(url).send().map_err(http_err)?;

  if !response.status().is_success() {
    return Err(FetchError::Http {
      url: url.to_string(),
      message: format!("HTTP {}", response.status()),
    });
  }

  let bytes = response.bytes().map_err(http_err)?;
  info!(size = bytes.len(), "download complete");

  Ok(bytes.to_vec())
}
