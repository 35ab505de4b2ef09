//! Blocking JSON POST with retry for OpenAI-compatible endpoints
//!
//! - HTTP 429 and 5xx are retried with exponential backoff (1s, 2s, 4s, ... capped at 32s)
//! - other 4xx fail immediately
//! - network errors and timeouts are retried

use anyhow::{Result, bail};
use std::time::Duration;

pub(crate) fn build_client(timeout_secs: u64) -> Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

pub(crate) fn post_json_with_retry(
    client: &reqwest::blocking::Client,
    url: &str,
    api_key: &str,
    body: &serde_json::Value,
    max_retries: u32,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::debug!("Retrying {} in {:?} (attempt {})", url, delay, attempt + 1);
            std::thread::sleep(delay);
        }

        let resp = client
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send();

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json()?);
                }

                let body_text = response.text().unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    tracing::warn!("API error {} from {}, will retry", status, url);
                    last_err = Some(anyhow::anyhow!("API error {}: {}", status, body_text));
                    continue;
                }

                bail!("API error {}: {}", status, body_text);
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Request failed after retries")))
}
