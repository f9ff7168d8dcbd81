//! Rate-limit-aware HTTP fetcher
//!
//! All outbound geocoding requests go through [`fetch_with_retry`] so that
//! every request carries the identifying User-Agent and gets consistent
//! handling of throttling responses:
//!
//! - HTTP 429: wait for `Retry-After` (seconds) when present, otherwise
//!   exponential backoff (`initial_delay * 2^attempt`), then retry.
//! - Other non-success statuses: fail immediately, they are permanent.
//! - Network-level failures: retry with the same backoff schedule.
//!
//! Waits are `tokio::time::sleep` — no thread is parked, and concurrent
//! callers back off independently.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use tracing::warn;

use crate::error::FetchError;

/// Identifying User-Agent sent on every outbound request. Nominatim's usage
/// policy requires callers to identify themselves.
pub const USER_AGENT: &str = "Foodshare/1.0 (https://foodshare.club)";

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1000);

/// Build the shared HTTP client used for all geocoding requests.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .expect("Failed to create HTTP client")
}

/// Backoff delay before retry number `attempt` (0-based).
fn backoff_delay(initial_delay: Duration, attempt: u32) -> Duration {
    initial_delay * 2u32.saturating_pow(attempt)
}

/// Parse a `Retry-After` header given in seconds.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// GET `url`, retrying on throttling and network failures.
///
/// Returns the first successful response, `FetchError::Status` on any other
/// non-success status, or `FetchError::Exhausted` once `max_retries`
/// attempts have been consumed.
pub async fn fetch_with_retry(
    client: &reqwest::Client,
    url: &str,
    max_retries: u32,
    initial_delay: Duration,
) -> Result<reqwest::Response, FetchError> {
    let mut last_failure = String::new();

    for attempt in 0..max_retries {
        match client.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }

                if status == StatusCode::TOO_MANY_REQUESTS {
                    let delay = retry_after(response.headers())
                        .unwrap_or_else(|| backoff_delay(initial_delay, attempt));
                    warn!(
                        attempt = attempt + 1,
                        max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "rate limited by geocoding service, backing off"
                    );
                    last_failure = "HTTP 429 Too Many Requests".to_string();
                    tokio::time::sleep(delay).await;
                    continue;
                }

                // Anything else is permanent as far as retrying goes.
                return Err(FetchError::Status {
                    status: status.as_u16(),
                });
            }
            Err(e) => {
                warn!(attempt = attempt + 1, max_retries, error = %e, "request attempt failed");
                last_failure = e.to_string();
                if attempt + 1 == max_retries {
                    break;
                }
                tokio::time::sleep(backoff_delay(initial_delay, attempt)).await;
            }
        }
    }

    Err(FetchError::Exhausted {
        attempts: max_retries,
        message: last_failure,
    })
}
