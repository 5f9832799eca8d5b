use std::future::Future;
use std::time::Duration;

use crate::error::LlmError;

const BASE_BACKOFF_SECS: u64 = 1;
const MAX_BACKOFF_SECS: u64 = 32;

/// Delay before the next attempt: `Retry-After` seconds when the server sends
/// them, otherwise exponential backoff capped at 32s.
pub(crate) fn retry_delay(response: &reqwest::Response, attempt: u32) -> Duration {
    if let Some(secs) = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
    {
        return Duration::from_secs(secs.min(MAX_BACKOFF_SECS));
    }
    backoff(attempt)
}

fn backoff(attempt: u32) -> Duration {
    let secs = BASE_BACKOFF_SECS
        .checked_shl(attempt)
        .unwrap_or(MAX_BACKOFF_SECS)
        .min(MAX_BACKOFF_SECS);
    Duration::from_secs(secs)
}

/// Send a request, retrying up to `max_retries` times while the server answers 429.
///
/// # Errors
///
/// Returns `LlmError::RateLimited` once retries are exhausted, or `LlmError::Http`
/// when the request itself fails.
pub(crate) async fn send_with_retry<F, Fut>(
    provider: &str,
    max_retries: u32,
    mut send: F,
) -> Result<reqwest::Response, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    for attempt in 0..=max_retries {
        let response = send().await?;
        if response.status() != reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Ok(response);
        }
        if attempt == max_retries {
            break;
        }
        let delay = retry_delay(&response, attempt);
        tracing::warn!(
            provider,
            attempt = attempt + 1,
            max_retries,
            delay_secs = delay.as_secs(),
            "rate limited, retrying"
        );
        tokio::time::sleep(delay).await;
    }
    Err(LlmError::RateLimited)
}
