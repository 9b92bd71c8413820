//! Rate-limit handling around GitHub calls.

use std::future::Future;
use std::time::Duration;

use octocrab::Octocrab;

use crate::error::{AppError, Result};

pub const MAX_ATTEMPTS: u32 = 3;
pub const BASE_DELAY: Duration = Duration::from_secs(60);

/// Whether an octocrab error is GitHub refusing the call for rate limiting.
pub fn is_rate_limited(err: &octocrab::Error) -> bool {
    match err {
        octocrab::Error::GitHub { source, .. } => {
            let status = source.status_code.as_u16();
            status == 429
                || (status == 403 && source.message.to_lowercase().contains("rate limit"))
        }
        _ => false,
    }
}

/// Time to wait before the next attempt.
///
/// With a known reset time (epoch seconds) wait until then, but never less
/// than `base`. Otherwise back off linearly.
pub fn backoff_delay(attempt: u32, reset_at: Option<u64>, now: u64, base: Duration) -> Duration {
    match reset_at {
        Some(reset) => Duration::from_secs(reset.saturating_sub(now)).max(base),
        None => base * (attempt + 1),
    }
}

/// Translate an octocrab error into the crate error, naming the operation.
pub fn map_github_error(err: octocrab::Error, operation: &str) -> AppError {
    if is_rate_limited(&err) {
        return AppError::GitHubRateLimited(format!(
            "rate limit exceeded for {operation}; use a token with a higher limit or retry later"
        ));
    }

    match &err {
        octocrab::Error::GitHub { source, .. } => match source.status_code.as_u16() {
            401 => AppError::GitHubAuth(format!(
                "{operation}: check that GITHUB_TOKEN is valid and has the required permissions"
            )),
            404 => AppError::NotFound(format!(
                "GitHub resource for {operation}; the PR or repository may not exist or is not accessible"
            )),
            status => AppError::GitHubApi(format!(
                "{operation} failed: {status} - {}",
                source.message
            )),
        },
        _ => AppError::GitHubApi(format!("{operation} failed: {err}")),
    }
}

/// Run `call`, retrying up to [`MAX_ATTEMPTS`] times while GitHub reports a
/// rate limit.
pub async fn with_rate_limit_retry<T, F, Fut>(
    client: &Octocrab,
    operation: &str,
    mut call: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, octocrab::Error>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if is_rate_limited(&e) && attempt + 1 < MAX_ATTEMPTS => {
                let reset_at = match client.ratelimit().get().await {
                    Ok(limits) => Some(limits.rate.reset),
                    Err(_) => None,
                };
                let now = chrono::Utc::now().timestamp().max(0) as u64;
                let delay = backoff_delay(attempt, reset_at, now, BASE_DELAY);
                tracing::warn!(
                    operation,
                    attempt = attempt + 1,
                    max_attempts = MAX_ATTEMPTS,
                    wait_secs = delay.as_secs(),
                    "GitHub rate limit exceeded, waiting before retry"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(map_github_error(e, operation)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_uses_reset_when_later_than_base() {
        let delay = backoff_delay(0, Some(1_000 + 300), 1_000, BASE_DELAY);
        assert_eq!(delay, Duration::from_secs(300));
    }

    #[test]
    fn test_backoff_never_below_base() {
        let delay = backoff_delay(0, Some(1_010), 1_000, BASE_DELAY);
        assert_eq!(delay, BASE_DELAY);

        // Reset already in the past.
        let delay = backoff_delay(2, Some(900), 1_000, BASE_DELAY);
        assert_eq!(delay, BASE_DELAY);
    }

    #[test]
    fn test_backoff_linear_without_reset() {
        assert_eq!(backoff_delay(0, None, 0, BASE_DELAY), Duration::from_secs(60));
        assert_eq!(backoff_delay(1, None, 0, BASE_DELAY), Duration::from_secs(120));
        assert_eq!(backoff_delay(2, None, 0, BASE_DELAY), Duration::from_secs(180));
    }
}
