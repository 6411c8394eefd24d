//! Exponential backoff with full jitter, and the retry loop built on top of
//! it.

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    pub base_ms: u64,
    pub max_backoff_ms: u64,
    pub max_retries: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: 100,
            max_backoff_ms: 30_000,
            max_retries: 10,
        }
    }
}

/// Computes the delay before attempt number `retry_number` (0-indexed).
/// Attempt 0 never waits; attempt N waits a uniformly random duration in
/// `[0, min(max_backoff, base * 2^(N-1))]`.
pub fn backoff_for(config: &BackoffConfig, retry_number: u32) -> Duration {
    if retry_number == 0 {
        return Duration::ZERO;
    }

    let exponent = retry_number - 1;
    let backoff_ms = (config.base_ms as f64) * 2f64.powi(exponent as i32);
    let capped = backoff_ms.round().min(config.max_backoff_ms as f64) as u64;

    let jittered = if capped == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..=capped)
    };

    Duration::from_millis(jittered)
}

/// Whether a failed action should be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retry {
    Yes,
    No,
}

/// Repeatedly runs `action`, sleeping for the configured backoff between
/// attempts, until either `action` returns [`Retry::No`] or the retry
/// budget in `config` is exhausted.
pub async fn retry_with_backoff<F, Fut>(config: &BackoffConfig, mut action: F)
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Retry>,
{
    let mut retry_number = 0;
    loop {
        if retry_number >= config.max_retries {
            return;
        }

        let delay = backoff_for(config, retry_number);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match action(retry_number).await {
            Retry::No => return,
            Retry::Yes => {
                retry_number += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_has_no_delay() {
        let config = BackoffConfig::default();
        assert_eq!(backoff_for(&config, 0), Duration::ZERO);
    }

    #[test]
    fn delay_never_exceeds_the_cap() {
        let config = BackoffConfig {
            base_ms: 100,
            max_backoff_ms: 1_000,
            max_retries: 10,
        };
        for retry_number in 1..20 {
            let delay = backoff_for(&config, retry_number);
            assert!(delay <= Duration::from_millis(1_000));
        }
    }

    #[tokio::test]
    async fn retry_loop_stops_when_action_says_no() {
        let config = BackoffConfig {
            base_ms: 1,
            max_backoff_ms: 1,
            max_retries: 10,
        };
        let mut attempts = 0;
        retry_with_backoff(&config, |_| {
            attempts += 1;
            let done = attempts >= 3;
            async move { if done { Retry::No } else { Retry::Yes } }
        })
        .await;
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn retry_loop_stops_at_max_retries() {
        let config = BackoffConfig {
            base_ms: 1,
            max_backoff_ms: 1,
            max_retries: 3,
        };
        let mut attempts = 0;
        retry_with_backoff(&config, |_| {
            attempts += 1;
            async { Retry::Yes }
        })
        .await;
        assert_eq!(attempts, 3);
    }
}
