use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Bounded retry schedule for flaky handshake steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
    /// Time each attempt may take.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    /// Ten attempts, one second apart, each given one second.
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Run `attempt` until it succeeds or the attempts run out.
    ///
    /// `attempt` receives the per-attempt timeout. The last error is returned on exhaustion.
    pub async fn run<T, E: Display, Fut: Future<Output = Result<T, E>>>(
        &self,
        what: &str,
        mut attempt: impl FnMut(Duration) -> Fut,
    ) -> Result<T, E> {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt_no = 1;

        loop {
            tracing::debug!(attempt = attempt_no, max_attempts, "{what}");

            match attempt(self.attempt_timeout).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt_no >= max_attempts => {
                    tracing::error!(%err, attempts = attempt_no, "{what}: giving up");
                    return Err(err);
                }
                Err(err) => {
                    tracing::warn!(%err, attempt = attempt_no, "{what}: retrying");
                    tokio::time::sleep(self.delay).await;
                    attempt_no += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result = RetryPolicy::default()
            .run("failing step", |_timeout| {
                _ = calls.fetch_add(1, Ordering::Relaxed);
                async { Err::<(), _>("nope") }
            })
            .await;

        assert_eq!(result, Err("nope"));
        assert_eq!(calls.load(Ordering::Relaxed), 10);
        // Nine pauses between ten attempts.
        assert_eq!(started.elapsed(), Duration::from_secs(9));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_first_success() {
        let calls = AtomicU32::new(0);

        let result = RetryPolicy::default()
            .run("flaky step", |timeout| {
                let call = calls.fetch_add(1, Ordering::Relaxed);
                async move {
                    assert_eq!(timeout, Duration::from_secs(1));
                    if call < 2 { Err("not yet") } else { Ok(call) }
                }
            })
            .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_tries_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        let calls = AtomicU32::new(0);

        let result = policy
            .run("single step", |_timeout| {
                _ = calls.fetch_add(1, Ordering::Relaxed);
                async { Err::<(), _>("nope") }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }
}
