//! Bounded retry and request pacing shared by every network call.

use std::fmt::Display;
use std::future::Future;
use std::iter::Take;
use std::time::Duration;
use tokio::time::sleep;
use tokio_retry::Retry;
use tokio_retry::strategy::FixedInterval;
use tracing::warn;

/// Up to `max_attempts` tries with a fixed pause between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pauses taken between attempts; one fewer than the attempt count.
    fn schedule(&self) -> Take<FixedInterval> {
        FixedInterval::new(self.delay).take(self.max_attempts as usize - 1)
    }

    /// Run `action` until it succeeds or the attempts run out, returning the
    /// last error in the latter case.
    pub async fn run<T, E, A, Fut>(&self, label: &str, mut action: A) -> Result<T, E>
    where
        A: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max = self.max_attempts;
        let mut attempt = 0u32;

        Retry::start(self.schedule(), || {
            attempt += 1;
            let n = attempt;
            let fut = action();
            async move {
                fut.await.inspect_err(|e| {
                    warn!("{}: attempt {}/{} failed: {}", label, n, max, e);
                })
            }
        })
        .await
    }
}

/// Random politeness delay between consecutive requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    min: Duration,
    max: Duration,
}

impl Pacing {
    pub fn between(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    pub fn none() -> Self {
        Self::between(Duration::ZERO, Duration::ZERO)
    }

    /// Uniform in `[min, max)`; exactly `min` when the range is empty.
    pub fn next_delay(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let secs = rand::random_range(self.min.as_secs_f64()..self.max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }

    pub async fn pause(&self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn retries_until_success() {
        let calls = Cell::new(0u32);
        let policy = RetryPolicy::fixed(3, Duration::ZERO);

        let out: Result<&str, String> = policy
            .run("flaky", || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move { if n < 3 { Err(format!("boom {n}")) } else { Ok("ok") } }
            })
            .await;

        assert_eq!(out, Ok("ok"));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = Cell::new(0u32);
        let policy = RetryPolicy::fixed(3, Duration::ZERO);

        let out: Result<(), String> = policy
            .run("dead", || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move { Err(format!("boom {n}")) }
            })
            .await;

        assert_eq!(out, Err("boom 3".to_string()));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let policy = RetryPolicy::fixed(0, Duration::from_secs(2));
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.schedule().count(), 0);
    }

    #[test]
    fn schedule_is_fixed_interval() {
        let policy = RetryPolicy::fixed(3, Duration::from_secs(2));
        let pauses: Vec<Duration> = policy.schedule().collect();
        assert_eq!(pauses, vec![Duration::from_secs(2); 2]);
    }

    #[test]
    fn pacing_stays_in_range() {
        let pacing = Pacing::between(Duration::from_secs(1), Duration::from_secs(3));
        for _ in 0..200 {
            let d = pacing.next_delay();
            assert!(d >= Duration::from_secs(1) && d < Duration::from_secs(3), "{d:?}");
        }
        assert_eq!(Pacing::none().next_delay(), Duration::ZERO);
    }
}
