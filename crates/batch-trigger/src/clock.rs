//! Time source for the orchestrator's delays and deadlines

use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Source of the current time and of sleeps.
///
/// Production code uses [`TokioClock`]; tests substitute a clock that
/// advances instantly so multi-hour deadlines run in microseconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Wall clock backed by `tokio::time`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await
    }
}

/// Sleep on `clock` unless `cancel` fires first.
///
/// Returns `false` if the sleep was cut short by cancellation. An already
/// cancelled token never starts the sleep.
pub async fn sleep_or_cancel<C: Clock>(
    clock: &C,
    duration: Duration,
    cancel: &CancellationToken,
) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = clock.sleep(duration) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tokio_clock_sleeps() {
        let clock = TokioClock;
        let start = clock.now();
        clock.sleep(Duration::from_millis(10)).await;
        assert!(clock.now().duration_since(start) >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_sleep_or_cancel_completes() {
        let cancel = CancellationToken::new();
        assert!(sleep_or_cancel(&TokioClock, Duration::from_millis(5), &cancel).await);
    }

    #[tokio::test]
    async fn test_sleep_or_cancel_interrupted() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        assert!(!sleep_or_cancel(&TokioClock, Duration::from_secs(30), &cancel).await);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_sleep_or_cancel_already_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(!sleep_or_cancel(&TokioClock, Duration::from_secs(30), &cancel).await);
    }
}
