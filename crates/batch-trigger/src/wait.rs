//! Resource waiting with exponential backoff and cancellation support.
//!
//! Used for conditions the control plane only reaches eventually, such as an
//! instance settling into `terminated`.

use anyhow::Result;
use backon::{BackoffBuilder, ExponentialBuilder};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Configuration for resource waiting with exponential backoff.
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Initial delay between checks
    pub initial_delay: Duration,
    /// Maximum delay between checks (cap for exponential growth)
    pub max_delay: Duration,
    /// Maximum total time to wait before timeout
    pub timeout: Duration,
    /// Jitter factor (0.0 - 1.0); zero disables jitter
    pub jitter: f64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            timeout: Duration::from_secs(60),
            jitter: 0.25,
        }
    }
}

/// Wait for a resource to reach the desired state with exponential backoff.
///
/// `check` returns `Ok(true)` when ready and `Ok(false)` to retry; an `Err`
/// from `check` aborts the wait. Fails on timeout or cancellation.
///
/// # Example
/// ```ignore
/// wait_for_resource(
///     WaitConfig::default(),
///     Some(&cancel_token),
///     || async { Ok(instance_is_gone().await) },
///     "EC2 instance i-0123 terminated",
/// ).await?;
/// ```
pub async fn wait_for_resource<F, Fut>(
    config: WaitConfig,
    cancel: Option<&CancellationToken>,
    check: F,
    resource_name: &str,
) -> Result<()>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let start = std::time::Instant::now();
    let mut attempts = 0u32;

    let mut builder = ExponentialBuilder::default()
        .with_min_delay(config.initial_delay)
        .with_max_delay(config.max_delay)
        .with_factor(2.0)
        .without_max_times();
    if config.jitter > 0.0 {
        builder = builder.with_jitter();
    }
    let mut delays = builder.build();

    loop {
        attempts += 1;

        if cancel.is_some_and(|token| token.is_cancelled()) {
            anyhow::bail!("Wait for {} cancelled", resource_name);
        }

        if start.elapsed() >= config.timeout {
            anyhow::bail!(
                "Timeout waiting for {} after {:?} ({} attempts)",
                resource_name,
                config.timeout,
                attempts
            );
        }

        match check().await {
            Ok(true) => {
                debug!(resource = %resource_name, attempts, "Resource ready");
                return Ok(());
            }
            Ok(false) => {
                let delay = delays.next().unwrap_or(config.max_delay);
                debug!(
                    resource = %resource_name,
                    attempt = attempts,
                    delay_ms = delay.as_millis(),
                    "Resource not ready, retrying"
                );

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = async {
                        match cancel {
                            Some(token) => token.cancelled().await,
                            None => std::future::pending::<()>().await,
                        }
                    } => {
                        anyhow::bail!("Wait for {} cancelled", resource_name);
                    }
                }
            }
            Err(e) => {
                warn!(resource = %resource_name, error = ?e, "Resource check failed");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config() -> WaitConfig {
        WaitConfig {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            timeout: Duration::from_secs(5),
            jitter: 0.0,
        }
    }

    #[tokio::test]
    async fn test_ready_after_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        wait_for_resource(
            fast_config(),
            None,
            || {
                let counter = counter.clone();
                async move { Ok(counter.fetch_add(1, Ordering::SeqCst) >= 2) }
            },
            "test-resource",
        )
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_timeout() {
        let config = WaitConfig {
            timeout: Duration::from_millis(20),
            ..fast_config()
        };

        let err = wait_for_resource(config, None, || async { Ok(false) }, "never-ready")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Timeout waiting for never-ready"));
    }

    #[tokio::test]
    async fn test_check_error_aborts() {
        let err = wait_for_resource(
            fast_config(),
            None,
            || async { Err(anyhow::anyhow!("access denied")) },
            "broken",
        )
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "access denied");
    }

    #[tokio::test]
    async fn test_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = wait_for_resource(fast_config(), Some(&cancel), || async { Ok(false) }, "x")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("cancelled"));
    }
}
