//! Interrupt handling
//!
//! The first interrupt cancels the run; the runner is still terminated and the
//! cluster still torn down. A second interrupt abandons that cleanup.

use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Exit status after a forced second interrupt (128 + SIGINT)
pub const FORCED_EXIT_CODE: i32 = 130;

/// Cancel `token` on the first interrupt and return `true` on the second.
///
/// `interrupted` resolves once per interrupt, to `false` if the signal
/// handler could not be installed; `false` is returned in that case.
pub async fn watch_interrupts<F, Fut>(token: CancellationToken, mut interrupted: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    if !interrupted().await {
        return false;
    }
    warn!("Interrupted, stopping and cleaning up (interrupt again to exit immediately)");
    token.cancel();

    if !interrupted().await {
        return false;
    }
    error!("Interrupted again, exiting without cleanup; AWS resources may be left behind");
    true
}
