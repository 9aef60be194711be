//! Bounded polling shared by readiness waits, PID discovery, and
//! graceful-stop confirmation.

use std::future::Future;
use tokio::time::{sleep, Duration};

/// Runs `check` up to `attempts` times, sleeping `interval` between
/// attempts, and returns true as soon as a check passes.
///
/// The first check runs immediately and no sleep follows the last one,
/// so a condition that is already true costs nothing.
pub async fn poll_until<F, Fut>(attempts: u32, interval: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for attempt in 0..attempts {
        if check().await {
            return true;
        }
        if attempt + 1 < attempts {
            sleep(interval).await;
        }
    }
    false
}
