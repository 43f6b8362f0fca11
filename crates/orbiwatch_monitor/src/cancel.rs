//! Cancellation shared by the watcher, the dispatcher and every session.
//!
//! Sessions only observe the token between poll ticks, so a record that is
//! being written always completes.

use std::time::Duration;

pub use tokio_util::sync::CancellationToken;

/// Sleep for `duration` unless `token` is cancelled first.
///
/// Returns `true` when the full duration elapsed, `false` on cancellation.
pub async fn sleep_or_cancelled(token: &CancellationToken, duration: Duration) -> bool {
    if token.is_cancelled() {
        return false;
    }
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
