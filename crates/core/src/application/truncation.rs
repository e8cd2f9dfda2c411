// Truncation wait: pauses a group inside its exclusive slot

use std::time::Duration;
use tracing::debug;

/// Sleep `timeout_ms` before the handler body runs.
///
/// The caller holds the group's only active slot, so the group's next job
/// cannot start until this returns. No-op when absent or not positive.
pub async fn hold_group(timeout_ms: Option<i64>) {
    let Some(ms) = timeout_ms.filter(|ms| *ms > 0) else {
        return;
    };
    debug!(timeout_ms = ms, "Holding group before processing");
    tokio::time::sleep(Duration::from_millis(ms as u64)).await;
}
