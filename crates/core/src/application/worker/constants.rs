// Worker constants (no magic values)
use std::time::Duration;

/// Sleep duration when no job is eligible (100ms)
pub const IDLE_SLEEP_DURATION: Duration = Duration::from_millis(100);

/// Sleep duration after a broker error before asking again (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// How long a pool waits for busy slots when closing (30s)
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Jobs active longer than this at startup are considered stalled (5 minutes)
pub const DEFAULT_STALLED_WINDOW_MS: i64 = 5 * 60 * 1000;

/// Simulated handler work per job (1s)
pub const DEFAULT_HANDLER_WORK: Duration = Duration::from_secs(1);
