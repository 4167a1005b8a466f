// Scheduler and worker defaults (no magic values)
use std::time::Duration;

/// Sleep duration when no job is due (500ms)
pub const IDLE_SLEEP_DURATION: Duration = Duration::from_millis(500);

/// Sleep duration after worker error before retry (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Default retry base delay for generic jobs (1s)
pub const DEFAULT_RETRY_BASE_DELAY_MS: i64 = 1000;

/// Default retry base delay for email-class jobs (60s)
pub const DEFAULT_EMAIL_RETRY_BASE_DELAY_MS: i64 = 60 * 1000;

/// Default handler invocations per job
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Jobs may not be scheduled closer than this to "now" (5s)
pub const DEFAULT_MIN_LEAD_MS: i64 = 5 * 1000;

/// Due jobs claimed per poll
pub const DEFAULT_CLAIM_BATCH_SIZE: u32 = 16;

/// Jobs stuck in FIRING longer than this are released on startup (5 minutes)
pub const DEFAULT_RECOVERY_WINDOW_MS: i64 = 5 * 60 * 1000;

/// Upper bound for a single post-commit hook (2s)
pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(2);
