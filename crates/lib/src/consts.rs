//! Names and defaults shared across the crate.

/// Application name, used for the root directory and environment variable prefix.
pub const APP_NAME: &str = "pullstack";

/// Prefix applied to every service installed on behalf of an application.
pub const SERVICE_PREFIX: &str = "stack-";

/// Name of the service that runs `watch` when the agent installs itself.
pub const SELF_SERVICE_NAME: &str = "stack";

/// Loopback port bound by the cross-process reconciliation lock.
pub const DEFAULT_LOCK_PORT: u16 = 49001;

/// Seconds between version polls of a remote configuration.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;

/// Seconds the supervisor waits before relaunching an exited service.
pub const DEFAULT_RESTART_COOLDOWN_SECS: u64 = 10;

/// Ledger file name within the root directory.
pub const LEDGER_FILENAME: &str = "state.json";

/// Supervisor state file name within the root directory.
pub const SUPERVISOR_STATE_FILENAME: &str = "services.state";

/// Root subdirectory holding extracted applications.
pub const APPLICATIONS_DIR: &str = "applications";

/// Root subdirectory holding downloaded source artifacts.
pub const DOWNLOADS_DIR: &str = "downloads";

/// Root subdirectory for runtime files.
pub const RUN_DIR: &str = "run";

/// Root subdirectory for scratch files.
pub const TMP_DIR: &str = "tmp";

/// Permission bits for literal files written into an application directory.
pub const APPLICATION_FILE_MODE: u32 = 0o755;
