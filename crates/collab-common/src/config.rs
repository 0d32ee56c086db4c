//! Environment-driven server configuration.
//!
//! Every knob has a hard-coded default; a present-but-unparseable env var
//! logs a warning and falls back to the default rather than failing startup,
//! matching how this codebase has always treated its environment-derived
//! configuration (see the old `BRAID_ROOT` lookup this module replaces).

use tracing::warn;

const DEFAULT_MAX_OPS_BEFORE_SNAPSHOT: u32 = 200;
const DEFAULT_MAX_SNAPSHOT_INTERVAL_SECONDS: u64 = 300;
const MIN_SNAPSHOT_INTERVAL_SECONDS: u64 = 60;
const DEFAULT_HISTORY_QUEUE_CAPACITY: usize = 1000;
const DEFAULT_CLIENT_WRITE_DEADLINE_MS: u64 = 10_000;
const DEFAULT_UNDO_STACK_LIMIT: usize = 50;
const DEFAULT_USE_PATCH_MODE: bool = false;
const DEFAULT_CLIENT_IDLE_TIMEOUT_SECONDS: u64 = 120;

/// The §6 "Configuration" environment-level knobs, loaded once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    pub max_ops_before_snapshot: u32,
    pub max_snapshot_interval_seconds: u64,
    pub history_queue_capacity: usize,
    pub client_write_deadline_ms: u64,
    pub undo_stack_limit: usize,
    pub use_patch_mode: bool,
    /// §5 "Cancellation & timeouts": read-side inactivity (no subscribe,
    /// heartbeat, cursor, or operation) beyond this many seconds triggers
    /// eviction from every session the client is a member of.
    pub client_idle_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_ops_before_snapshot: DEFAULT_MAX_OPS_BEFORE_SNAPSHOT,
            max_snapshot_interval_seconds: DEFAULT_MAX_SNAPSHOT_INTERVAL_SECONDS,
            history_queue_capacity: DEFAULT_HISTORY_QUEUE_CAPACITY,
            client_write_deadline_ms: DEFAULT_CLIENT_WRITE_DEADLINE_MS,
            undo_stack_limit: DEFAULT_UNDO_STACK_LIMIT,
            use_patch_mode: DEFAULT_USE_PATCH_MODE,
            client_idle_timeout_seconds: DEFAULT_CLIENT_IDLE_TIMEOUT_SECONDS,
        }
    }
}

impl ServerConfig {
    /// Load from the process environment, falling back to defaults for any
    /// knob that's unset or fails to parse.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_ops_before_snapshot: env_parsed(
                "MAX_OPS_BEFORE_SNAPSHOT",
                defaults.max_ops_before_snapshot,
            ),
            max_snapshot_interval_seconds: env_parsed(
                "MAX_SNAPSHOT_INTERVAL_SECONDS",
                defaults.max_snapshot_interval_seconds,
            )
            .max(MIN_SNAPSHOT_INTERVAL_SECONDS),
            history_queue_capacity: env_parsed(
                "HISTORY_QUEUE_CAPACITY",
                defaults.history_queue_capacity,
            ),
            client_write_deadline_ms: env_parsed(
                "CLIENT_WRITE_DEADLINE_MS",
                defaults.client_write_deadline_ms,
            ),
            undo_stack_limit: env_parsed("UNDO_STACK_LIMIT", defaults.undo_stack_limit),
            use_patch_mode: env_parsed("USE_PATCH_MODE", defaults.use_patch_mode),
            client_idle_timeout_seconds: env_parsed(
                "CLIENT_IDLE_TIMEOUT_SECONDS",
                defaults.client_idle_timeout_seconds,
            ),
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(val) => val.parse().unwrap_or_else(|_| {
            warn!("{key} is set to {val:?} but failed to parse; using default");
            default
        }),
        Err(_) => default,
    }
}
