//! Process-wide configuration read from the environment.
//!
//! Everything a task or test needs per instance is configured through the
//! builders in [`factory`](crate::factory). The only process-wide switch
//! is the scheduler debug flag: per-advance debug events are frequent
//! enough that they are skipped unless explicitly asked for, even when a
//! subscriber would accept them.

use std::env;
use std::ffi::OsString;
use std::sync::OnceLock;

/// Environment variable enabling per-advance debug events.
///
/// Its presence enables the switch; the value is ignored.
pub const SCHEDULER_DEBUG_ENV: &str = "TASKLET_SCHEDULER_DEBUG";

/// Runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Emit a debug event for every advance and kill.
    pub scheduler_debug: bool,
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var_os(key))
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Self {
        Self {
            scheduler_debug: lookup(SCHEDULER_DEBUG_ENV).is_some(),
        }
    }
}

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Returns the process configuration, reading the environment on first use.
pub fn config() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}
