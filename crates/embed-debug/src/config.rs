//! Session configuration.
//! - DebugConfig: attach address, poll interval, frame limit
//! - from_env: process-wide cached environment lookup

use std::sync::OnceLock;

/// Environment variable holding the attach address.
pub const DEBUG_ADDRESS_ENV: &str = "EMBED_DEBUG_ADDRESS";
/// Environment variable overriding the peek interval.
pub const DEBUG_POLL_INTERVAL_ENV: &str = "EMBED_DEBUG_POLL_INTERVAL";

/// Checks between transport peeks while running freely.
pub const DEFAULT_POLL_INTERVAL: u32 = 10_000;
/// Largest accepted frame payload.
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Configuration for a [`crate::DebugSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugConfig {
    /// Address to connect to on the first check. `None` disables debugging.
    pub address: Option<String>,
    /// Number of checks between peeks for pending client messages.
    pub poll_interval: u32,
    /// Maximum payload length accepted by the frame decoder.
    pub max_frame_len: usize,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            address: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl DebugConfig {
    /// Configuration that attaches to `address`.
    #[must_use]
    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            ..Self::default()
        }
    }

    /// Read the configuration from the environment.
    ///
    /// The environment is consulted once per process; later changes to the
    /// variables are not observed.
    #[must_use]
    pub fn from_env() -> Self {
        static CACHED: OnceLock<DebugConfig> = OnceLock::new();
        CACHED
            .get_or_init(|| {
                Self::from_lookup(|name| std::env::var(name).ok())
            })
            .clone()
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let address = lookup(DEBUG_ADDRESS_ENV)
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty());
        let poll_interval = lookup(DEBUG_POLL_INTERVAL_ENV)
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .unwrap_or(DEFAULT_POLL_INTERVAL);
        Self {
            address,
            poll_interval,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn poll_interval(mut self, interval: u32) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn max_frame_len(mut self, len: usize) -> Self {
        self.max_frame_len = len;
        self
    }
}
