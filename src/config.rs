//! Shell integration configuration
//!
//! All fields are optional when loading from YAML; missing keys take the
//! values from [`ShellIntegrationConfig::default`].

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default delay before the activation watchdog reports a failure (10 seconds)
pub const DEFAULT_ACTIVATION_TIMEOUT_MS: u64 = 10_000;

/// Default number of finished commands kept by command detection
pub const DEFAULT_MAX_COMMAND_HISTORY: usize = 1000;

/// Default number of distinct working directories remembered
pub const DEFAULT_MAX_CWD_HISTORY: usize = 100;

/// Default number of events kept for [`poll_events`] between polls
///
/// [`poll_events`]: crate::router::ShellIntegrationRouter::poll_events
pub const DEFAULT_MAX_PENDING_EVENTS: usize = 1000;

/// Minimum cursor column for the partial command heuristic to treat a
/// carriage return as the end of a prompt line
pub const MINIMUM_PROMPT_LENGTH: usize = 2;

/// Configuration for a [`ShellIntegrationRouter`](crate::router::ShellIntegrationRouter)
///
/// The router moves `nonce` out of the config it is given, so
/// [`ShellIntegrationRouter::config`](crate::router::ShellIntegrationRouter::config)
/// never holds the secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellIntegrationConfig {
    /// Session nonce expected on trust-gated sequences (None = generate one)
    pub nonce: Option<String>,
    /// Suppress activation telemetry (also disables the watchdog)
    pub disable_telemetry: bool,
    /// Watchdog delay in milliseconds
    pub activation_timeout_ms: u64,
    /// Maximum finished commands retained by command detection
    pub max_command_history: usize,
    /// Maximum distinct working directories retained by cwd detection
    pub max_cwd_history: usize,
    /// Minimum prompt length for the partial command heuristic
    pub min_prompt_length: usize,
    /// When true, `CSI 2 J` scrolls the viewport into scrollback instead of
    /// clearing it, so commands in the viewport are kept
    pub scroll_on_erase_in_display: bool,
    /// Maximum events buffered for polling; the oldest are dropped first
    /// (0 = keep none, observers still receive everything)
    pub max_pending_events: usize,
}

impl Default for ShellIntegrationConfig {
    fn default() -> Self {
        Self {
            nonce: None,
            disable_telemetry: false,
            activation_timeout_ms: DEFAULT_ACTIVATION_TIMEOUT_MS,
            max_command_history: DEFAULT_MAX_COMMAND_HISTORY,
            max_cwd_history: DEFAULT_MAX_CWD_HISTORY,
            min_prompt_length: MINIMUM_PROMPT_LENGTH,
            scroll_on_erase_in_display: false,
            max_pending_events: DEFAULT_MAX_PENDING_EVENTS,
        }
    }
}

impl fmt::Debug for ShellIntegrationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShellIntegrationConfig")
            .field("nonce", &self.nonce.as_ref().map(|_| "<redacted>"))
            .field("disable_telemetry", &self.disable_telemetry)
            .field("activation_timeout_ms", &self.activation_timeout_ms)
            .field("max_command_history", &self.max_command_history)
            .field("max_cwd_history", &self.max_cwd_history)
            .field("min_prompt_length", &self.min_prompt_length)
            .field("scroll_on_erase_in_display", &self.scroll_on_erase_in_display)
            .field("max_pending_events", &self.max_pending_events)
            .finish()
    }
}

impl ShellIntegrationConfig {
    /// Parse a configuration from a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Builder-style nonce override
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Builder-style watchdog delay override
    pub fn with_activation_timeout(mut self, timeout: Duration) -> Self {
        self.activation_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Watchdog delay as a [`Duration`]
    pub fn activation_timeout(&self) -> Duration {
        Duration::from_millis(self.activation_timeout_ms)
    }
}
