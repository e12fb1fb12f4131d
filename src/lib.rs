//! Shell integration protocol engine for terminal emulators
//!
//! Shells announce prompt and command boundaries, the working directory and
//! their environment through OSC escape sequences. This library decodes the
//! competing dialects and turns them into structured session state:
//!
//! ## Dialects
//! - **OSC 133** (FinalTerm): prompt start, command start, executed, finished
//! - **OSC 633** (VS Code): the above plus command lines, continuation and
//!   right prompts, properties, marks and environment reporting
//! - **OSC 1337** (iTerm2): marks and `CurrentDir`
//! - **OSC 7**: `file://host/path` working directory
//! - **OSC 9 ; 9**: Windows Terminal style working directory
//!
//! ## Capabilities
//! - Command detection with history, exit codes, cwd and line lookups
//! - Working directory tracking (local and remote)
//! - Heuristic command detection for shells without integration
//! - Buffer marks, shell environment and prompt type reporting
//!
//! ## Other Features
//! - Nonce-based trust flags for command lines and environment writes
//! - Monotonic activation status and seen-sequence registry
//! - Activation watchdog with telemetry hooks
//! - Session snapshots (JSON) to restore command history
//! - Observer callbacks and pollable events
//! - `vte` based byte stream front end
//!
//! ```
//! use par_term_shell_integration::{
//!     CursorTracker, ShellIntegrationConfig, ShellIntegrationRouter, ShellIntegrationStatus,
//! };
//!
//! let mut router = ShellIntegrationRouter::new(ShellIntegrationConfig::default(), None);
//! router.activate(Box::new(CursorTracker::new(80, 24)));
//!
//! assert!(router.handle_osc(633, "A"));
//! assert!(router.handle_osc(633, "P;Cwd=/home/user"));
//! assert_eq!(router.status(), ShellIntegrationStatus::VSCode);
//! ```

pub mod capabilities;
pub mod codec;
pub mod config;
pub mod error;
pub mod event;
pub mod nonce;
pub mod observer;
pub mod parser;
pub mod router;
pub mod session;
pub mod shell_integration;
pub mod telemetry;
pub mod terminal;
pub mod watchdog;

pub use capabilities::command_detection::{
    CommandLineConfidence, CommandStartOptions, PartialCommand, TerminalCommand,
};
pub use capabilities::{CapabilityKind, CapabilityLimits, CapabilitySet, CapabilityStore};
pub use config::ShellIntegrationConfig;
pub use error::{Result, ShellIntegrationError};
pub use event::{CwdChange, ShellIntegrationEvent};
pub use nonce::Nonce;
pub use observer::{ObserverId, ShellIntegrationObserver};
pub use parser::{ShellIntegrationParser, UnhandledOsc};
pub use router::ShellIntegrationRouter;
pub use session::SerializedCommandDetection;
pub use shell_integration::{Dialect, SeenSequence, ShellIntegrationStatus};
pub use telemetry::{TelemetryEvent, TelemetrySink};
pub use terminal::{CursorTracker, Marker, TerminalHandle};

/// Milliseconds since the Unix epoch
pub(crate) fn unix_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
