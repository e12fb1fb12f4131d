//! Activation telemetry
//!
//! The engine reports two facts: shell integration activated (first handled
//! VS Code sequence) or it did not within the watchdog window.

use std::fmt;

/// Telemetry events raised by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelemetryEvent {
    /// First handled OSC 633 sequence
    ActivationSucceeded,
    /// No command or cwd detection registered within the watchdog window
    ActivationTimeout,
}

impl TelemetryEvent {
    /// Event name as published to the telemetry backend
    pub fn name(self) -> &'static str {
        match self {
            TelemetryEvent::ActivationSucceeded => "terminal/shellIntegrationActivationSucceeded",
            TelemetryEvent::ActivationTimeout => "terminal/shellIntegrationActivationTimeout",
        }
    }
}

impl fmt::Display for TelemetryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Telemetry backend
///
/// Called from the dispatch thread and, for timeouts, from the watchdog
/// thread, hence `Send + Sync`.
pub trait TelemetrySink: Send + Sync {
    /// Publish an event
    fn public_log(&self, event: TelemetryEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(
            TelemetryEvent::ActivationSucceeded.to_string(),
            "terminal/shellIntegrationActivationSucceeded"
        );
        assert_eq!(
            TelemetryEvent::ActivationTimeout.name(),
            "terminal/shellIntegrationActivationTimeout"
        );
    }
}
