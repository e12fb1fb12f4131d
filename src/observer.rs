//! Shell integration observer trait for push-based event delivery
//!
//! Observers receive events via trait callbacks after each router entry point
//! (`handle_osc`, `handle_csi`, `handle_data`, ...) returns. Dispatch is
//! deferred, so no router state is borrowed while callbacks run.

use std::sync::Arc;

use crate::event::ShellIntegrationEvent;

/// Unique identifier for a registered observer
pub type ObserverId = u64;

/// Shell integration event observer
///
/// All methods have default no-op implementations. Events are dispatched in
/// two phases:
/// 1. Category-specific method (`on_activation_event`, `on_command_event`, ...)
/// 2. Catch-all `on_event`
pub trait ShellIntegrationObserver: Send + Sync {
    /// Status changes, newly seen sequences, capability registration
    fn on_activation_event(&self, _event: &ShellIntegrationEvent) {}

    /// Prompt and command lifecycle (including partial command detection)
    fn on_command_event(&self, _event: &ShellIntegrationEvent) {}

    /// Cwd, environment and prompt type changes
    fn on_environment_event(&self, _event: &ShellIntegrationEvent) {}

    /// Buffer marks
    fn on_mark_event(&self, _event: &ShellIntegrationEvent) {}

    /// Called for ALL events, after the category-specific method
    fn on_event(&self, _event: &ShellIntegrationEvent) {}
}

/// Internal entry for a registered observer
pub(crate) struct ObserverEntry {
    pub id: ObserverId,
    pub observer: Arc<dyn ShellIntegrationObserver>,
}

/// Event category for routing to observer methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EventCategory {
    Activation,
    Command,
    Environment,
    Mark,
}

/// Categorize an event for routing to the appropriate observer method
pub(crate) fn event_category(event: &ShellIntegrationEvent) -> EventCategory {
    match event {
        ShellIntegrationEvent::StatusChanged(_)
        | ShellIntegrationEvent::SequenceSeen(_)
        | ShellIntegrationEvent::CapabilityAdded(_) => EventCategory::Activation,

        ShellIntegrationEvent::PromptStarted { .. }
        | ShellIntegrationEvent::CommandStarted { .. }
        | ShellIntegrationEvent::CommandExecuted { .. }
        | ShellIntegrationEvent::CommandFinished(_)
        | ShellIntegrationEvent::CommandsInvalidated(_)
        | ShellIntegrationEvent::RichCommandDetectionChanged(_)
        | ShellIntegrationEvent::PartialCommandDetected(_) => EventCategory::Command,

        ShellIntegrationEvent::CwdChanged(_)
        | ShellIntegrationEvent::EnvironmentChanged { .. }
        | ShellIntegrationEvent::PromptTypeChanged(_) => EventCategory::Environment,

        ShellIntegrationEvent::MarkAdded { .. } => EventCategory::Mark,
    }
}

/// Deliver one event to one observer
pub(crate) fn dispatch(observer: &dyn ShellIntegrationObserver, event: &ShellIntegrationEvent) {
    match event_category(event) {
        EventCategory::Activation => observer.on_activation_event(event),
        EventCategory::Command => observer.on_command_event(event),
        EventCategory::Environment => observer.on_environment_event(event),
        EventCategory::Mark => observer.on_mark_event(event),
    }
    observer.on_event(event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::CapabilityKind;
    use crate::shell_integration::ShellIntegrationStatus;

    #[test]
    fn test_event_categories() {
        assert_eq!(
            event_category(&ShellIntegrationEvent::StatusChanged(
                ShellIntegrationStatus::VSCode
            )),
            EventCategory::Activation
        );
        assert_eq!(
            event_category(&ShellIntegrationEvent::CapabilityAdded(
                CapabilityKind::CwdDetection
            )),
            EventCategory::Activation
        );
        assert_eq!(
            event_category(&ShellIntegrationEvent::PromptStarted { line: None }),
            EventCategory::Command
        );
        assert_eq!(
            event_category(&ShellIntegrationEvent::PromptTypeChanged("x".into())),
            EventCategory::Environment
        );
    }
}
