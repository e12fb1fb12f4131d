//! Shell integration events
//!
//! Capabilities and the router push events into a shared [`EventQueue`]. The
//! router drains the queue after every entry point and hands events to
//! observers, and keeps them for [`poll_events`] consumers.
//!
//! [`poll_events`]: crate::router::ShellIntegrationRouter::poll_events

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::capabilities::command_detection::TerminalCommand;
use crate::capabilities::CapabilityKind;
use crate::codec::MarkProperties;
use crate::shell_integration::{SeenSequence, ShellIntegrationStatus};
use crate::terminal::Marker;

/// Current working directory change information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CwdChange {
    /// Previous working directory
    pub old_cwd: Option<String>,
    /// New working directory
    pub new_cwd: String,
    /// Hostname associated with the new directory (if remote)
    pub hostname: Option<String>,
    /// Username associated with the new directory (if provided)
    pub username: Option<String>,
}

/// Shell integration event
#[derive(Debug, Clone, PartialEq)]
pub enum ShellIntegrationEvent {
    /// Activation status moved up
    StatusChanged(ShellIntegrationStatus),
    /// A `(dialect, token)` pair was seen for the first time
    SequenceSeen(SeenSequence),
    /// A capability was registered
    CapabilityAdded(CapabilityKind),
    /// Prompt started (`A`)
    PromptStarted {
        /// Absolute line of the prompt start marker
        line: Option<usize>,
    },
    /// Command input started (`B`)
    CommandStarted {
        /// Absolute line where input begins
        line: Option<usize>,
        /// Column where input begins
        column: usize,
    },
    /// Command output started (`C`)
    CommandExecuted {
        /// Command line known at execution time
        command: String,
        /// Absolute line of the executed marker
        line: Option<usize>,
    },
    /// Command finished (`D`)
    CommandFinished(TerminalCommand),
    /// Finished commands were removed (screen cleared)
    CommandsInvalidated(Vec<TerminalCommand>),
    /// Rich command detection toggled (`P;HasRichCommandDetection`)
    RichCommandDetectionChanged(bool),
    /// Working directory changed
    CwdChanged(CwdChange),
    /// Shell environment replaced
    EnvironmentChanged {
        /// Full environment after the change
        env: BTreeMap<String, String>,
        /// Whether the update carried the session nonce
        is_trusted: bool,
    },
    /// Prompt type reported (`P;PromptType`)
    PromptTypeChanged(String),
    /// A buffer mark was added
    MarkAdded {
        /// Marker pinned at the mark's line
        marker: Marker,
        /// Mark properties from the sequence
        properties: MarkProperties,
    },
    /// The fallback heuristic detected a command without shell integration
    PartialCommandDetected(Marker),
}

impl ShellIntegrationEvent {
    /// Stable name, mostly for logs and tests
    pub fn name(&self) -> &'static str {
        match self {
            ShellIntegrationEvent::StatusChanged(_) => "status_changed",
            ShellIntegrationEvent::SequenceSeen(_) => "sequence_seen",
            ShellIntegrationEvent::CapabilityAdded(_) => "capability_added",
            ShellIntegrationEvent::PromptStarted { .. } => "prompt_start",
            ShellIntegrationEvent::CommandStarted { .. } => "command_start",
            ShellIntegrationEvent::CommandExecuted { .. } => "command_executed",
            ShellIntegrationEvent::CommandFinished(_) => "command_finished",
            ShellIntegrationEvent::CommandsInvalidated(_) => "commands_invalidated",
            ShellIntegrationEvent::RichCommandDetectionChanged(_) => "rich_command_detection",
            ShellIntegrationEvent::CwdChanged(_) => "cwd_changed",
            ShellIntegrationEvent::EnvironmentChanged { .. } => "environment_changed",
            ShellIntegrationEvent::PromptTypeChanged(_) => "prompt_type_changed",
            ShellIntegrationEvent::MarkAdded { .. } => "mark_added",
            ShellIntegrationEvent::PartialCommandDetected(_) => "partial_command",
        }
    }
}

/// Shared FIFO of pending events
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    inner: Arc<Mutex<VecDeque<ShellIntegrationEvent>>>,
}

impl EventQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event
    pub fn push(&self, event: ShellIntegrationEvent) {
        self.inner.lock().push_back(event);
    }

    /// Take every pending event, oldest first
    pub fn drain(&self) -> Vec<ShellIntegrationEvent> {
        self.inner.lock().drain(..).collect()
    }

    /// Number of pending events
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether no events are pending
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_is_shared_and_fifo() {
        let queue = EventQueue::new();
        let producer = queue.clone();
        producer.push(ShellIntegrationEvent::PromptStarted { line: Some(1) });
        producer.push(ShellIntegrationEvent::PromptTypeChanged("p10k".into()));

        assert_eq!(queue.len(), 2);
        let events = queue.drain();
        assert_eq!(events[0].name(), "prompt_start");
        assert_eq!(events[1].name(), "prompt_type_changed");
        assert!(queue.is_empty());
    }
}
