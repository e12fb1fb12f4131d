//! Capability registry
//!
//! A capability is a sink accumulating one slice of session semantics
//! (commands, cwd, environment, marks, prompt type). The router owns a single
//! [`CapabilityStore`]; each kind is created lazily on first use and at most
//! once for the lifetime of the store.

pub mod buffer_mark;
pub mod command_detection;
pub mod cwd_detection;
pub mod partial_command_detection;
pub mod prompt_type_detection;
pub mod shell_env_detection;

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use bitflags::bitflags;

use crate::config::ShellIntegrationConfig;
use crate::event::{EventQueue, ShellIntegrationEvent};

pub use buffer_mark::BufferMarkCapability;
pub use command_detection::CommandDetectionCapability;
pub use cwd_detection::CwdDetectionCapability;
pub use partial_command_detection::PartialCommandDetectionCapability;
pub use prompt_type_detection::PromptTypeDetectionCapability;
pub use shell_env_detection::ShellEnvDetectionCapability;

/// Kinds of capability a terminal session can have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CapabilityKind {
    /// Working directory tracking
    CwdDetection,
    /// Full command lifecycle from shell integration sequences
    CommandDetection,
    /// Heuristic command boundaries without shell integration
    PartialCommandDetection,
    /// Marks / points of interest in the buffer
    BufferMarkDetection,
    /// Shell environment variables
    ShellEnvDetection,
    /// Prompt framework reported by the shell
    PromptTypeDetection,
}

impl CapabilityKind {
    fn flag(self) -> CapabilitySet {
        match self {
            CapabilityKind::CwdDetection => CapabilitySet::CWD_DETECTION,
            CapabilityKind::CommandDetection => CapabilitySet::COMMAND_DETECTION,
            CapabilityKind::PartialCommandDetection => CapabilitySet::PARTIAL_COMMAND_DETECTION,
            CapabilityKind::BufferMarkDetection => CapabilitySet::BUFFER_MARK_DETECTION,
            CapabilityKind::ShellEnvDetection => CapabilitySet::SHELL_ENV_DETECTION,
            CapabilityKind::PromptTypeDetection => CapabilitySet::PROMPT_TYPE_DETECTION,
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CapabilityKind::CwdDetection => "cwd_detection",
            CapabilityKind::CommandDetection => "command_detection",
            CapabilityKind::PartialCommandDetection => "partial_command_detection",
            CapabilityKind::BufferMarkDetection => "buffer_mark_detection",
            CapabilityKind::ShellEnvDetection => "shell_env_detection",
            CapabilityKind::PromptTypeDetection => "prompt_type_detection",
        };
        f.write_str(name)
    }
}

bitflags! {
    /// Set of capability kinds
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CapabilitySet: u8 {
        const CWD_DETECTION = 1 << 0;
        const COMMAND_DETECTION = 1 << 1;
        const PARTIAL_COMMAND_DETECTION = 1 << 2;
        const BUFFER_MARK_DETECTION = 1 << 3;
        const SHELL_ENV_DETECTION = 1 << 4;
        const PROMPT_TYPE_DETECTION = 1 << 5;
    }
}

/// Lock-free view of the registered kinds, shareable with other threads
#[derive(Debug, Clone, Default)]
pub struct RegisteredCapabilities {
    bits: Arc<AtomicU8>,
}

impl RegisteredCapabilities {
    fn insert(&self, kind: CapabilityKind) {
        self.bits.fetch_or(kind.flag().bits(), Ordering::SeqCst);
    }

    /// Whether `kind` has been registered
    pub fn contains(&self, kind: CapabilityKind) -> bool {
        self.snapshot().contains(kind.flag())
    }

    /// Current set of registered kinds
    pub fn snapshot(&self) -> CapabilitySet {
        CapabilitySet::from_bits_truncate(self.bits.load(Ordering::SeqCst))
    }
}

/// Sizing knobs the capabilities take from [`ShellIntegrationConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityLimits {
    pub max_command_history: usize,
    pub max_cwd_history: usize,
    pub min_prompt_length: usize,
    pub scroll_on_erase_in_display: bool,
}

impl Default for CapabilityLimits {
    fn default() -> Self {
        Self::from(&ShellIntegrationConfig::default())
    }
}

impl From<&ShellIntegrationConfig> for CapabilityLimits {
    fn from(config: &ShellIntegrationConfig) -> Self {
        Self {
            max_command_history: config.max_command_history,
            max_cwd_history: config.max_cwd_history,
            min_prompt_length: config.min_prompt_length,
            scroll_on_erase_in_display: config.scroll_on_erase_in_display,
        }
    }
}

/// Per-session store of capability instances
#[derive(Debug)]
pub struct CapabilityStore {
    events: EventQueue,
    limits: CapabilityLimits,
    registered: RegisteredCapabilities,
    order: Vec<CapabilityKind>,
    cwd_detection: Option<CwdDetectionCapability>,
    command_detection: Option<CommandDetectionCapability>,
    partial_command_detection: Option<PartialCommandDetectionCapability>,
    buffer_mark_detection: Option<BufferMarkCapability>,
    shell_env_detection: Option<ShellEnvDetectionCapability>,
    prompt_type_detection: Option<PromptTypeDetectionCapability>,
}

impl CapabilityStore {
    /// Create an empty store publishing into `events`
    pub fn new(events: EventQueue, limits: CapabilityLimits) -> Self {
        Self {
            events,
            limits,
            registered: RegisteredCapabilities::default(),
            order: Vec::new(),
            cwd_detection: None,
            command_detection: None,
            partial_command_detection: None,
            buffer_mark_detection: None,
            shell_env_detection: None,
            prompt_type_detection: None,
        }
    }

    fn record_added(&mut self, kind: CapabilityKind) {
        self.order.push(kind);
        self.registered.insert(kind);
        tracing::debug!(target: "shell_integration::capabilities", %kind, "capability added");
        self.events
            .push(ShellIntegrationEvent::CapabilityAdded(kind));
    }

    // === Cwd detection ===

    /// Get cwd detection, creating and registering it on first use
    pub fn get_or_create_cwd_detection(&mut self) -> &mut CwdDetectionCapability {
        if self.cwd_detection.is_none() {
            self.record_added(CapabilityKind::CwdDetection);
        }
        self.cwd_detection.get_or_insert_with(|| {
            CwdDetectionCapability::new(self.events.clone(), self.limits.max_cwd_history)
        })
    }

    /// Cwd detection, if registered
    pub fn cwd_detection(&self) -> Option<&CwdDetectionCapability> {
        self.cwd_detection.as_ref()
    }

    /// Cwd detection (mutable), if registered
    pub fn cwd_detection_mut(&mut self) -> Option<&mut CwdDetectionCapability> {
        self.cwd_detection.as_mut()
    }

    // === Command detection ===

    /// Get command detection, creating and registering it on first use
    pub fn get_or_create_command_detection(&mut self) -> &mut CommandDetectionCapability {
        if self.command_detection.is_none() {
            self.record_added(CapabilityKind::CommandDetection);
        }
        self.command_detection.get_or_insert_with(|| {
            CommandDetectionCapability::new(self.events.clone(), self.limits.max_command_history)
                .with_scroll_on_erase_in_display(self.limits.scroll_on_erase_in_display)
        })
    }

    /// Command detection, if registered
    pub fn command_detection(&self) -> Option<&CommandDetectionCapability> {
        self.command_detection.as_ref()
    }

    /// Command detection (mutable), if registered
    pub fn command_detection_mut(&mut self) -> Option<&mut CommandDetectionCapability> {
        self.command_detection.as_mut()
    }

    // === Partial command detection ===

    /// Get the partial command heuristic, creating and registering it on first use
    pub fn get_or_create_partial_command_detection(
        &mut self,
    ) -> &mut PartialCommandDetectionCapability {
        if self.partial_command_detection.is_none() {
            self.record_added(CapabilityKind::PartialCommandDetection);
        }
        self.partial_command_detection.get_or_insert_with(|| {
            PartialCommandDetectionCapability::new(
                self.events.clone(),
                self.limits.min_prompt_length,
            )
        })
    }

    /// Partial command heuristic, if registered
    pub fn partial_command_detection(&self) -> Option<&PartialCommandDetectionCapability> {
        self.partial_command_detection.as_ref()
    }

    /// Partial command heuristic (mutable), if registered
    pub fn partial_command_detection_mut(
        &mut self,
    ) -> Option<&mut PartialCommandDetectionCapability> {
        self.partial_command_detection.as_mut()
    }

    // === Buffer marks ===

    /// Get buffer marks, creating and registering them on first use
    pub fn get_or_create_buffer_mark_detection(&mut self) -> &mut BufferMarkCapability {
        if self.buffer_mark_detection.is_none() {
            self.record_added(CapabilityKind::BufferMarkDetection);
        }
        self.buffer_mark_detection
            .get_or_insert_with(|| BufferMarkCapability::new(self.events.clone()))
    }

    /// Buffer marks, if registered
    pub fn buffer_mark_detection(&self) -> Option<&BufferMarkCapability> {
        self.buffer_mark_detection.as_ref()
    }

    /// Buffer marks (mutable), if registered
    pub fn buffer_mark_detection_mut(&mut self) -> Option<&mut BufferMarkCapability> {
        self.buffer_mark_detection.as_mut()
    }

    // === Shell environment ===

    /// Get environment tracking, creating and registering it on first use
    pub fn get_or_create_shell_env_detection(&mut self) -> &mut ShellEnvDetectionCapability {
        if self.shell_env_detection.is_none() {
            self.record_added(CapabilityKind::ShellEnvDetection);
        }
        self.shell_env_detection
            .get_or_insert_with(|| ShellEnvDetectionCapability::new(self.events.clone()))
    }

    /// Environment tracking, if registered
    pub fn shell_env_detection(&self) -> Option<&ShellEnvDetectionCapability> {
        self.shell_env_detection.as_ref()
    }

    /// Environment tracking (mutable), if registered
    pub fn shell_env_detection_mut(&mut self) -> Option<&mut ShellEnvDetectionCapability> {
        self.shell_env_detection.as_mut()
    }

    // === Prompt type ===

    /// Get prompt type tracking, creating and registering it on first use
    pub fn get_or_create_prompt_type_detection(&mut self) -> &mut PromptTypeDetectionCapability {
        if self.prompt_type_detection.is_none() {
            self.record_added(CapabilityKind::PromptTypeDetection);
        }
        self.prompt_type_detection
            .get_or_insert_with(|| PromptTypeDetectionCapability::new(self.events.clone()))
    }

    /// Prompt type tracking, if registered
    pub fn prompt_type_detection(&self) -> Option<&PromptTypeDetectionCapability> {
        self.prompt_type_detection.as_ref()
    }

    /// Prompt type tracking (mutable), if registered
    pub fn prompt_type_detection_mut(&mut self) -> Option<&mut PromptTypeDetectionCapability> {
        self.prompt_type_detection.as_mut()
    }

    /// Whether a capability of `kind` exists
    pub fn has(&self, kind: CapabilityKind) -> bool {
        self.registered.contains(kind)
    }

    /// Registered kinds in registration order
    pub fn kinds(&self) -> &[CapabilityKind] {
        &self.order
    }

    /// Shareable view of the registered kinds
    pub fn registered(&self) -> RegisteredCapabilities {
        self.registered.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (CapabilityStore, EventQueue) {
        let events = EventQueue::new();
        (
            CapabilityStore::new(events.clone(), CapabilityLimits::default()),
            events,
        )
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let (mut store, events) = store();
        store.get_or_create_cwd_detection().update_cwd("/a".into());
        store.get_or_create_cwd_detection().update_cwd("/b".into());

        let added: Vec<_> = events
            .drain()
            .into_iter()
            .filter(|e| matches!(e, ShellIntegrationEvent::CapabilityAdded(_)))
            .collect();
        assert_eq!(
            added,
            vec![ShellIntegrationEvent::CapabilityAdded(
                CapabilityKind::CwdDetection
            )]
        );
        assert_eq!(store.cwd_detection().and_then(|c| c.cwd()), Some("/b"));
    }

    #[test]
    fn test_lookup_does_not_create() {
        let (mut store, events) = store();
        assert!(store.command_detection().is_none());
        assert!(store.command_detection_mut().is_none());
        assert!(!store.has(CapabilityKind::CommandDetection));
        assert!(events.is_empty());
    }

    #[test]
    fn test_kinds_in_registration_order() {
        let (mut store, _events) = store();
        store.get_or_create_prompt_type_detection();
        store.get_or_create_command_detection();
        store.get_or_create_prompt_type_detection();
        assert_eq!(
            store.kinds(),
            &[
                CapabilityKind::PromptTypeDetection,
                CapabilityKind::CommandDetection
            ]
        );
    }

    #[test]
    fn test_registered_view_is_shared() {
        let (mut store, _events) = store();
        let view = store.registered();
        assert!(view.snapshot().is_empty());

        store.get_or_create_command_detection();
        assert!(view.contains(CapabilityKind::CommandDetection));
        assert!(!view.contains(CapabilityKind::CwdDetection));
    }
}
