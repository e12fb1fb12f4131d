//! Shell integration sequence router
//!
//! [`ShellIntegrationRouter`] claims the OSC prefixes used by shell
//! integration (7, 9, 133, 633, 1337), decodes their payloads and drives the
//! capabilities. Each handler reports whether it consumed the sequence so
//! the host terminal can apply its default behavior to the rest.

mod cwd;
mod final_term;
mod iterm;
mod vscode;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::capabilities::buffer_mark::BufferMark;
use crate::capabilities::{CapabilityKind, CapabilityLimits, CapabilityStore};
use crate::config::ShellIntegrationConfig;
use crate::event::{EventQueue, ShellIntegrationEvent};
use crate::nonce::Nonce;
use crate::observer::{dispatch, ObserverEntry, ObserverId, ShellIntegrationObserver};
use crate::shell_integration::{Dialect, SeenSequence, SeenSequences, ShellIntegrationStatus};
use crate::telemetry::{TelemetryEvent, TelemetrySink};
use crate::terminal::TerminalHandle;
use crate::watchdog::ActivationWatchdog;

/// Decodes shell integration sequences and routes them to capabilities
pub struct ShellIntegrationRouter {
    config: ShellIntegrationConfig,
    nonce: Nonce,
    pub(crate) terminal: Option<Box<dyn TerminalHandle>>,
    /// OSC handlers, in registration order
    handlers: Vec<Dialect>,
    status: ShellIntegrationStatus,
    seen: SeenSequences,
    pub(crate) capabilities: CapabilityStore,
    events: EventQueue,
    /// Events delivered to observers, kept for [`Self::poll_events`]
    /// (bounded by `max_pending_events`)
    delivered: VecDeque<ShellIntegrationEvent>,
    observers: Vec<ObserverEntry>,
    next_observer_id: ObserverId,
    telemetry: Option<Arc<dyn TelemetrySink>>,
    /// Set once activation success or timeout has been reported
    telemetry_latched: Arc<AtomicBool>,
    watchdog: Option<ActivationWatchdog>,
}

impl ShellIntegrationRouter {
    /// Create a router for one terminal session
    ///
    /// The nonce is moved out of the config when set, otherwise a fresh one
    /// is generated. Only [`Self::nonce`] holds it afterwards.
    pub fn new(
        mut config: ShellIntegrationConfig,
        telemetry: Option<Arc<dyn TelemetrySink>>,
    ) -> Self {
        let nonce = match config.nonce.take() {
            Some(secret) => Nonce::new(secret),
            None => Nonce::generate(),
        };
        let events = EventQueue::new();
        let capabilities = CapabilityStore::new(events.clone(), CapabilityLimits::from(&config));
        Self {
            config,
            nonce,
            terminal: None,
            handlers: Vec::new(),
            status: ShellIntegrationStatus::Off,
            seen: SeenSequences::new(),
            capabilities,
            events,
            delivered: VecDeque::new(),
            observers: Vec::new(),
            next_observer_id: 1,
            telemetry,
            telemetry_latched: Arc::new(AtomicBool::new(false)),
            watchdog: None,
        }
    }

    /// Attach the terminal and register the OSC handlers
    pub fn activate(&mut self, terminal: Box<dyn TerminalHandle>) {
        if self.terminal.is_some() {
            tracing::debug!(target: "shell_integration::router", "re-activated with a new terminal");
        }
        self.terminal = Some(terminal);
        self.capabilities.get_or_create_partial_command_detection();

        for dialect in Dialect::ALL {
            if !self.handlers.contains(&dialect) {
                self.handlers.push(dialect);
            }
        }
        self.arm_watchdog();
        self.flush_events();
    }

    fn arm_watchdog(&mut self) {
        if self.watchdog.is_some() || self.config.disable_telemetry {
            return;
        }
        let Some(telemetry) = self.telemetry.clone() else {
            return;
        };
        self.watchdog = Some(ActivationWatchdog::arm(
            self.config.activation_timeout(),
            self.capabilities.registered(),
            telemetry,
            Arc::clone(&self.telemetry_latched),
        ));
    }

    fn cancel_watchdog(&mut self) {
        if let Some(watchdog) = self.watchdog.as_mut() {
            watchdog.cancel();
        }
    }

    /// Whether [`Self::activate`] has been called
    pub fn is_activated(&self) -> bool {
        self.terminal.is_some()
    }

    /// OSC prefixes with a registered handler, in registration order
    pub fn registered_handlers(&self) -> &[Dialect] {
        &self.handlers
    }

    /// Handle `OSC <ps> ; <data>`; returns whether the sequence was consumed
    pub fn handle_osc(&mut self, ps: u16, data: &str) -> bool {
        let Some(dialect) = Dialect::from_osc_prefix(ps) else {
            return false;
        };
        if !self.handlers.contains(&dialect) {
            return false;
        }

        let handled = match dialect {
            Dialect::VSCode => self.handle_vscode_sequence(data),
            Dialect::ITerm => self.handle_iterm_sequence(data),
            Dialect::FinalTerm => self.handle_final_term_sequence(data),
            Dialect::SetCwd => self.handle_set_cwd(data),
            Dialect::SetWindowsFriendlyCwd => self.handle_set_windows_friendly_cwd(data),
        };
        if !handled {
            tracing::debug!(
                target: "shell_integration::router",
                ps,
                data,
                "unhandled shell integration sequence"
            );
        }
        self.flush_events();
        handled
    }

    /// Observe `CSI <param> <action>`; never consumes the sequence
    pub fn handle_csi(&mut self, param: u16, action: char) -> bool {
        if action != 'J' {
            return false;
        }
        let Some(term) = self.terminal.as_deref_mut() else {
            return false;
        };
        if let Some(partial) = self.capabilities.partial_command_detection_mut() {
            partial.handle_erase_in_display(&*term, param);
        }
        if param == 2 {
            if let Some(detection) = self.capabilities.command_detection_mut() {
                detection.handle_erase_in_display(term);
            }
        }
        self.flush_events();
        false
    }

    /// Input sent by the user to the shell
    pub fn handle_data(&mut self, data: &str) {
        let Some(term) = self.terminal.as_deref_mut() else {
            return;
        };
        if let Some(partial) = self.capabilities.partial_command_detection_mut() {
            partial.handle_input(term, data);
        }
        self.flush_events();
    }

    /// Text was sent to the shell and executed on the user's behalf
    pub fn did_execute_text(&mut self) {
        let Some(term) = self.terminal.as_deref_mut() else {
            return;
        };
        if let Some(partial) = self.capabilities.partial_command_detection_mut() {
            partial.handle_enter(term);
        }
        self.flush_events();
    }

    /// Current activation status
    pub fn status(&self) -> ShellIntegrationStatus {
        self.status
    }

    /// Sequences seen so far
    pub fn seen_sequences(&self) -> &SeenSequences {
        &self.seen
    }

    /// Capability store
    pub fn capabilities(&self) -> &CapabilityStore {
        &self.capabilities
    }

    /// Session nonce, to be injected into the shell environment
    pub fn nonce(&self) -> &Nonce {
        &self.nonce
    }

    /// Router configuration
    pub fn config(&self) -> &ShellIntegrationConfig {
        &self.config
    }

    /// Attached terminal
    pub fn terminal(&self) -> Option<&dyn TerminalHandle> {
        self.terminal.as_deref()
    }

    /// Attached terminal (mutable), e.g. to feed it output
    pub fn terminal_mut(&mut self) -> Option<&mut (dyn TerminalHandle + 'static)> {
        self.terminal.as_deref_mut()
    }

    /// Whether the activation watchdog is pending
    pub fn is_watchdog_armed(&self) -> bool {
        self.watchdog.as_ref().is_some_and(|w| w.is_armed())
    }

    /// Mark set by the shell under `id`
    pub fn get_mark(&self, id: &str) -> Option<&BufferMark> {
        self.capabilities.buffer_mark_detection()?.get_mark(id)
    }

    /// Pre-assign the id of the next command whose line is `command`
    pub fn set_next_command_id(&mut self, command: &str, id: &str) {
        if self.terminal.is_none() {
            return;
        }
        self.capabilities
            .get_or_create_command_detection()
            .set_next_command_id(command, id);
        self.flush_events();
    }

    /// Register an observer; returns its id
    pub fn add_observer(&mut self, observer: Arc<dyn ShellIntegrationObserver>) -> ObserverId {
        let id = self.next_observer_id;
        self.next_observer_id += 1;
        self.observers.push(ObserverEntry { id, observer });
        id
    }

    /// Remove an observer; returns whether it was registered
    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|entry| entry.id != id);
        self.observers.len() != before
    }

    /// Number of registered observers
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Take the events raised since the last call
    ///
    /// At most `max_pending_events` are kept between polls; older ones are
    /// dropped.
    pub fn poll_events(&mut self) -> Vec<ShellIntegrationEvent> {
        self.flush_events();
        self.delivered.drain(..).collect()
    }

    /// Number of events waiting for [`Self::poll_events`]
    pub fn pending_event_count(&self) -> usize {
        self.delivered.len()
    }

    /// Whether a trust-gated argument carries the session nonce
    ///
    /// Every nonce comparison goes through here.
    pub(crate) fn is_trusted(&self, candidate: Option<&str>) -> bool {
        self.nonce.is_trusted(candidate)
    }

    pub(crate) fn advance_status(&mut self, next: ShellIntegrationStatus) {
        if self.status.advance(next) {
            tracing::debug!(
                target: "shell_integration::router",
                status = %self.status,
                "shell integration status changed"
            );
            self.events
                .push(ShellIntegrationEvent::StatusChanged(self.status));
        }
    }

    pub(crate) fn mark_sequence_seen(&mut self, dialect: Dialect, token: &str) {
        if self.seen.insert(dialect, token) {
            self.events
                .push(ShellIntegrationEvent::SequenceSeen(SeenSequence {
                    dialect,
                    token: token.to_string(),
                }));
        }
    }

    /// Report activation success once, unless the watchdog got there first
    pub(crate) fn report_activation_succeeded(&mut self) {
        if self.telemetry_latched.swap(true, Ordering::SeqCst) {
            return;
        }
        match &self.telemetry {
            Some(telemetry) if !self.config.disable_telemetry => {
                telemetry.public_log(TelemetryEvent::ActivationSucceeded)
            }
            _ => {}
        }
        tracing::debug!(target: "shell_integration::router", "shell integration activated");
        self.cancel_watchdog();
    }

    /// Deliver queued events to observers and keep them for polling
    pub(crate) fn flush_events(&mut self) {
        let events = self.events.drain();
        if events.is_empty() {
            return;
        }

        let qualifying = events.iter().any(|e| {
            matches!(
                e,
                ShellIntegrationEvent::CapabilityAdded(
                    CapabilityKind::CommandDetection | CapabilityKind::CwdDetection
                )
            )
        });
        if qualifying {
            self.cancel_watchdog();
        }

        let observers: Vec<Arc<dyn ShellIntegrationObserver>> = self
            .observers
            .iter()
            .map(|entry| Arc::clone(&entry.observer))
            .collect();
        for event in &events {
            for observer in &observers {
                dispatch(observer.as_ref(), event);
            }
        }

        let max = self.config.max_pending_events;
        if max == 0 {
            return;
        }
        self.delivered.extend(events);
        if self.delivered.len() > max {
            let excess = self.delivered.len() - max;
            self.delivered.drain(0..excess);
        }
    }
}

impl Drop for ShellIntegrationRouter {
    fn drop(&mut self) {
        self.cancel_watchdog();
    }
}

impl std::fmt::Debug for ShellIntegrationRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellIntegrationRouter")
            .field("activated", &self.is_activated())
            .field("status", &self.status)
            .field("seen", &self.seen.len())
            .field("capabilities", &self.capabilities.kinds())
            .field("observers", &self.observers.len())
            .field("watchdog", &self.watchdog)
            .finish()
    }
}
