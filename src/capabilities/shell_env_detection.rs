//! Shell environment tracking
//!
//! The shell reports its environment either as a single JSON object
//! (`EnvJson`) or as a start/entry/delete/end transaction of single
//! variables. A transaction is only published when it changes something, and
//! its trust is the conjunction of the trust of every step.

use std::collections::BTreeMap;

use crate::event::{EventQueue, ShellIntegrationEvent};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct TrustedEnv {
    value: BTreeMap<String, String>,
    is_trusted: bool,
}

/// Environment variables reported by the shell
#[derive(Debug)]
pub struct ShellEnvDetectionCapability {
    events: EventQueue,
    env: TrustedEnv,
    pending: Option<TrustedEnv>,
}

impl ShellEnvDetectionCapability {
    pub(crate) fn new(events: EventQueue) -> Self {
        Self {
            events,
            env: TrustedEnv::default(),
            pending: None,
        }
    }

    /// Current environment
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env.value
    }

    /// Whether every write that produced the current environment was trusted
    pub fn is_trusted(&self) -> bool {
        self.env.is_trusted
    }

    /// Whether a single-variable transaction is open
    pub fn in_transaction(&self) -> bool {
        self.pending.is_some()
    }

    /// Replace the whole environment
    pub fn set_environment(&mut self, env: BTreeMap<String, String>, is_trusted: bool) {
        if self.env.value == env {
            return;
        }
        self.env = TrustedEnv {
            value: env,
            is_trusted,
        };
        self.fire_change();
    }

    /// Open a transaction, starting empty when `clear` is set
    pub fn start_environment_single_var(&mut self, clear: bool, is_trusted: bool) {
        self.pending = Some(if clear {
            TrustedEnv {
                value: BTreeMap::new(),
                is_trusted,
            }
        } else {
            TrustedEnv {
                value: self.env.value.clone(),
                is_trusted: self.env.is_trusted && is_trusted,
            }
        });
    }

    /// Set one variable in the open transaction
    pub fn set_environment_single_var(&mut self, key: &str, value: &str, is_trusted: bool) {
        let Some(pending) = self.pending.as_mut() else {
            return;
        };
        pending.value.insert(key.to_string(), value.to_string());
        pending.is_trusted &= is_trusted;
    }

    /// Remove one variable in the open transaction
    pub fn delete_environment_single_var(&mut self, key: &str, _value: &str, is_trusted: bool) {
        let Some(pending) = self.pending.as_mut() else {
            return;
        };
        pending.value.remove(key);
        pending.is_trusted &= is_trusted;
    }

    /// Close the transaction, publishing it when the environment changed
    pub fn end_environment_single_var(&mut self, is_trusted: bool) {
        let Some(mut pending) = self.pending.take() else {
            return;
        };
        pending.is_trusted &= is_trusted;
        if pending.value != self.env.value {
            self.env = pending;
            self.fire_change();
        }
    }

    fn fire_change(&self) {
        tracing::debug!(
            target: "shell_integration::capabilities",
            vars = self.env.value.len(),
            is_trusted = self.env.is_trusted,
            "environment changed"
        );
        self.events.push(ShellIntegrationEvent::EnvironmentChanged {
            env: self.env.value.clone(),
            is_trusted: self.env.is_trusted,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_set_environment_only_fires_on_change() {
        let events = EventQueue::new();
        let mut cap = ShellEnvDetectionCapability::new(events.clone());
        cap.set_environment(env(&[("A", "1")]), true);
        cap.set_environment(env(&[("A", "1")]), false);
        assert_eq!(events.len(), 1);
        assert!(cap.is_trusted());
    }

    #[test]
    fn test_transaction_merges_and_publishes_once() {
        let events = EventQueue::new();
        let mut cap = ShellEnvDetectionCapability::new(events.clone());
        cap.set_environment(env(&[("A", "1"), ("B", "2")]), true);
        events.drain();

        cap.start_environment_single_var(false, true);
        cap.set_environment_single_var("C", "3", true);
        cap.delete_environment_single_var("A", "1", true);
        assert!(events.is_empty());
        cap.end_environment_single_var(true);

        assert_eq!(cap.env(), &env(&[("B", "2"), ("C", "3")]));
        assert!(matches!(
            &events.drain()[..],
            [ShellIntegrationEvent::EnvironmentChanged { is_trusted: true, .. }]
        ));
    }

    #[test]
    fn test_untrusted_step_taints_transaction() {
        let events = EventQueue::new();
        let mut cap = ShellEnvDetectionCapability::new(events);
        cap.start_environment_single_var(true, true);
        cap.set_environment_single_var("PATH", "/evil", false);
        cap.end_environment_single_var(true);
        assert_eq!(cap.env().get("PATH").map(String::as_str), Some("/evil"));
        assert!(!cap.is_trusted());
    }

    #[test]
    fn test_unchanged_transaction_is_silent() {
        let events = EventQueue::new();
        let mut cap = ShellEnvDetectionCapability::new(events.clone());
        cap.set_environment(env(&[("A", "1")]), true);
        events.drain();

        cap.start_environment_single_var(false, true);
        cap.set_environment_single_var("A", "1", true);
        cap.end_environment_single_var(true);
        assert!(events.is_empty());
        assert!(!cap.in_transaction());
    }

    #[test]
    fn test_entries_without_start_are_ignored() {
        let events = EventQueue::new();
        let mut cap = ShellEnvDetectionCapability::new(events.clone());
        cap.set_environment_single_var("A", "1", true);
        cap.end_environment_single_var(true);
        assert!(cap.env().is_empty());
        assert!(events.is_empty());
    }
}
