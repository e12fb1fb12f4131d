//! Working directory tracking

use crate::event::{CwdChange, EventQueue, ShellIntegrationEvent};

/// Tracks the shell's current working directory
#[derive(Debug)]
pub struct CwdDetectionCapability {
    events: EventQueue,
    cwd: Option<String>,
    hostname: Option<String>,
    username: Option<String>,
    /// Distinct cwds, most recently used last
    cwds: Vec<String>,
    max_cwds: usize,
}

impl CwdDetectionCapability {
    pub(crate) fn new(events: EventQueue, max_cwds: usize) -> Self {
        Self {
            events,
            cwd: None,
            hostname: None,
            username: None,
            cwds: Vec::new(),
            max_cwds,
        }
    }

    /// Current working directory
    pub fn cwd(&self) -> Option<&str> {
        self.cwd.as_deref()
    }

    /// Remote host of the current directory, if reported
    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    /// Remote user of the current directory, if reported
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Every distinct cwd seen, least recently used first
    pub fn cwds(&self) -> &[String] {
        &self.cwds
    }

    /// Record a local working directory
    pub fn update_cwd(&mut self, cwd: String) {
        self.update_remote_cwd(cwd, None, None);
    }

    /// Record a working directory with the host/user it belongs to
    ///
    /// `CwdChanged` is only emitted when the path or host differs from the
    /// current one.
    pub fn update_remote_cwd(
        &mut self,
        cwd: String,
        hostname: Option<String>,
        username: Option<String>,
    ) {
        let changed = self.cwd.as_deref() != Some(cwd.as_str()) || self.hostname != hostname;

        self.cwds.retain(|c| c != &cwd);
        self.cwds.push(cwd.clone());
        if self.cwds.len() > self.max_cwds {
            let excess = self.cwds.len() - self.max_cwds;
            self.cwds.drain(..excess);
        }

        let old_cwd = self.cwd.replace(cwd.clone());
        self.hostname = hostname.clone();
        self.username = username.clone();

        if changed {
            self.events
                .push(ShellIntegrationEvent::CwdChanged(CwdChange {
                    old_cwd,
                    new_cwd: cwd,
                    hostname,
                    username,
                }));
        }
    }
}
