//! Working directory sequences (`OSC 7`, `OSC 9 ; 9`) and cwd propagation

use crate::codec::{parse_osc7_url, sanitize_cwd};
use crate::router::ShellIntegrationRouter;
use crate::shell_integration::Dialect;

impl ShellIntegrationRouter {
    /// Sanitize a reported cwd and hand it to cwd and command detection
    pub(crate) fn update_cwd(
        &mut self,
        value: &str,
        hostname: Option<String>,
        username: Option<String>,
    ) {
        let cwd = sanitize_cwd(value);
        self.capabilities
            .get_or_create_cwd_detection()
            .update_remote_cwd(cwd.clone(), hostname, username);
        if let Some(detection) = self.capabilities.command_detection_mut() {
            detection.set_cwd(cwd);
        }
    }

    /// `OSC 7 ; file://[user@]host/path`
    pub(crate) fn handle_set_cwd(&mut self, data: &str) -> bool {
        if self.terminal.is_none() {
            return false;
        }
        let uri = data.split(';').next().unwrap_or_default();
        let scheme = uri.split_once("://").map_or(uri, |(scheme, _)| scheme);
        self.mark_sequence_seen(Dialect::SetCwd, scheme);

        match parse_osc7_url(uri) {
            Some(location) if !location.path.is_empty() => {
                self.update_cwd(&location.path, location.hostname, location.username);
                true
            }
            _ => false,
        }
    }

    /// `OSC 9 ; 9 ; <cwd>`
    ///
    /// Other `OSC 9` conventions (notifications, progress) share the prefix;
    /// they are left to the host.
    pub(crate) fn handle_set_windows_friendly_cwd(&mut self, data: &str) -> bool {
        if self.terminal.is_none() {
            return false;
        }
        let mut parts = data.split(';');
        let token = parts.next().unwrap_or_default();
        self.mark_sequence_seen(Dialect::SetWindowsFriendlyCwd, token);

        if token != "9" {
            return false;
        }
        if let Some(cwd) = parts.next() {
            self.update_cwd(cwd, None, None);
        }
        true
    }
}
