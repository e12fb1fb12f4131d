//! iTerm2 (`OSC 1337`) marks and working directory
//!
//! Only the first `;`-separated token is considered. Unlike `OSC 633 ; P`,
//! values are not unescaped, matching iTerm2's own parser.

use crate::codec::parse_key_value_assignment;
use crate::router::ShellIntegrationRouter;
use crate::shell_integration::Dialect;

impl ShellIntegrationRouter {
    /// `OSC 1337 ; SetMark` and `OSC 1337 ; CurrentDir=<path>`
    pub(crate) fn handle_iterm_sequence(&mut self, data: &str) -> bool {
        if self.terminal.is_none() {
            return false;
        }
        let token = data.split(';').next().unwrap_or_default();
        let kv = parse_key_value_assignment(token);
        // Keyed by property name so every new directory is not a new sequence
        self.mark_sequence_seen(Dialect::ITerm, kv.key);

        if token == "SetMark" {
            if let Some(term) = self.terminal.as_deref_mut() {
                self.capabilities
                    .get_or_create_buffer_mark_detection()
                    .add_mark(term, None);
            }
            return true;
        }

        match (kv.key, kv.value) {
            ("CurrentDir", Some(path)) => {
                self.update_cwd(path, None, None);
                true
            }
            // Images, badges, user vars, ... belong to the host
            _ => false,
        }
    }
}
