//! Byte stream adapter
//!
//! Hosts that do not have their own escape sequence parser can feed raw PTY
//! output through [`ShellIntegrationParser`]. OSC sequences go to the
//! router, cursor movement goes to the attached [`TerminalHandle`], and OSC
//! sequences the router does not claim are collected for the host.
//!
//! [`TerminalHandle`]: crate::terminal::TerminalHandle

use vte::{Params, Perform};

use crate::router::ShellIntegrationRouter;

/// An OSC sequence left for the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnhandledOsc {
    /// `Ps` parameter as sent
    pub command: String,
    /// Remaining parameters, joined with `;`
    pub data: String,
}

/// `vte` driven front end for a [`ShellIntegrationRouter`]
pub struct ShellIntegrationParser {
    parser: vte::Parser,
    router: ShellIntegrationRouter,
    unhandled: Vec<UnhandledOsc>,
}

impl ShellIntegrationParser {
    /// Wrap an (activated) router
    pub fn new(router: ShellIntegrationRouter) -> Self {
        Self {
            parser: vte::Parser::new(),
            router,
            unhandled: Vec::new(),
        }
    }

    /// Process PTY output
    pub fn feed(&mut self, data: &[u8]) {
        let mut parser = std::mem::replace(&mut self.parser, vte::Parser::new());
        parser.advance(self, data);
        self.parser = parser;
    }

    /// Forward user input to the router
    pub fn input(&mut self, data: &str) {
        self.router.handle_data(data);
    }

    /// The wrapped router
    pub fn router(&self) -> &ShellIntegrationRouter {
        &self.router
    }

    /// The wrapped router (mutable)
    pub fn router_mut(&mut self) -> &mut ShellIntegrationRouter {
        &mut self.router
    }

    /// Unwrap the router
    pub fn into_router(self) -> ShellIntegrationRouter {
        self.router
    }

    /// Take the OSC sequences the router did not handle
    pub fn take_unhandled(&mut self) -> Vec<UnhandledOsc> {
        std::mem::take(&mut self.unhandled)
    }
}

impl Perform for ShellIntegrationParser {
    fn print(&mut self, c: char) {
        if let Some(term) = self.router.terminal_mut() {
            term.print(c);
        }
    }

    fn execute(&mut self, byte: u8) {
        if let Some(term) = self.router.terminal_mut() {
            term.execute(byte);
        }
    }

    fn osc_dispatch(&mut self, params: &[&[u8]], _bell_terminated: bool) {
        let Some((command, rest)) = params.split_first() else {
            return;
        };
        let command = String::from_utf8_lossy(command).into_owned();
        let data = rest
            .iter()
            .map(|p| String::from_utf8_lossy(p))
            .collect::<Vec<_>>()
            .join(";");

        let handled = command
            .parse::<u16>()
            .is_ok_and(|ps| self.router.handle_osc(ps, &data));
        if !handled {
            self.unhandled.push(UnhandledOsc { command, data });
        }
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], ignore: bool, action: char) {
        if ignore || !intermediates.is_empty() {
            return;
        }
        let first = params
            .iter()
            .next()
            .and_then(|p| p.first().copied())
            .unwrap_or(0);
        // Shell integration sees the sequence before the screen changes
        self.router.handle_csi(first, action);
        if let Some(term) = self.router.terminal_mut() {
            term.csi(first, action);
        }
    }
}

impl std::fmt::Debug for ShellIntegrationParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellIntegrationParser")
            .field("router", &self.router)
            .field("unhandled", &self.unhandled.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShellIntegrationConfig;
    use crate::shell_integration::ShellIntegrationStatus;
    use crate::terminal::CursorTracker;

    fn parser() -> ShellIntegrationParser {
        let mut router = ShellIntegrationRouter::new(ShellIntegrationConfig::default(), None);
        router.activate(Box::new(CursorTracker::new(80, 24)));
        ShellIntegrationParser::new(router)
    }

    #[test]
    fn test_osc_routed_and_unclaimed_collected() {
        let mut parser = parser();
        parser.feed(b"\x1b]633;A\x07$ \x1b]0;title\x07\x1b]9;4;1;50\x1b\\");

        assert_eq!(parser.router().status(), ShellIntegrationStatus::VSCode);
        assert_eq!(
            parser.take_unhandled(),
            vec![
                UnhandledOsc {
                    command: "0".into(),
                    data: "title".into()
                },
                UnhandledOsc {
                    command: "9".into(),
                    data: "4;1;50".into()
                },
            ]
        );
        assert!(parser.take_unhandled().is_empty());
    }

    #[test]
    fn test_cursor_follows_output() {
        let mut parser = parser();
        parser.feed(b"line one\r\nline two\r\n\x1b]133;A\x07$ \x1b]133;B\x07");

        let detection = parser.router().capabilities().command_detection().unwrap();
        assert_eq!(detection.current_command().prompt_start_line, Some(2));
        assert_eq!(detection.current_command().command_start_x, Some(2));
    }

    #[test]
    fn test_full_command_from_stream() {
        let mut parser = parser();
        parser.feed(b"\x1b]633;A\x07$ \x1b]633;B\x07");
        parser.feed(b"\x1b]633;E;ls\x07\r\n\x1b]633;C\x07a.txt\r\n\x1b]633;D;0\x07");

        let detection = parser.router().capabilities().command_detection().unwrap();
        let command = &detection.commands()[0];
        assert_eq!(command.command, "ls");
        assert_eq!(command.exit_code, Some(0));
        assert!(!command.is_trusted);
        assert_eq!(command.executed_line, Some(1));
        assert_eq!(command.end_line, Some(2));
    }
}
