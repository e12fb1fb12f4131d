//! FinalTerm (`OSC 133`) prompt and command markers

use crate::capabilities::command_detection::CommandStartOptions;
use crate::router::ShellIntegrationRouter;
use crate::shell_integration::{Dialect, ShellIntegrationStatus};

/// `OSC 133 ; <token>` commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FinalTermCommand {
    /// `A`
    PromptStart,
    /// `B`
    CommandStart,
    /// `C`
    CommandExecuted,
    /// `D [; <exit code>]`
    CommandFinished,
}

impl FinalTermCommand {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "A" => Some(Self::PromptStart),
            "B" => Some(Self::CommandStart),
            "C" => Some(Self::CommandExecuted),
            "D" => Some(Self::CommandFinished),
            _ => None,
        }
    }
}

impl ShellIntegrationRouter {
    /// `OSC 133`; any sequence raises the status to at least FinalTerm
    pub(crate) fn handle_final_term_sequence(&mut self, data: &str) -> bool {
        let handled = self.dispatch_final_term(data);
        self.advance_status(ShellIntegrationStatus::FinalTerm);
        handled
    }

    fn dispatch_final_term(&mut self, data: &str) -> bool {
        if self.terminal.is_none() {
            return false;
        }
        let mut parts = data.split(';');
        let token = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();
        self.mark_sequence_seen(Dialect::FinalTerm, token);

        let Some(command) = FinalTermCommand::from_token(token) else {
            return false;
        };
        let Some(term) = self.terminal.as_deref_mut() else {
            return false;
        };
        let detection = self.capabilities.get_or_create_command_detection();
        match command {
            FinalTermCommand::PromptStart => detection.handle_prompt_start(term),
            // Command lines around `B` are unreliable in FinalTerm shells
            // (powerlevel10k instant prompt)
            FinalTermCommand::CommandStart => detection.handle_command_start(
                term,
                CommandStartOptions {
                    ignore_command_line: true,
                },
            ),
            FinalTermCommand::CommandExecuted => detection.handle_command_executed(term),
            FinalTermCommand::CommandFinished => {
                let exit_code = match args.as_slice() {
                    [code] => code.parse::<i32>().ok(),
                    _ => None,
                };
                detection.handle_command_finished(term, exit_code);
            }
        }
        true
    }
}
