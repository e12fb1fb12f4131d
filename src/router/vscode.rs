//! VS Code (`OSC 633`) shell integration
//!
//! `OSC 633 ; <token> [; <arg>]*`. Arguments of `E`, `P` and the env
//! sequences are escaped with [`codec::encode`](crate::codec::encode).

use std::collections::BTreeMap;

use crate::capabilities::command_detection::CommandStartOptions;
use crate::codec::{
    decode, parse_key_value_assignment, parse_mark_sequence, remove_ansi_escape_codes_from_prompt,
    strip_sgr,
};
use crate::router::ShellIntegrationRouter;
use crate::shell_integration::{Dialect, ShellIntegrationStatus};

/// `OSC 633` commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VSCodeCommand {
    /// `A`
    PromptStart,
    /// `B`
    CommandStart,
    /// `C`
    CommandExecuted,
    /// `D [; <exit code>]`
    CommandFinished,
    /// `E ; <command line> [; <nonce>]`
    CommandLine,
    /// `F`
    ContinuationStart,
    /// `G`
    ContinuationEnd,
    /// `H`
    RightPromptStart,
    /// `I`
    RightPromptEnd,
    /// `P ; <key>=<value>`
    Property,
    /// `SetMark [; Id=<id>] [; Hidden]`
    SetMark,
    /// `EnvJson ; <json> [; <nonce>]`
    EnvJson,
    /// `EnvSingleStart ; <clear> [; <nonce>]`
    EnvSingleStart,
    /// `EnvSingleEntry ; <key> ; <value> [; <nonce>]`
    EnvSingleEntry,
    /// `EnvSingleDelete ; <key> ; <value> [; <nonce>]`
    EnvSingleDelete,
    /// `EnvSingleEnd [; <nonce>]`
    EnvSingleEnd,
}

impl VSCodeCommand {
    fn from_token(token: &str) -> Option<Self> {
        let command = match token {
            "A" => Self::PromptStart,
            "B" => Self::CommandStart,
            "C" => Self::CommandExecuted,
            "D" => Self::CommandFinished,
            "E" => Self::CommandLine,
            "F" => Self::ContinuationStart,
            "G" => Self::ContinuationEnd,
            "H" => Self::RightPromptStart,
            "I" => Self::RightPromptEnd,
            "P" => Self::Property,
            "SetMark" => Self::SetMark,
            "EnvJson" => Self::EnvJson,
            "EnvSingleStart" => Self::EnvSingleStart,
            "EnvSingleEntry" => Self::EnvSingleEntry,
            "EnvSingleDelete" => Self::EnvSingleDelete,
            "EnvSingleEnd" => Self::EnvSingleEnd,
            _ => return None,
        };
        Some(command)
    }
}

/// Keys of `633 ; P`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PropertyKey {
    ContinuationPrompt,
    Cwd,
    IsWindows,
    HasRichCommandDetection,
    Prompt,
    PromptType,
    Task,
}

impl PropertyKey {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "ContinuationPrompt" => Some(Self::ContinuationPrompt),
            "Cwd" => Some(Self::Cwd),
            "IsWindows" => Some(Self::IsWindows),
            "HasRichCommandDetection" => Some(Self::HasRichCommandDetection),
            "Prompt" => Some(Self::Prompt),
            "PromptType" => Some(Self::PromptType),
            "Task" => Some(Self::Task),
            _ => None,
        }
    }
}

/// Split `prompt` into its terminator and last line
///
/// A last line that is a single visible character (`"❯ "`) is the
/// terminator as a whole; otherwise the terminator runs from the last space.
pub(crate) fn prompt_terminator(prompt: &str) -> Option<(String, String)> {
    let last_line = match prompt.rfind('\n') {
        Some(i) => &prompt[i + 1..],
        None => prompt,
    };
    let terminator = if last_line.trim().chars().count() == 1 {
        last_line
    } else {
        match last_line.rfind(' ') {
            Some(i) => &last_line[i..],
            None => last_line,
        }
    };
    if terminator.is_empty() {
        return None;
    }
    Some((terminator.to_string(), last_line.to_string()))
}

impl ShellIntegrationRouter {
    /// `OSC 633`; any sequence raises the status to VSCode
    pub(crate) fn handle_vscode_sequence(&mut self, data: &str) -> bool {
        let handled = self.dispatch_vscode(data);
        if handled {
            self.report_activation_succeeded();
        }
        self.advance_status(ShellIntegrationStatus::VSCode);
        handled
    }

    fn dispatch_vscode(&mut self, data: &str) -> bool {
        if self.terminal.is_none() {
            return false;
        }
        let (token, args): (&str, Vec<&str>) = match data.split_once(';') {
            Some((token, rest)) => (token, rest.split(';').collect()),
            None => (data, Vec::new()),
        };
        self.mark_sequence_seen(Dialect::VSCode, token);

        let Some(command) = VSCodeCommand::from_token(token) else {
            return false;
        };
        let arg = |i: usize| args.get(i).copied();

        match command {
            VSCodeCommand::PromptStart
            | VSCodeCommand::CommandStart
            | VSCodeCommand::CommandExecuted
            | VSCodeCommand::CommandFinished
            | VSCodeCommand::ContinuationStart
            | VSCodeCommand::ContinuationEnd
            | VSCodeCommand::RightPromptStart
            | VSCodeCommand::RightPromptEnd => {
                self.dispatch_vscode_marker(command, arg(0));
                true
            }
            VSCodeCommand::CommandLine => {
                let command_line = arg(0).map(decode).unwrap_or_default();
                let is_trusted = self.is_trusted(arg(1));
                self.capabilities
                    .get_or_create_command_detection()
                    .set_command_line(&command_line, is_trusted);
                true
            }
            VSCodeCommand::Property => {
                let property = arg(0).map(decode).unwrap_or_default();
                self.handle_property(&property)
            }
            VSCodeCommand::SetMark => {
                let properties = parse_mark_sequence(&args);
                if let Some(term) = self.terminal.as_deref_mut() {
                    self.capabilities
                        .get_or_create_buffer_mark_detection()
                        .add_mark(term, Some(properties));
                }
                true
            }
            VSCodeCommand::EnvJson => {
                if let Some(raw) = arg(0) {
                    let is_trusted = self.is_trusted(arg(1));
                    match serde_json::from_str::<BTreeMap<String, String>>(&decode(raw)) {
                        Ok(env) => self
                            .capabilities
                            .get_or_create_shell_env_detection()
                            .set_environment(env, is_trusted),
                        Err(err) => tracing::warn!(
                            target: "shell_integration::router",
                            error = %err,
                            payload = raw,
                            "Failed to parse environment from shell integration sequence"
                        ),
                    }
                }
                true
            }
            VSCodeCommand::EnvSingleStart => {
                let clear = arg(0) == Some("1");
                let is_trusted = self.is_trusted(arg(1));
                self.capabilities
                    .get_or_create_shell_env_detection()
                    .start_environment_single_var(clear, is_trusted);
                true
            }
            VSCodeCommand::EnvSingleEntry | VSCodeCommand::EnvSingleDelete => {
                if let (Some(key), Some(value)) = (arg(0), arg(1)) {
                    let value = decode(value);
                    let is_trusted = self.is_trusted(arg(2));
                    let env = self.capabilities.get_or_create_shell_env_detection();
                    if command == VSCodeCommand::EnvSingleEntry {
                        env.set_environment_single_var(key, &value, is_trusted);
                    } else {
                        env.delete_environment_single_var(key, &value, is_trusted);
                    }
                }
                true
            }
            VSCodeCommand::EnvSingleEnd => {
                let is_trusted = self.is_trusted(arg(0));
                self.capabilities
                    .get_or_create_shell_env_detection()
                    .end_environment_single_var(is_trusted);
                true
            }
        }
    }

    /// `A`..`D` and `F`..`I`, which only need the terminal position
    fn dispatch_vscode_marker(&mut self, command: VSCodeCommand, arg0: Option<&str>) {
        let Some(term) = self.terminal.as_deref_mut() else {
            return;
        };
        let detection = self.capabilities.get_or_create_command_detection();
        match command {
            VSCodeCommand::PromptStart => detection.handle_prompt_start(term),
            VSCodeCommand::CommandStart => {
                detection.handle_command_start(term, CommandStartOptions::default())
            }
            VSCodeCommand::CommandExecuted => detection.handle_command_executed(term),
            VSCodeCommand::CommandFinished => {
                let exit_code = arg0.and_then(|code| code.parse::<i32>().ok());
                detection.handle_command_finished(term, exit_code);
            }
            VSCodeCommand::ContinuationStart => detection.handle_continuation_start(term),
            VSCodeCommand::ContinuationEnd => detection.handle_continuation_end(term),
            VSCodeCommand::RightPromptStart => detection.handle_right_prompt_start(term),
            VSCodeCommand::RightPromptEnd => detection.handle_right_prompt_end(term),
            _ => {}
        }
    }

    /// `P ; <key>=<value>`; a property without `=` is accepted and ignored
    fn handle_property(&mut self, property: &str) -> bool {
        let kv = parse_key_value_assignment(property);
        let Some(value) = kv.value else {
            return true;
        };
        let Some(key) = PropertyKey::from_key(kv.key) else {
            tracing::debug!(
                target: "shell_integration::router",
                key = kv.key,
                "unknown shell integration property"
            );
            return false;
        };

        match key {
            PropertyKey::ContinuationPrompt => {
                self.capabilities
                    .get_or_create_command_detection()
                    .set_continuation_prompt(remove_ansi_escape_codes_from_prompt(value));
            }
            PropertyKey::Cwd => self.update_cwd(value, None, None),
            PropertyKey::IsWindows => self
                .capabilities
                .get_or_create_command_detection()
                .set_is_windows_pty(value == "True"),
            PropertyKey::HasRichCommandDetection => self
                .capabilities
                .get_or_create_command_detection()
                .set_has_rich_command_detection(value == "True"),
            PropertyKey::Prompt => {
                if let Some((terminator, last_line)) = prompt_terminator(&strip_sgr(value)) {
                    self.capabilities
                        .get_or_create_command_detection()
                        .set_prompt_terminator(terminator, last_line);
                }
            }
            PropertyKey::PromptType => self
                .capabilities
                .get_or_create_prompt_type_detection()
                .set_prompt_type(value.to_string()),
            PropertyKey::Task => {
                self.capabilities.get_or_create_buffer_mark_detection();
                if let Some(detection) = self.capabilities.command_detection_mut() {
                    detection.set_is_command_storage_disabled();
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_terminator_from_last_space() {
        assert_eq!(
            prompt_terminator("user@host ~/src $ "),
            Some((" ".to_string(), "user@host ~/src $ ".to_string()))
        );
        assert_eq!(
            prompt_terminator("user@host ~/src $"),
            Some((" $".to_string(), "user@host ~/src $".to_string()))
        );
    }

    #[test]
    fn test_prompt_terminator_single_char_line() {
        assert_eq!(
            prompt_terminator("~/src on main\n❯ "),
            Some(("❯ ".to_string(), "❯ ".to_string()))
        );
    }

    #[test]
    fn test_prompt_terminator_without_space_is_whole_line() {
        assert_eq!(
            prompt_terminator("PS>"),
            Some(("PS>".to_string(), "PS>".to_string()))
        );
    }

    #[test]
    fn test_prompt_terminator_empty() {
        assert_eq!(prompt_terminator(""), None);
        assert_eq!(prompt_terminator("line\n"), None);
    }
}
