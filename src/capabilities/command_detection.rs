//! Command detection
//!
//! Builds the command history from prompt/command markers (`A`..`D` in both
//! the FinalTerm and VS Code dialects). The command being typed or run is a
//! [`PartialCommand`]; `D` promotes it to a [`TerminalCommand`].

use serde::{Deserialize, Serialize};

use crate::event::{EventQueue, ShellIntegrationEvent};
use crate::session::{
    PromptInputState, SerializedCommand, SerializedCommandDetection, SerializedPromptInputModel,
};
use crate::terminal::{Marker, TerminalHandle};

/// How reliable the recorded command line is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandLineConfidence {
    /// Derived without help from the shell
    #[default]
    Low,
    /// Derived from well-formed markers
    Medium,
    /// Reported explicitly by the shell (`633;E`)
    High,
}

/// Options for [`CommandDetectionCapability::handle_command_start`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandStartOptions {
    /// Keep the command even when no command line was reported (FinalTerm `B`)
    pub ignore_command_line: bool,
}

/// A continuation prompt span (`633;F` .. `633;G`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Continuation {
    /// Line the continuation started on
    pub line: usize,
    /// Cursor column when it ended
    pub end: usize,
}

/// The command currently being typed or executed
#[derive(Debug, Clone, PartialEq)]
pub struct PartialCommand {
    /// Command id, assigned up front so it can be matched later
    pub id: String,
    /// Line of the prompt start (`A`)
    pub prompt_start_line: Option<usize>,
    /// Line where input begins (`B`)
    pub command_start_line: Option<usize>,
    /// Column where input begins
    pub command_start_x: Option<usize>,
    /// Right prompt start column (`H`)
    pub right_prompt_start_x: Option<usize>,
    /// Right prompt end column (`I`)
    pub right_prompt_end_x: Option<usize>,
    /// Completed continuation spans
    pub continuations: Vec<Continuation>,
    /// Open continuation span
    pub current_continuation_line: Option<usize>,
    /// Line where output begins (`C`)
    pub executed_line: Option<usize>,
    /// Column where output begins
    pub executed_x: Option<usize>,
    /// Command line, once known
    pub command: Option<String>,
    /// Confidence in `command`
    pub command_line_confidence: CommandLineConfidence,
    /// Whether `command` came with the session nonce
    pub is_trusted: bool,
    /// Working directory at command start
    pub cwd: Option<String>,
    /// Screen was cleared since the last prompt
    pub was_cleared: bool,
    /// When the command started executing (ms since epoch)
    pub executed_time: Option<u64>,
    /// When the command finished (ms since epoch)
    pub finished_time: Option<u64>,
}

impl PartialCommand {
    fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            prompt_start_line: None,
            command_start_line: None,
            command_start_x: None,
            right_prompt_start_x: None,
            right_prompt_end_x: None,
            continuations: Vec::new(),
            current_continuation_line: None,
            executed_line: None,
            executed_x: None,
            command: None,
            command_line_confidence: CommandLineConfidence::Low,
            is_trusted: true,
            cwd: None,
            was_cleared: false,
            executed_time: None,
            finished_time: None,
        }
    }

    /// Turn into a finished command
    ///
    /// Commands starting with `\` are dropped unless the command line is
    /// ignored, since they are artifacts of shells echoing escape text.
    fn promote(
        &mut self,
        cwd: Option<String>,
        exit_code: Option<i32>,
        ignore_command_line: bool,
        end_line: Option<usize>,
    ) -> Option<TerminalCommand> {
        if exit_code.is_none() && self.command.is_none() {
            self.command = Some(String::new());
        }
        let keep = self
            .command
            .as_deref()
            .is_some_and(|c| !c.starts_with('\\'));
        if !keep && !ignore_command_line {
            return None;
        }

        let start_line = self.command_start_line?;
        let timestamp = self
            .executed_time
            .unwrap_or_else(crate::unix_millis);
        let duration_ms = match (self.executed_time, self.finished_time) {
            (Some(start), Some(end)) => end.saturating_sub(start),
            _ => 0,
        };

        Some(TerminalCommand {
            id: self.id.clone(),
            command: self.command.clone().unwrap_or_default(),
            command_line_confidence: self.command_line_confidence,
            is_trusted: self.is_trusted,
            cwd,
            exit_code,
            timestamp,
            duration_ms,
            prompt_start_line: self.prompt_start_line,
            start_line,
            start_x: self.command_start_x,
            executed_line: self.executed_line,
            executed_x: self.executed_x,
            end_line,
        })
    }

    fn to_serialized(&self, cwd: Option<&str>) -> Option<SerializedCommand> {
        let start_line = self.command_start_line?;
        Some(SerializedCommand {
            id: Some(self.id.clone()),
            prompt_start_line: self.prompt_start_line,
            start_line: Some(start_line),
            start_x: self.command_start_x,
            cwd: cwd.map(str::to_string),
            is_trusted: true,
            ..SerializedCommand::default()
        })
    }
}

/// A finished command
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalCommand {
    /// Command id
    pub id: String,
    /// Command line (empty when unknown or storage is disabled)
    pub command: String,
    /// Confidence in `command`
    pub command_line_confidence: CommandLineConfidence,
    /// Whether `command` came with the session nonce
    pub is_trusted: bool,
    /// Working directory the command ran in
    pub cwd: Option<String>,
    /// Exit code, if reported
    pub exit_code: Option<i32>,
    /// When the command started executing (ms since epoch)
    pub timestamp: u64,
    /// Run time in milliseconds
    pub duration_ms: u64,
    /// Line of the prompt start
    pub prompt_start_line: Option<usize>,
    /// Line where input began
    pub start_line: usize,
    /// Column where input began
    pub start_x: Option<usize>,
    /// Line where output began
    pub executed_line: Option<usize>,
    /// Column where output began
    pub executed_x: Option<usize>,
    /// Line of the finished marker
    pub end_line: Option<usize>,
}

impl TerminalCommand {
    /// First line that belongs to this command
    pub fn first_line(&self) -> usize {
        self.prompt_start_line.unwrap_or(self.start_line)
    }

    fn to_serialized(&self, storage_disabled: bool) -> SerializedCommand {
        SerializedCommand {
            id: Some(self.id.clone()),
            prompt_start_line: self.prompt_start_line,
            start_line: Some(self.start_line),
            start_x: self.start_x,
            end_line: self.end_line,
            executed_line: self.executed_line,
            executed_x: self.executed_x,
            command: if storage_disabled {
                String::new()
            } else {
                self.command.clone()
            },
            command_line_confidence: self.command_line_confidence,
            is_trusted: self.is_trusted,
            cwd: self.cwd.clone(),
            exit_code: self.exit_code,
            timestamp: self.timestamp,
            duration: self.duration_ms,
        }
    }

    fn from_serialized(
        term: &mut dyn TerminalHandle,
        serialized: &SerializedCommand,
        storage_disabled: bool,
    ) -> Option<Self> {
        let start = pin_line(term, serialized.start_line)?;
        let prompt_start = pin_line(term, serialized.prompt_start_line);
        let executed = pin_line(term, serialized.executed_line);
        let end = pin_line(term, serialized.end_line);

        Some(Self {
            id: serialized
                .id
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            command: if storage_disabled {
                String::new()
            } else {
                serialized.command.clone()
            },
            command_line_confidence: serialized.command_line_confidence,
            is_trusted: serialized.is_trusted,
            cwd: serialized.cwd.clone(),
            exit_code: serialized.exit_code,
            timestamp: serialized.timestamp,
            duration_ms: serialized.duration,
            prompt_start_line: prompt_start.map(|m| m.line),
            start_line: start.line,
            start_x: serialized.start_x,
            executed_line: executed.map(|m| m.line),
            executed_x: serialized.executed_x,
            end_line: end.map(|m| m.line),
        })
    }
}

/// Register a marker at an absolute line, if it is still in the buffer
fn pin_line(term: &mut dyn TerminalHandle, line: Option<usize>) -> Option<Marker> {
    let line = line?;
    let offset = line as isize - term.cursor_line() as isize;
    term.register_marker(offset)
}

/// What the user is typing at the prompt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptInputModel {
    value: String,
    cursor_index: usize,
    command_start_x: usize,
    continuation_prompt: Option<String>,
    last_prompt_line: Option<String>,
    last_user_input: String,
}

impl PromptInputModel {
    /// Current input
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Cursor position within the input
    pub fn cursor_index(&self) -> usize {
        self.cursor_index
    }

    /// Continuation prompt (`PS2`), ANSI stripped
    pub fn continuation_prompt(&self) -> Option<&str> {
        self.continuation_prompt.as_deref()
    }

    /// Last line of the primary prompt
    pub fn last_prompt_line(&self) -> Option<&str> {
        self.last_prompt_line.as_deref()
    }

    fn set_confident_command_line(&mut self, value: &str) {
        self.value = value.to_string();
        self.cursor_index = value.chars().count();
        self.last_user_input = value.to_string();
    }

    fn reset_input(&mut self, command_start_x: usize) {
        self.value.clear();
        self.cursor_index = 0;
        self.command_start_x = command_start_x;
    }

    fn serialize(&self) -> SerializedPromptInputModel {
        SerializedPromptInputModel {
            model_state: PromptInputState {
                value: self.value.clone(),
                cursor_index: self.cursor_index,
                ghost_text_index: None,
            },
            command_start_x: self.command_start_x,
            last_prompt_line: self.last_prompt_line.clone(),
            continuation_prompt: self.continuation_prompt.clone(),
            last_user_input: self.last_user_input.clone(),
        }
    }

    fn deserialize(&mut self, serialized: &SerializedPromptInputModel) {
        self.value = serialized.model_state.value.clone();
        self.cursor_index = serialized.model_state.cursor_index;
        self.command_start_x = serialized.command_start_x;
        self.last_prompt_line = serialized.last_prompt_line.clone();
        self.continuation_prompt = serialized.continuation_prompt.clone();
        self.last_user_input = serialized.last_user_input.clone();
    }
}

/// Command lifecycle tracking
#[derive(Debug)]
pub struct CommandDetectionCapability {
    events: EventQueue,
    max_commands: usize,
    commands: Vec<TerminalCommand>,
    current: PartialCommand,
    command_start_options: Option<CommandStartOptions>,
    cwd: Option<String>,
    prompt_terminator: Option<String>,
    prompt_input: PromptInputModel,
    is_windows_pty: bool,
    has_rich_command_detection: bool,
    is_command_storage_disabled: bool,
    /// Host keeps the viewport in scrollback on `CSI 2 J`
    scroll_on_erase_in_display: bool,
    next_command_id: Option<(String, String)>,
}

impl CommandDetectionCapability {
    pub(crate) fn new(events: EventQueue, max_commands: usize) -> Self {
        Self {
            events,
            max_commands,
            commands: Vec::new(),
            current: PartialCommand::new(),
            command_start_options: None,
            cwd: None,
            prompt_terminator: None,
            prompt_input: PromptInputModel::default(),
            is_windows_pty: false,
            has_rich_command_detection: false,
            is_command_storage_disabled: false,
            scroll_on_erase_in_display: false,
            next_command_id: None,
        }
    }

    pub(crate) fn with_scroll_on_erase_in_display(mut self, enabled: bool) -> Self {
        self.scroll_on_erase_in_display = enabled;
        self
    }

    /// Finished commands, oldest first
    pub fn commands(&self) -> &[TerminalCommand] {
        &self.commands
    }

    /// The command being typed or executed
    pub fn current_command(&self) -> &PartialCommand {
        &self.current
    }

    /// Command line of the executing command, if any
    pub fn executing_command(&self) -> Option<&str> {
        self.current.executed_line?;
        self.current.command.as_deref()
    }

    /// Working directory as last reported to this capability
    pub fn cwd(&self) -> Option<&str> {
        self.cwd.as_deref()
    }

    /// Trailing token of the prompt
    pub fn prompt_terminator(&self) -> Option<&str> {
        self.prompt_terminator.as_deref()
    }

    /// Prompt input model
    pub fn prompt_input_model(&self) -> &PromptInputModel {
        &self.prompt_input
    }

    /// Whether the shell runs behind a Windows pty
    pub fn is_windows_pty(&self) -> bool {
        self.is_windows_pty
    }

    /// Whether the shell reports every marker reliably
    pub fn has_rich_command_detection(&self) -> bool {
        self.has_rich_command_detection
    }

    /// Whether command lines are withheld from snapshots
    pub fn is_command_storage_disabled(&self) -> bool {
        self.is_command_storage_disabled
    }

    /// `A`: prompt start
    pub fn handle_prompt_start(&mut self, term: &mut dyn TerminalHandle) {
        let cursor_line = term.cursor_line();

        // `D` normally lands where the next `A` does; pull a finished marker
        // that stayed on the executed line down, without passing the cursor
        if let Some(last) = self.commands.last_mut() {
            if let (Some(end), Some(executed)) = (last.end_line, last.executed_line) {
                if end == executed && executed < cursor_line {
                    tracing::debug!(
                        target: "shell_integration::capabilities",
                        from = end,
                        to = executed + 1,
                        "adjusted command finished marker"
                    );
                    last.end_line = Some(executed + 1);
                }
            }
        }

        let reuse = if self.current.was_cleared {
            None
        } else {
            self.commands.last().and_then(|c| c.end_line)
        };
        self.current.prompt_start_line = reuse.or_else(|| term.register_marker(0).map(|m| m.line));
        self.current.was_cleared = false;

        self.events.push(ShellIntegrationEvent::PromptStarted {
            line: self.current.prompt_start_line,
        });
    }

    /// `F`: continuation prompt start
    pub fn handle_continuation_start(&mut self, term: &mut dyn TerminalHandle) {
        self.current.current_continuation_line = term.register_marker(0).map(|m| m.line);
    }

    /// `G`: continuation prompt end
    pub fn handle_continuation_end(&mut self, term: &mut dyn TerminalHandle) {
        let Some(line) = self.current.current_continuation_line.take() else {
            tracing::warn!(
                target: "shell_integration::capabilities",
                "continuation end received without start"
            );
            return;
        };
        self.current.continuations.push(Continuation {
            line,
            end: term.cursor_x(),
        });
    }

    /// `H`: right prompt start
    pub fn handle_right_prompt_start(&mut self, term: &mut dyn TerminalHandle) {
        self.current.right_prompt_start_x = Some(term.cursor_x());
    }

    /// `I`: right prompt end
    pub fn handle_right_prompt_end(&mut self, term: &mut dyn TerminalHandle) {
        self.current.right_prompt_end_x = Some(term.cursor_x());
    }

    /// `B`: command input start
    pub fn handle_command_start(
        &mut self,
        term: &mut dyn TerminalHandle,
        options: CommandStartOptions,
    ) {
        self.command_start_options = Some(options);
        self.current.cwd = self.cwd.clone();

        // Repeated `B` on the same line only moves the column
        if self.current.command_start_line == Some(term.cursor_line()) {
            self.current.command_start_x = Some(term.cursor_x());
            return;
        }

        self.current.command_start_x = Some(term.cursor_x());
        self.current.command_start_line = term.register_marker(0).map(|m| m.line);
        // Executed must come after command start
        self.current.executed_line = None;
        self.current.executed_x = None;
        self.prompt_input.reset_input(term.cursor_x());

        tracing::debug!(
            target: "shell_integration::capabilities",
            line = ?self.current.command_start_line,
            column = term.cursor_x(),
            "command start"
        );
        self.events.push(ShellIntegrationEvent::CommandStarted {
            line: self.current.command_start_line,
            column: term.cursor_x(),
        });
    }

    /// Pre-assign the id of the next command whose line is `command`
    pub fn set_next_command_id(&mut self, command: impl Into<String>, id: impl Into<String>) {
        self.next_command_id = Some((command.into(), id.into()));
    }

    fn ensure_current_command_id(&mut self) {
        let line = self
            .current
            .command
            .clone()
            .unwrap_or_else(|| self.prompt_input.value.clone());
        if let Some((command, id)) = &self.next_command_id {
            if line.trim() == command.trim() {
                self.current.id = id.clone();
                self.next_command_id = None;
            }
        }
    }

    /// `C`: command output start
    pub fn handle_command_executed(&mut self, term: &mut dyn TerminalHandle) {
        self.ensure_current_command_id();

        self.current.executed_line = term.register_marker(0).map(|m| m.line);
        self.current.executed_x = Some(term.cursor_x());
        self.current.executed_time = Some(crate::unix_millis());

        if self.current.command_start_line.is_none()
            || self.current.executed_line.is_none()
            || self.current.command_start_x.is_none()
        {
            return;
        }

        if self.current.command.is_none() {
            self.current.command = Some(self.prompt_input.value.clone());
        }
        let command = self.current.command.clone().unwrap_or_default();
        tracing::debug!(
            target: "shell_integration::capabilities",
            %command,
            line = ?self.current.executed_line,
            "command executed"
        );
        self.events.push(ShellIntegrationEvent::CommandExecuted {
            command,
            line: self.current.executed_line,
        });
    }

    /// `D`: command finished
    pub fn handle_command_finished(
        &mut self,
        term: &mut dyn TerminalHandle,
        exit_code: Option<i32>,
    ) {
        if self.current.executed_line.is_none() {
            self.handle_command_executed(term);
        }
        self.current.finished_time = Some(crate::unix_millis());

        // Some bash versions merge identical history entries and report no
        // exit code for the repeat
        let mut exit_code = exit_code;
        if exit_code.is_none() {
            if let (Some(current), Some(last)) = (self.current.command.as_deref(), self.commands.last())
            {
                if !current.is_empty() && last.command == current {
                    exit_code = last.exit_code;
                }
            }
        }

        if self.current.command_start_line.is_none() {
            return;
        }

        let end_line = term.register_marker(0).map(|m| m.line);
        let ignore_command_line = self
            .command_start_options
            .is_some_and(|o| o.ignore_command_line);
        let promoted =
            self.current
                .promote(self.cwd.clone(), exit_code, ignore_command_line, end_line);

        if let Some(command) = promoted {
            tracing::debug!(
                target: "shell_integration::capabilities",
                command = %command.command,
                exit_code = ?command.exit_code,
                "command finished"
            );
            self.push_command(command.clone());
            self.events
                .push(ShellIntegrationEvent::CommandFinished(command));
        }

        self.current = PartialCommand::new();
        self.command_start_options = None;
    }

    fn push_command(&mut self, command: TerminalCommand) {
        self.commands.push(command);
        if self.commands.len() > self.max_commands {
            let excess = self.commands.len() - self.max_commands;
            self.commands.drain(..excess);
        }
    }

    /// `E`: explicit command line
    pub fn set_command_line(&mut self, command_line: &str, is_trusted: bool) {
        tracing::debug!(
            target: "shell_integration::capabilities",
            command_line,
            is_trusted,
            "set command line"
        );
        self.current.command = Some(command_line.to_string());
        self.current.command_line_confidence = CommandLineConfidence::High;
        self.current.is_trusted = is_trusted;
        if is_trusted {
            self.prompt_input.set_confident_command_line(command_line);
        }
    }

    /// Continuation prompt (`PS2`) reported by the shell
    pub fn set_continuation_prompt(&mut self, value: String) {
        self.prompt_input.continuation_prompt = Some(value);
    }

    /// Prompt terminator and the prompt line it was derived from
    pub fn set_prompt_terminator(&mut self, terminator: String, last_prompt_line: String) {
        tracing::debug!(
            target: "shell_integration::capabilities",
            %terminator,
            "set prompt terminator"
        );
        self.prompt_terminator = Some(terminator);
        self.prompt_input.last_prompt_line = Some(last_prompt_line);
    }

    /// Working directory for commands started from now on
    pub fn set_cwd(&mut self, cwd: String) {
        self.cwd = Some(cwd);
    }

    /// Whether the shell runs behind a Windows pty
    pub fn set_is_windows_pty(&mut self, value: bool) {
        self.is_windows_pty = value;
    }

    /// Whether the shell reports every marker reliably
    pub fn set_has_rich_command_detection(&mut self, value: bool) {
        self.has_rich_command_detection = value;
        self.events
            .push(ShellIntegrationEvent::RichCommandDetectionChanged(value));
    }

    /// Withhold command lines from snapshots (task terminals)
    pub fn set_is_command_storage_disabled(&mut self) {
        self.is_command_storage_disabled = true;
    }

    /// `CSI 2 J`: erase in display
    pub fn handle_erase_in_display(&mut self, term: &mut dyn TerminalHandle) {
        if !(self.scroll_on_erase_in_display || term.scroll_on_erase_in_display()) {
            self.clear_commands_in_viewport(&*term);
        }
        self.current.was_cleared = true;
    }

    /// Drop the trailing commands that start inside the viewport
    pub fn clear_commands_in_viewport(&mut self, term: &dyn TerminalHandle) {
        let base_y = term.base_y();
        let count = self
            .commands
            .iter()
            .rev()
            .take_while(|c| c.start_line >= base_y)
            .count();
        if count > 0 {
            let removed = self.commands.split_off(self.commands.len() - count);
            tracing::debug!(
                target: "shell_integration::capabilities",
                count,
                "commands invalidated"
            );
            self.events
                .push(ShellIntegrationEvent::CommandsInvalidated(removed));
        }
    }

    /// Finished command covering `line`
    ///
    /// Returns `None` when `line` belongs to the current (unfinished) command
    /// or precedes every recorded command.
    pub fn command_for_line(&self, line: usize) -> Option<&TerminalCommand> {
        if self
            .current
            .prompt_start_line
            .is_some_and(|start| line >= start)
        {
            return None;
        }
        self.commands.iter().rev().find(|c| c.first_line() <= line)
    }

    /// Working directory that was current at `line`
    pub fn cwd_for_line(&self, line: usize) -> Option<&str> {
        if self
            .current
            .prompt_start_line
            .is_some_and(|start| line >= start)
        {
            return self.cwd();
        }
        self.command_for_line(line).and_then(|c| c.cwd.as_deref())
    }

    /// Snapshot of the history, the current command and the input model
    pub fn serialize(&self) -> SerializedCommandDetection {
        let mut commands: Vec<SerializedCommand> = self
            .commands
            .iter()
            .map(|c| c.to_serialized(self.is_command_storage_disabled))
            .collect();
        if let Some(partial) = self.current.to_serialized(self.cwd.as_deref()) {
            commands.push(partial);
        }
        SerializedCommandDetection {
            is_windows_pty: self.is_windows_pty,
            has_rich_command_detection: self.has_rich_command_detection,
            commands,
            prompt_input_model: Some(self.prompt_input.serialize()),
        }
    }

    /// Replay a snapshot
    ///
    /// Commands whose lines are no longer in the buffer are skipped. A
    /// command without an end line restores the current command and the cwd.
    pub fn deserialize(
        &mut self,
        term: &mut dyn TerminalHandle,
        serialized: &SerializedCommandDetection,
    ) {
        if serialized.is_windows_pty {
            self.set_is_windows_pty(true);
        }
        if serialized.has_rich_command_detection {
            self.set_has_rich_command_detection(true);
        }

        for entry in &serialized.commands {
            if entry.end_line.is_none() {
                let Some(start) = pin_line(term, entry.start_line) else {
                    continue;
                };
                self.current.command_start_line = Some(start.line);
                self.current.command_start_x = entry.start_x;
                self.current.prompt_start_line =
                    pin_line(term, entry.prompt_start_line).map(|m| m.line);
                self.cwd = entry.cwd.clone();
                self.events.push(ShellIntegrationEvent::CommandStarted {
                    line: Some(start.line),
                    column: entry.start_x.unwrap_or_default(),
                });
                continue;
            }

            let Some(command) =
                TerminalCommand::from_serialized(term, entry, self.is_command_storage_disabled)
            else {
                continue;
            };
            self.push_command(command.clone());
            self.events
                .push(ShellIntegrationEvent::CommandFinished(command));
        }

        if let Some(model) = &serialized.prompt_input_model {
            self.prompt_input.deserialize(model);
        }
    }
}
