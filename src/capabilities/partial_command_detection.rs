//! Heuristic command detection for shells without integration
//!
//! Every time the user presses enter with the cursor past a minimal prompt,
//! the current line is treated as a command.

use crate::event::{EventQueue, ShellIntegrationEvent};
use crate::terminal::{Marker, TerminalHandle};

/// Command boundaries guessed from user input
#[derive(Debug)]
pub struct PartialCommandDetectionCapability {
    events: EventQueue,
    min_prompt_length: usize,
    commands: Vec<Marker>,
}

impl PartialCommandDetectionCapability {
    pub(crate) fn new(events: EventQueue, min_prompt_length: usize) -> Self {
        Self {
            events,
            min_prompt_length,
            commands: Vec::new(),
        }
    }

    /// Markers of the detected commands, oldest first
    pub fn commands(&self) -> &[Marker] {
        &self.commands
    }

    /// Raw input sent to the shell
    pub fn handle_input(&mut self, term: &mut dyn TerminalHandle, data: &str) {
        if data == "\r" {
            self.handle_enter(term);
        }
    }

    /// The user submitted a line
    pub fn handle_enter(&mut self, term: &mut dyn TerminalHandle) {
        if term.cursor_x() < self.min_prompt_length {
            return;
        }
        if let Some(marker) = term.register_marker(0) {
            self.commands.push(marker);
            self.events
                .push(ShellIntegrationEvent::PartialCommandDetected(marker));
        }
    }

    /// `CSI Ps J`: `2` and `3` drop the markers inside the viewport
    pub fn handle_erase_in_display(&mut self, term: &dyn TerminalHandle, param: u16) {
        if param != 2 && param != 3 {
            return;
        }
        let base_y = term.base_y();
        let keep = self.commands.len()
            - self
                .commands
                .iter()
                .rev()
                .take_while(|m| m.line >= base_y)
                .count();
        self.commands.truncate(keep);
    }
}
