//! Session state snapshots
//!
//! Command history and the command in progress can be saved when a terminal
//! is detached and replayed into a new router when it is restored. The JSON
//! layout uses camelCase keys and every field is optional on read, so
//! snapshots from older or newer versions still load.

use serde::{Deserialize, Serialize};

use crate::capabilities::command_detection::CommandLineConfidence;
use crate::error::{Result, ShellIntegrationError};
use crate::router::ShellIntegrationRouter;

/// One command in a snapshot
///
/// A command without `end_line` is the command in progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SerializedCommand {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_start_line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_x: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_x: Option<usize>,
    pub command: String,
    pub command_line_confidence: CommandLineConfidence,
    pub is_trusted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Execution start, milliseconds since epoch
    pub timestamp: u64,
    /// Run time in milliseconds
    pub duration: u64,
}

/// Prompt input state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PromptInputState {
    pub value: String,
    pub cursor_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ghost_text_index: Option<usize>,
}

/// Prompt input model in a snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SerializedPromptInputModel {
    pub model_state: PromptInputState,
    pub command_start_x: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_prompt_line: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuation_prompt: Option<String>,
    pub last_user_input: String,
}

/// Snapshot of command detection state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SerializedCommandDetection {
    pub is_windows_pty: bool,
    pub has_rich_command_detection: bool,
    pub commands: Vec<SerializedCommand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_input_model: Option<SerializedPromptInputModel>,
}

impl SerializedCommandDetection {
    /// Encode as JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl ShellIntegrationRouter {
    /// Snapshot the command history
    ///
    /// Without command detection (or before activation) the snapshot is empty.
    pub fn serialize(&self) -> SerializedCommandDetection {
        if !self.is_activated() {
            return SerializedCommandDetection::default();
        }
        match self.capabilities.command_detection() {
            Some(detection) => detection.serialize(),
            None => SerializedCommandDetection::default(),
        }
    }

    /// Replay a snapshot taken with [`Self::serialize`]
    ///
    /// The restored cwd (from the command in progress) is re-applied to cwd
    /// detection.
    pub fn deserialize(&mut self, snapshot: &SerializedCommandDetection) -> Result<()> {
        let Some(term) = self.terminal.as_deref_mut() else {
            return Err(ShellIntegrationError::NotActivated("restore commands"));
        };
        let detection = self.capabilities.get_or_create_command_detection();
        detection.deserialize(term, snapshot);
        if let Some(cwd) = detection.cwd().map(str::to_string) {
            self.update_cwd(&cwd, None, None);
        }
        self.flush_events();
        Ok(())
    }

    /// Snapshot the command history as JSON
    pub fn serialize_json(&self) -> Result<String> {
        self.serialize().to_json()
    }

    /// Replay a JSON snapshot
    pub fn deserialize_json(&mut self, json: &str) -> Result<()> {
        let snapshot = SerializedCommandDetection::from_json(json)?;
        self.deserialize(&snapshot)
    }
}
