//! Prompt framework reported by the shell (`starship`, `oh-my-posh`, ...)

use crate::event::{EventQueue, ShellIntegrationEvent};

/// Tracks the prompt type
#[derive(Debug)]
pub struct PromptTypeDetectionCapability {
    events: EventQueue,
    prompt_type: Option<String>,
}

impl PromptTypeDetectionCapability {
    pub(crate) fn new(events: EventQueue) -> Self {
        Self {
            events,
            prompt_type: None,
        }
    }

    /// Last reported prompt type
    pub fn prompt_type(&self) -> Option<&str> {
        self.prompt_type.as_deref()
    }

    /// Record the prompt type, emitting `PromptTypeChanged` when it differs
    pub fn set_prompt_type(&mut self, value: String) {
        if self.prompt_type.as_deref() == Some(value.as_str()) {
            return;
        }
        self.prompt_type = Some(value.clone());
        self.events
            .push(ShellIntegrationEvent::PromptTypeChanged(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_detection() {
        let events = EventQueue::new();
        let mut cap = PromptTypeDetectionCapability::new(events.clone());
        cap.set_prompt_type("starship".into());
        cap.set_prompt_type("starship".into());
        cap.set_prompt_type("p10k".into());
        assert_eq!(cap.prompt_type(), Some("p10k"));
        assert_eq!(events.len(), 2);
    }
}
