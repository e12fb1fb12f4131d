//! Buffer marks (points of interest set by the shell)

use std::collections::HashMap;

use crate::codec::MarkProperties;
use crate::event::{EventQueue, ShellIntegrationEvent};
use crate::terminal::{Marker, TerminalHandle};

/// A mark placed in the buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferMark {
    /// Marker pinned at the mark's line
    pub marker: Marker,
    /// Id given by the shell, if any
    pub id: Option<String>,
    /// Whether the mark should be hidden from decorations
    pub hidden: bool,
}

/// Stores marks added through `SetMark` sequences
#[derive(Debug)]
pub struct BufferMarkCapability {
    events: EventQueue,
    marks: Vec<BufferMark>,
    by_id: HashMap<String, usize>,
}

impl BufferMarkCapability {
    pub(crate) fn new(events: EventQueue) -> Self {
        Self {
            events,
            marks: Vec::new(),
            by_id: HashMap::new(),
        }
    }

    /// Add a mark at the cursor line
    ///
    /// A mark re-using an id replaces the previous mark for lookups.
    pub fn add_mark(&mut self, term: &mut dyn TerminalHandle, properties: Option<MarkProperties>) {
        let properties = properties.unwrap_or_default();
        let Some(marker) = term.register_marker(0) else {
            tracing::debug!(
                target: "shell_integration::capabilities",
                "mark outside the buffer dropped"
            );
            return;
        };

        if let Some(id) = &properties.id {
            self.by_id.insert(id.clone(), self.marks.len());
        }
        self.marks.push(BufferMark {
            marker,
            id: properties.id.clone(),
            hidden: properties.hidden,
        });
        self.events
            .push(ShellIntegrationEvent::MarkAdded { marker, properties });
    }

    /// Mark registered under `id`
    pub fn get_mark(&self, id: &str) -> Option<&BufferMark> {
        self.by_id.get(id).and_then(|&i| self.marks.get(i))
    }

    /// All marks, oldest first
    pub fn marks(&self) -> &[BufferMark] {
        &self.marks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::CursorTracker;

    #[test]
    fn test_add_and_lookup() {
        let events = EventQueue::new();
        let mut cap = BufferMarkCapability::new(events.clone());
        let mut term = CursorTracker::new(80, 24);

        term.set_cursor(0, 3);
        cap.add_mark(&mut term, None);
        term.set_cursor(0, 7);
        cap.add_mark(
            &mut term,
            Some(MarkProperties {
                id: Some("build".into()),
                hidden: true,
            }),
        );

        assert_eq!(cap.marks().len(), 2);
        let mark = cap.get_mark("build").unwrap();
        assert_eq!(mark.marker.line, 7);
        assert!(mark.hidden);
        assert!(cap.get_mark("missing").is_none());
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_reused_id_points_at_latest() {
        let events = EventQueue::new();
        let mut cap = BufferMarkCapability::new(events);
        let mut term = CursorTracker::new(80, 24);
        let props = MarkProperties {
            id: Some("x".into()),
            hidden: false,
        };

        term.set_cursor(0, 1);
        cap.add_mark(&mut term, Some(props.clone()));
        term.set_cursor(0, 2);
        cap.add_mark(&mut term, Some(props));
        assert_eq!(cap.get_mark("x").unwrap().marker.line, 2);
    }
}
