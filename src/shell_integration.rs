//! Shell integration activation state
//!
//! Tracks which dialect the shell speaks and which sequences it has used.

use std::collections::HashSet;
use std::fmt;

/// OSC numeric prefixes the router claims
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dialect {
    /// `OSC 7 ; file://host/path` (cwd only)
    SetCwd,
    /// `OSC 9 ; 9 ; path` (Windows Terminal style cwd)
    SetWindowsFriendlyCwd,
    /// `OSC 133` FinalTerm prompt/command markers
    FinalTerm,
    /// `OSC 633` VS Code shell integration
    VSCode,
    /// `OSC 1337` iTerm2 proprietary sequences
    ITerm,
}

impl Dialect {
    /// Every dialect, in handler registration order
    pub const ALL: [Dialect; 5] = [
        Dialect::VSCode,
        Dialect::ITerm,
        Dialect::FinalTerm,
        Dialect::SetCwd,
        Dialect::SetWindowsFriendlyCwd,
    ];

    /// The OSC `Ps` parameter for this dialect
    pub fn osc_prefix(self) -> u16 {
        match self {
            Dialect::SetCwd => 7,
            Dialect::SetWindowsFriendlyCwd => 9,
            Dialect::FinalTerm => 133,
            Dialect::VSCode => 633,
            Dialect::ITerm => 1337,
        }
    }

    /// Look up the dialect for an OSC `Ps` parameter
    pub fn from_osc_prefix(ps: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.osc_prefix() == ps)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.osc_prefix())
    }
}

/// Shell integration activation level
///
/// Ordered: a status only ever moves to a greater value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShellIntegrationStatus {
    /// No shell integration sequence seen
    #[default]
    Off,
    /// FinalTerm (OSC 133) sequences seen
    FinalTerm,
    /// VS Code (OSC 633) sequences seen
    VSCode,
}

impl ShellIntegrationStatus {
    /// Move to `next` if it ranks higher; returns true when the status changed
    pub fn advance(&mut self, next: ShellIntegrationStatus) -> bool {
        if next > *self {
            *self = next;
            true
        } else {
            false
        }
    }
}

impl fmt::Display for ShellIntegrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShellIntegrationStatus::Off => write!(f, "off"),
            ShellIntegrationStatus::FinalTerm => write!(f, "final_term"),
            ShellIntegrationStatus::VSCode => write!(f, "vscode"),
        }
    }
}

/// A `(dialect, token)` pair observed on the wire
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeenSequence {
    /// Dialect the sequence arrived on
    pub dialect: Dialect,
    /// Leading token (`A`, `P`, `SetMark`, `CurrentDir=...` key, ...)
    pub token: String,
}

impl fmt::Display for SeenSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{}", self.dialect, self.token)
    }
}

/// Append-only record of sequences seen, in first-seen order
#[derive(Debug, Clone, Default)]
pub struct SeenSequences {
    order: Vec<SeenSequence>,
    index: HashSet<SeenSequence>,
}

impl SeenSequences {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sequence; returns true only the first time it is seen
    pub fn insert(&mut self, dialect: Dialect, token: &str) -> bool {
        let seen = SeenSequence {
            dialect,
            token: token.to_string(),
        };
        if self.index.contains(&seen) {
            return false;
        }
        self.index.insert(seen.clone());
        self.order.push(seen);
        true
    }

    /// Whether the pair has been seen
    pub fn contains(&self, dialect: Dialect, token: &str) -> bool {
        self.index.contains(&SeenSequence {
            dialect,
            token: token.to_string(),
        })
    }

    /// Number of distinct sequences seen
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether nothing has been seen yet
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Seen sequences in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = &SeenSequence> {
        self.order.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_never_regresses() {
        let mut status = ShellIntegrationStatus::Off;
        assert!(status.advance(ShellIntegrationStatus::FinalTerm));
        assert!(status.advance(ShellIntegrationStatus::VSCode));
        assert!(!status.advance(ShellIntegrationStatus::FinalTerm));
        assert!(!status.advance(ShellIntegrationStatus::Off));
        assert_eq!(status, ShellIntegrationStatus::VSCode);
    }

    #[test]
    fn test_status_same_value_is_not_a_change() {
        let mut status = ShellIntegrationStatus::FinalTerm;
        assert!(!status.advance(ShellIntegrationStatus::FinalTerm));
    }

    #[test]
    fn test_dialect_prefixes() {
        for dialect in Dialect::ALL {
            assert_eq!(Dialect::from_osc_prefix(dialect.osc_prefix()), Some(dialect));
        }
        assert_eq!(Dialect::from_osc_prefix(52), None);
        assert_eq!(Dialect::VSCode.to_string(), "633");
    }

    #[test]
    fn test_seen_sequences_idempotent() {
        let mut seen = SeenSequences::new();
        assert!(seen.insert(Dialect::VSCode, "A"));
        assert!(!seen.insert(Dialect::VSCode, "A"));
        assert!(seen.insert(Dialect::FinalTerm, "A"));
        assert_eq!(seen.len(), 2);
        assert!(seen.contains(Dialect::FinalTerm, "A"));
        assert!(!seen.contains(Dialect::ITerm, "A"));
    }

    #[test]
    fn test_seen_sequences_order() {
        let mut seen = SeenSequences::new();
        seen.insert(Dialect::VSCode, "P");
        seen.insert(Dialect::ITerm, "SetMark");
        seen.insert(Dialect::VSCode, "P");
        let listed: Vec<String> = seen.iter().map(|s| s.to_string()).collect();
        assert_eq!(listed, vec!["633;P", "1337;SetMark"]);
    }
}
