//! Core types for declarative resource management

use serde::{Deserialize, Serialize};
use std::fmt;

/// What the executor intends to do with one resource instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeAction {
    /// Declared but not in state
    Create,
    /// Declared and in state, but out of date
    Update,
    /// In state but no longer declared
    Delete,
    /// Declared and up to date
    NoOp,
}

impl ChangeAction {
    /// Symbol used when rendering plans
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Create => "+",
            Self::Update => "~",
            Self::Delete => "-",
            Self::NoOp => " ",
        }
    }

    pub fn is_change(&self) -> bool {
        !matches!(self, Self::NoOp)
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
            Self::NoOp => write!(f, "no-op"),
        }
    }
}

/// Result of running one lifecycle operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyResult {
    /// No changes needed
    NoChange,
    /// Resource was created
    Created,
    /// Resource was modified
    Modified,
    /// Resource was removed
    Removed,
    /// Read found the resource changed outside of the provider
    Drifted,
    /// Operation failed
    Failed { error: String },
    /// Operation stopped at a cancellation checkpoint
    Canceled { error: String },
    /// Operation was skipped
    Skipped { reason: String },
}

impl ApplyResult {
    /// Check if the result represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. } | Self::Canceled { .. })
    }

    /// Check if the result represents a change
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Created | Self::Modified | Self::Removed)
    }
}

/// Summary of execution results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub created: usize,
    pub modified: usize,
    pub removed: usize,
    pub drifted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub canceled: usize,
    pub no_change: usize,
    pub warnings: usize,
}

impl ExecuteSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.modified + self.removed
    }

    /// Check if execution was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.canceled == 0
    }

    /// Total number of instances processed
    pub fn total(&self) -> usize {
        self.created
            + self.modified
            + self.removed
            + self.drifted
            + self.skipped
            + self.failed
            + self.canceled
            + self.no_change
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: &ExecuteSummary) {
        self.created += other.created;
        self.modified += other.modified;
        self.removed += other.removed;
        self.drifted += other.drifted;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.canceled += other.canceled;
        self.no_change += other.no_change;
        self.warnings += other.warnings;
    }

    /// Add a result to the summary
    pub fn add_result(&mut self, result: &ApplyResult) {
        match result {
            ApplyResult::NoChange => self.no_change += 1,
            ApplyResult::Created => self.created += 1,
            ApplyResult::Modified => self.modified += 1,
            ApplyResult::Removed => self.removed += 1,
            ApplyResult::Drifted => self.drifted += 1,
            ApplyResult::Failed { .. } => self.failed += 1,
            ApplyResult::Canceled { .. } => self.canceled += 1,
            ApplyResult::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Number of instances worked on in parallel
    pub jobs: usize,
    /// Verbose output
    pub verbose: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
            verbose: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let mut summary = ExecuteSummary::default();
        summary.add_result(&ApplyResult::Created);
        summary.add_result(&ApplyResult::Removed);
        summary.add_result(&ApplyResult::NoChange);
        summary.add_result(&ApplyResult::Canceled {
            error: "operation canceled".into(),
        });

        assert_eq!(summary.total_changes(), 2);
        assert_eq!(summary.total(), 4);
        assert!(!summary.is_success());
    }

    #[test]
    fn test_summary_merge() {
        let mut a = ExecuteSummary {
            created: 1,
            warnings: 2,
            ..Default::default()
        };
        let b = ExecuteSummary {
            created: 2,
            failed: 1,
            ..Default::default()
        };
        a.merge(&b);
        assert_eq!(a.created, 3);
        assert_eq!(a.failed, 1);
        assert_eq!(a.warnings, 2);
    }

    #[test]
    fn test_action_symbols() {
        assert_eq!(ChangeAction::Create.symbol(), "+");
        assert_eq!(ChangeAction::Delete.symbol(), "-");
        assert_eq!(ChangeAction::Update.symbol(), "~");
        assert!(!ChangeAction::NoOp.is_change());
    }
}
