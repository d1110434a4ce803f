//! Per-file results reported back to the caller.

use std::fmt;

use serde::Serialize;

/// How a unit of work on one file ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    /// Work was done and committed
    Completed,
    /// Nothing to do: already present or already processed
    Skipped,
    /// Gave up on this file; the batch continued
    Failed { reason: String },
}

/// Structured result for one file of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    pub file_name: String,
    /// Attempts made (0 when skipped)
    pub attempts: u32,
    #[serde(flatten)]
    pub status: FileStatus,
}

impl FileOutcome {
    pub fn completed(file_name: impl Into<String>, attempts: u32) -> Self {
        Self {
            file_name: file_name.into(),
            attempts,
            status: FileStatus::Completed,
        }
    }

    pub fn skipped(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            attempts: 0,
            status: FileStatus::Skipped,
        }
    }

    pub fn failed(file_name: impl Into<String>, attempts: u32, reason: impl fmt::Display) -> Self {
        Self {
            file_name: file_name.into(),
            attempts,
            status: FileStatus::Failed {
                reason: reason.to_string(),
            },
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.status, FileStatus::Completed)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, FileStatus::Skipped)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, FileStatus::Failed { .. })
    }
}

impl fmt::Display for FileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            FileStatus::Completed => write!(
                f,
                "{}: completed ({} attempts)",
                self.file_name, self.attempts
            ),
            FileStatus::Skipped => write!(f, "{}: skipped", self.file_name),
            FileStatus::Failed { reason } => write!(
                f,
                "{}: failed after {} attempts: {}",
                self.file_name, self.attempts, reason
            ),
        }
    }
}

/// Tally of outcomes for a batch step.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
}

impl BatchReport {
    pub fn push(&mut self, outcome: FileOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn completed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_completed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_skipped()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| o.is_failed())
    }

    pub fn failed(&self) -> usize {
        self.failures().count()
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_display() {
        let outcome = FileOutcome::failed("c.zip", 3, "connection reset");
        assert_eq!(
            outcome.to_string(),
            "c.zip: failed after 3 attempts: connection reset"
        );
    }

    #[test]
    fn test_report_counts() {
        let mut report = BatchReport::default();
        report.push(FileOutcome::completed("a.zip", 1));
        report.push(FileOutcome::skipped("b.zip"));
        report.push(FileOutcome::failed("c.zip", 3, "connection reset"));

        assert_eq!(report.total(), 3);
        assert_eq!(report.completed(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures().next().unwrap().file_name, "c.zip");
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = FileOutcome::failed("c.zip", 3, "timeout");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "timeout");
        assert_eq!(json["attempts"], 3);
    }
}
