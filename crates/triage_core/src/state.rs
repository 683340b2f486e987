use std::fmt;

use crate::{ClassificationOutcome, ItemSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Idle => write!(f, "idle"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Why a submitted item was kept out of the batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidInput {
    #[error("payload is empty")]
    EmptyPayload,
    #[error("payload is not a recognised image format")]
    NotAnImage,
    #[error("payload of {actual} bytes exceeds the {max_bytes} byte limit")]
    TooLarge { max_bytes: u64, actual: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusion {
    pub item: ItemSummary,
    pub reason: InvalidInput,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub fraction: f64,
}

impl Progress {
    pub fn new(completed: usize, total: usize) -> Self {
        let fraction = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64
        };
        Self {
            completed,
            total,
            fraction,
        }
    }
}

/// State of the current job. Mutated only through [`crate::update`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobState {
    pub(crate) items: Vec<ItemSummary>,
    pub(crate) excluded: Vec<Exclusion>,
    pub(crate) outcomes: Vec<ClassificationOutcome>,
    pub(crate) status: JobStatus,
    pub(crate) cancel_requested: bool,
}

impl JobState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[ItemSummary] {
        &self.items
    }

    pub fn excluded(&self) -> &[Exclusion] {
        &self.excluded
    }

    pub fn outcomes(&self) -> &[ClassificationOutcome] {
        &self.outcomes
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested
    }

    pub fn progress(&self) -> Progress {
        Progress::new(self.outcomes.len(), self.items.len())
    }

    /// The item whose outcome must be appended next, if any is pending.
    pub fn next_expected(&self) -> Option<&ItemSummary> {
        self.items.get(self.outcomes.len())
    }

    pub(crate) fn is_complete(&self) -> bool {
        !self.items.is_empty() && self.outcomes.len() == self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::Progress;

    #[test]
    fn progress_fraction_is_exact_ratio() {
        assert_eq!(Progress::new(0, 0).fraction, 0.0);
        assert_eq!(Progress::new(1, 4).fraction, 0.25);
        assert_eq!(Progress::new(3, 3).fraction, 1.0);
    }
}
