use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{ClassLabel, ClassificationOutcome, Confidence, ItemId, ItemSummary, OutcomeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub total: usize,
    pub positive_count: usize,
    pub negative_count: usize,
    pub failure_count: usize,
}

pub fn summarize(outcomes: &[ClassificationOutcome]) -> Summary {
    outcomes.iter().fold(
        Summary {
            total: outcomes.len(),
            ..Summary::default()
        },
        |mut summary, outcome| {
            match outcome.prediction().map(|prediction| prediction.label) {
                Some(ClassLabel::Positive) => summary.positive_count += 1,
                Some(ClassLabel::Negative) => summary.negative_count += 1,
                None => summary.failure_count += 1,
            }
            summary
        },
    )
}

/// One line of the exported report. `prediction` and `confidence` are absent
/// for items the classifier could not process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub filename: String,
    pub prediction: Option<String>,
    pub confidence: Option<String>,
    pub status: String,
}

/// Projects outcomes into report rows, in outcome order.
///
/// # Panics
///
/// Panics when an outcome references an item that is not in `items`. The
/// controller only records outcomes for items of the same submission, so this
/// is a broken invariant rather than a runtime condition.
pub fn to_report_rows(
    outcomes: &[ClassificationOutcome],
    items: &[ItemSummary],
    table: &LabelTable,
) -> Vec<ReportRow> {
    let by_id: HashMap<ItemId, &ItemSummary> = items.iter().map(|item| (item.id, item)).collect();

    outcomes
        .iter()
        .map(|outcome| {
            let Some(item) = by_id.get(&outcome.item_id) else {
                panic!(
                    "outcome references item {} which is not part of the job",
                    outcome.item_id
                );
            };
            match &outcome.result {
                OutcomeKind::Success(prediction) => {
                    let entry = table.entry(prediction.label);
                    ReportRow {
                        filename: item.name.clone(),
                        prediction: Some(entry.prediction.clone()),
                        confidence: Some(format_confidence(prediction.confidence)),
                        status: entry.status.clone(),
                    }
                }
                OutcomeKind::Failure { .. } => ReportRow {
                    filename: item.name.clone(),
                    prediction: None,
                    confidence: None,
                    status: table.error_status().to_string(),
                },
            }
        })
        .collect()
}

/// Percentage with exactly two decimals, e.g. `0.91` -> `91.00%`.
pub fn format_confidence(confidence: Confidence) -> String {
    format!("{:.2}%", confidence.get() * 100.0)
}

/// Report text for one class label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEntry {
    pub label: ClassLabel,
    pub prediction: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LabelTableError {
    #[error("label table has no entry for {0}")]
    MissingLabel(ClassLabel),
    #[error("label table has more than one entry for {0}")]
    DuplicateLabel(ClassLabel),
    #[error("status {0:?} is used by more than one label")]
    DuplicateStatus(String),
    #[error("status {0:?} is the same as the error status")]
    StatusIsErrorStatus(String),
    #[error("label table text must not be empty")]
    EmptyText,
}

#[derive(Debug, Clone, Deserialize)]
struct RawLabelTable {
    labels: Vec<LabelEntry>,
    error_status: String,
}

/// Bijection from [`ClassLabel`] to report text, plus the failure status.
///
/// Lookup is by label value only; report text is never matched as a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLabelTable")]
pub struct LabelTable {
    labels: Vec<LabelEntry>,
    error_status: String,
}

impl LabelTable {
    pub fn new(
        labels: Vec<LabelEntry>,
        error_status: impl Into<String>,
    ) -> Result<Self, LabelTableError> {
        let table = Self {
            labels,
            error_status: error_status.into(),
        };
        table.validate()?;
        Ok(table)
    }

    fn validate(&self) -> Result<(), LabelTableError> {
        if self.error_status.trim().is_empty() {
            return Err(LabelTableError::EmptyText);
        }
        let mut seen_labels = HashSet::new();
        let mut seen_statuses = HashSet::new();
        for entry in &self.labels {
            if entry.prediction.trim().is_empty() || entry.status.trim().is_empty() {
                return Err(LabelTableError::EmptyText);
            }
            if !seen_labels.insert(entry.label) {
                return Err(LabelTableError::DuplicateLabel(entry.label));
            }
            if entry.status == self.error_status {
                return Err(LabelTableError::StatusIsErrorStatus(entry.status.clone()));
            }
            if !seen_statuses.insert(entry.status.as_str()) {
                return Err(LabelTableError::DuplicateStatus(entry.status.clone()));
            }
        }
        for label in [ClassLabel::Positive, ClassLabel::Negative] {
            if !seen_labels.contains(&label) {
                return Err(LabelTableError::MissingLabel(label));
            }
        }
        Ok(())
    }

    pub fn entry(&self, label: ClassLabel) -> &LabelEntry {
        self.labels
            .iter()
            .find(|entry| entry.label == label)
            .expect("validated label table covers every class label")
    }

    pub fn labels(&self) -> &[LabelEntry] {
        &self.labels
    }

    pub fn error_status(&self) -> &str {
        &self.error_status
    }
}

impl TryFrom<RawLabelTable> for LabelTable {
    type Error = LabelTableError;

    fn try_from(raw: RawLabelTable) -> Result<Self, Self::Error> {
        LabelTable::new(raw.labels, raw.error_status)
    }
}

impl Default for LabelTable {
    fn default() -> Self {
        Self {
            labels: vec![
                LabelEntry {
                    label: ClassLabel::Positive,
                    prediction: "Positive".to_string(),
                    status: "Positive".to_string(),
                },
                LabelEntry {
                    label: ClassLabel::Negative,
                    prediction: "Negative".to_string(),
                    status: "Negative".to_string(),
                },
            ],
            error_status: "Error".to_string(),
        }
    }
}
