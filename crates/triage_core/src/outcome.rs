use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ItemId;

/// Class predicted by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassLabel {
    Positive,
    Negative,
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassLabel::Positive => write!(f, "positive"),
            ClassLabel::Negative => write!(f, "negative"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("confidence {0} is outside [0, 1]")]
pub struct ConfidenceError(pub f64);

/// Model confidence, always within `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Confidence(f64);

impl Confidence {
    pub fn new(value: f64) -> Result<Self, ConfidenceError> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ConfidenceError(value))
        }
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Confidence {
    type Error = ConfidenceError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Confidence::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub label: ClassLabel,
    pub confidence: Confidence,
}

impl Prediction {
    pub fn new(label: ClassLabel, confidence: Confidence) -> Self {
        Self { label, confidence }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeKind {
    Success(Prediction),
    Failure { reason: String },
}

/// Result of attempting one item. Exactly one exists per attempted item.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationOutcome {
    pub item_id: ItemId,
    pub result: OutcomeKind,
}

impl ClassificationOutcome {
    pub fn success(item_id: ItemId, prediction: Prediction) -> Self {
        Self {
            item_id,
            result: OutcomeKind::Success(prediction),
        }
    }

    pub fn failure(item_id: ItemId, reason: impl Into<String>) -> Self {
        Self {
            item_id,
            result: OutcomeKind::Failure {
                reason: reason.into(),
            },
        }
    }

    pub fn prediction(&self) -> Option<&Prediction> {
        match &self.result {
            OutcomeKind::Success(prediction) => Some(prediction),
            OutcomeKind::Failure { .. } => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.result, OutcomeKind::Failure { .. })
    }
}
