//! Triage core: data model, pure job state machine and report projection.
pub mod faq;
mod effect;
mod item;
mod msg;
mod outcome;
mod report;
mod state;
mod update;

pub use effect::Effect;
pub use item::{InputItem, ItemId, ItemSummary};
pub use msg::Msg;
pub use outcome::{ClassLabel, ClassificationOutcome, Confidence, ConfidenceError, OutcomeKind, Prediction};
pub use report::{
    format_confidence, summarize, to_report_rows, LabelEntry, LabelTable, LabelTableError,
    ReportRow, Summary,
};
pub use state::{Exclusion, InvalidInput, JobState, JobStatus, Progress};
pub use update::update;
