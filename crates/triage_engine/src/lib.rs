//! Triage engine: classification port, batch controller and report export.
mod classify;
mod controller;
mod export;
mod progress;
mod validate;

pub use classify::{
    ClassificationPort, ClassifierSettings, HttpClassifier, InferenceError, InferenceFailure,
    ServiceClass,
};
pub use controller::{
    BatchController, ControllerError, ControllerSettings, JobHandle, RejectedSubmission,
    Submission,
};
pub use export::{
    export_report, render_csv, report_filename, ExportError, ExportOptions, Quoting,
    REPORT_HEADER,
};
pub use progress::{ChannelProgressSink, JobEvent, NullProgressSink, ProgressSink};
pub use validate::{validate_item, DEFAULT_MAX_PAYLOAD_BYTES};
