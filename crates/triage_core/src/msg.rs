#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// A new batch was accepted; replaces any previous job.
    Submitted {
        items: Vec<crate::ItemSummary>,
        excluded: Vec<crate::Exclusion>,
    },
    /// The worker resolved the next item in submission order.
    OutcomeRecorded(crate::ClassificationOutcome),
    /// Caller asked to stop dispatching further items.
    CancelRequested,
    /// The worker stopped dispatching, either drained or cancelled.
    DispatchEnded,
}
