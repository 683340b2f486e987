#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    ProgressChanged(crate::Progress),
    JobFinished {
        status: crate::JobStatus,
        progress: crate::Progress,
    },
    /// An outcome did not match the next pending item and was not appended.
    OutcomeRefused {
        item_id: crate::ItemId,
        expected: Option<crate::ItemId>,
    },
}
