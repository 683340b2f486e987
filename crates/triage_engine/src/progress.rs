use tokio::sync::mpsc;
use triage_core::{ClassificationOutcome, Exclusion, ItemSummary, JobStatus, Progress};

use crate::JobHandle;

#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    Started {
        handle: JobHandle,
        total: usize,
    },
    ItemExcluded {
        handle: JobHandle,
        exclusion: Exclusion,
    },
    ItemCompleted {
        handle: JobHandle,
        item: ItemSummary,
        outcome: ClassificationOutcome,
        progress: Progress,
    },
    Finished {
        handle: JobHandle,
        status: JobStatus,
        progress: Progress,
    },
}

impl JobEvent {
    pub fn handle(&self) -> JobHandle {
        match self {
            JobEvent::Started { handle, .. }
            | JobEvent::ItemExcluded { handle, .. }
            | JobEvent::ItemCompleted { handle, .. }
            | JobEvent::Finished { handle, .. } => *handle,
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: JobEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn emit(&self, _event: JobEvent) {}
}

pub struct ChannelProgressSink {
    tx: mpsc::UnboundedSender<JobEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: mpsc::UnboundedSender<JobEvent>) -> Self {
        Self { tx }
    }

    /// Creates a sink together with the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<JobEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: JobEvent) {
        let _ = self.tx.send(event);
    }
}
