use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::{future, stream, StreamExt};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use triage_core::{
    update, ClassificationOutcome, Effect, Exclusion, InputItem, ItemId, ItemSummary, JobState,
    JobStatus, Msg, OutcomeKind, Progress,
};
use triage_logging::{triage_debug, triage_error, triage_info, triage_warn};

use crate::progress::{JobEvent, NullProgressSink, ProgressSink};
use crate::validate::{validate_item, DEFAULT_MAX_PAYLOAD_BYTES};
use crate::ClassificationPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobHandle(u64);

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Port calls allowed in flight at once. Outcomes are still recorded in
    /// submission order.
    pub concurrency: usize,
    /// Extra attempts for an item whose port call failed transiently.
    pub max_retries: u32,
    /// Pause before a retry; the n-th retry waits n times this long.
    pub retry_backoff: Duration,
    pub max_payload_bytes: u64,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            concurrency: 1,
            max_retries: 0,
            retry_backoff: Duration::from_millis(200),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectedSubmission {
    #[error("no items were submitted")]
    Empty,
    #[error("item id {0} appears more than once")]
    DuplicateId(ItemId),
    #[error("none of the {} submitted items is a valid image", .0.len())]
    NoValidItems(Vec<Exclusion>),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControllerError {
    #[error("invalid input: {0}")]
    InvalidInput(RejectedSubmission),
    #[error("unknown job {0}")]
    UnknownJob(JobHandle),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub handle: JobHandle,
    pub accepted: usize,
    pub excluded: Vec<Exclusion>,
}

struct Session {
    handle: JobHandle,
    state: JobState,
    cancel: CancellationToken,
    status_tx: watch::Sender<JobStatus>,
}

impl Session {
    /// Runs `msg` through the state machine and turns its effects into sink
    /// events. Events are returned so they can be emitted after the lock is
    /// released.
    fn apply(&mut self, msg: Msg) -> Vec<JobEvent> {
        let (next, effects) = update(std::mem::take(&mut self.state), msg);
        self.state = next;

        let mut events = Vec::new();
        for effect in effects {
            match effect {
                Effect::ProgressChanged(progress) => match progress.completed.checked_sub(1) {
                    None => events.push(JobEvent::Started {
                        handle: self.handle,
                        total: progress.total,
                    }),
                    Some(index) => {
                        let item = self.state.items().get(index);
                        let outcome = self.state.outcomes().get(index);
                        if let (Some(item), Some(outcome)) = (item, outcome) {
                            events.push(JobEvent::ItemCompleted {
                                handle: self.handle,
                                item: item.clone(),
                                outcome: outcome.clone(),
                                progress,
                            });
                        }
                    }
                },
                Effect::JobFinished { status, progress } => {
                    self.status_tx.send_replace(status);
                    triage_info!(
                        "{} finished {} with {}/{} items recorded",
                        self.handle,
                        status,
                        progress.completed,
                        progress.total
                    );
                    events.push(JobEvent::Finished {
                        handle: self.handle,
                        status,
                        progress,
                    });
                }
                Effect::OutcomeRefused { item_id, expected } => {
                    triage_error!(
                        "{} refused outcome for item {} (expected {:?})",
                        self.handle,
                        item_id,
                        expected
                    );
                }
            }
        }
        events
    }
}

type SharedSession = Arc<Mutex<Option<Session>>>;

fn lock(session: &Mutex<Option<Session>>) -> MutexGuard<'_, Option<Session>> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives one batch at a time through a [`ClassificationPort`].
///
/// A new submission replaces the current job; if that job is still running
/// it is cancelled and whatever it produces afterwards is discarded.
pub struct BatchController {
    port: Arc<dyn ClassificationPort>,
    settings: ControllerSettings,
    sink: Arc<dyn ProgressSink>,
    next_handle: AtomicU64,
    session: SharedSession,
}

impl BatchController {
    pub fn new(port: Arc<dyn ClassificationPort>, settings: ControllerSettings) -> Self {
        Self {
            port,
            settings,
            sink: Arc::new(NullProgressSink),
            next_handle: AtomicU64::new(1),
            session: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Validates `items`, replaces the current job and starts processing.
    ///
    /// Invalid items are excluded individually and listed in the returned
    /// [`Submission`]. Must be called from within a tokio runtime.
    pub fn submit(&self, items: Vec<InputItem>) -> Result<Submission, ControllerError> {
        if items.is_empty() {
            return Err(ControllerError::InvalidInput(RejectedSubmission::Empty));
        }
        let mut seen = HashSet::with_capacity(items.len());
        if let Some(dup) = items.iter().find(|item| !seen.insert(item.id)) {
            return Err(ControllerError::InvalidInput(RejectedSubmission::DuplicateId(
                dup.id,
            )));
        }

        let mut accepted = Vec::with_capacity(items.len());
        let mut excluded = Vec::new();
        for item in items {
            match validate_item(&item, self.settings.max_payload_bytes) {
                Ok(()) => accepted.push(item),
                Err(reason) => {
                    triage_warn!("Excluding {:?}: {}", item.name, reason);
                    excluded.push(Exclusion {
                        item: item.summary(),
                        reason,
                    });
                }
            }
        }
        if accepted.is_empty() {
            return Err(ControllerError::InvalidInput(
                RejectedSubmission::NoValidItems(excluded),
            ));
        }

        let handle = JobHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let cancel = CancellationToken::new();
        let summaries: Vec<ItemSummary> = accepted.iter().map(InputItem::summary).collect();
        let started = {
            let mut guard = lock(&self.session);
            if let Some(previous) = guard.take() {
                if !previous.state.status().is_terminal() {
                    triage_info!("{} superseded by {}", previous.handle, handle);
                    previous.cancel.cancel();
                }
            }
            let (status_tx, _) = watch::channel(JobStatus::Running);
            let mut session = Session {
                handle,
                state: JobState::new(),
                cancel: cancel.clone(),
                status_tx,
            };
            let events = session.apply(Msg::Submitted {
                items: summaries,
                excluded: excluded.clone(),
            });
            *guard = Some(session);
            events
        };

        triage_info!(
            "{} submitted: {} accepted, {} excluded",
            handle,
            accepted.len(),
            excluded.len()
        );
        for event in started {
            self.sink.emit(event);
        }
        for exclusion in &excluded {
            self.sink.emit(JobEvent::ItemExcluded {
                handle,
                exclusion: exclusion.clone(),
            });
        }

        let submission = Submission {
            handle,
            accepted: accepted.len(),
            excluded,
        };
        tokio::spawn(run_job(
            Arc::clone(&self.port),
            Arc::clone(&self.session),
            Arc::clone(&self.sink),
            handle,
            accepted,
            cancel,
            self.settings.clone(),
        ));
        Ok(submission)
    }

    /// Stops dispatching further items. Calls already in flight complete and
    /// are recorded.
    pub fn cancel(&self, handle: JobHandle) -> Result<(), ControllerError> {
        self.with_session(handle, |session| {
            session.cancel.cancel();
            session.apply(Msg::CancelRequested);
            triage_info!("{} cancellation requested", handle);
        })
    }

    pub fn get_progress(&self, handle: JobHandle) -> Result<Progress, ControllerError> {
        self.with_session(handle, |session| session.state.progress())
    }

    pub fn get_results(
        &self,
        handle: JobHandle,
    ) -> Result<Vec<ClassificationOutcome>, ControllerError> {
        self.with_session(handle, |session| session.state.outcomes().to_vec())
    }

    pub fn status(&self, handle: JobHandle) -> Result<JobStatus, ControllerError> {
        self.with_session(handle, |session| session.state.status())
    }

    /// Immutable copy of the job state, for aggregation.
    pub fn snapshot(&self, handle: JobHandle) -> Result<JobState, ControllerError> {
        self.with_session(handle, |session| session.state.clone())
    }

    pub fn current(&self) -> Option<JobHandle> {
        lock(&self.session).as_ref().map(|session| session.handle)
    }

    /// Resolves once the job is `Completed` or `Failed`.
    ///
    /// Fails with [`ControllerError::UnknownJob`] if the job is superseded
    /// before it finishes.
    pub async fn wait(&self, handle: JobHandle) -> Result<JobStatus, ControllerError> {
        let mut status_rx = self.with_session(handle, |session| session.status_tx.subscribe())?;
        let status = *status_rx
            .wait_for(|status| status.is_terminal())
            .await
            .map_err(|_| ControllerError::UnknownJob(handle))?;
        Ok(status)
    }

    fn with_session<T>(
        &self,
        handle: JobHandle,
        f: impl FnOnce(&mut Session) -> T,
    ) -> Result<T, ControllerError> {
        let mut guard = lock(&self.session);
        match guard.as_mut() {
            Some(session) if session.handle == handle => Ok(f(session)),
            _ => Err(ControllerError::UnknownJob(handle)),
        }
    }
}

async fn run_job(
    port: Arc<dyn ClassificationPort>,
    session: SharedSession,
    sink: Arc<dyn ProgressSink>,
    handle: JobHandle,
    items: Vec<InputItem>,
    cancel: CancellationToken,
    settings: ControllerSettings,
) {
    let retry = RetryPolicy {
        max_retries: settings.max_retries,
        backoff: settings.retry_backoff,
    };
    // Cancellation is checked when the next item is pulled for dispatch, so
    // in-flight calls always run to completion. `buffered` yields results in
    // submission order regardless of completion order.
    let mut completions = stream::iter(items)
        .take_while(move |_| future::ready(!cancel.is_cancelled()))
        .map(move |item| classify_item(Arc::clone(&port), item, retry))
        .buffered(settings.concurrency.max(1));

    while let Some((item, outcome)) = completions.next().await {
        if !record(&session, sink.as_ref(), handle, &item, outcome) {
            return;
        }
    }

    let events = {
        let mut guard = lock(&session);
        match guard.as_mut() {
            Some(current) if current.handle == handle => current.apply(Msg::DispatchEnded),
            _ => Vec::new(),
        }
    };
    for event in events {
        sink.emit(event);
    }
}

#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    max_retries: u32,
    backoff: Duration,
}

async fn classify_item(
    port: Arc<dyn ClassificationPort>,
    item: InputItem,
    retry: RetryPolicy,
) -> (ItemSummary, ClassificationOutcome) {
    let mut attempt = 0;
    let outcome = loop {
        match port.classify(item.payload.clone()).await {
            Ok(prediction) => break ClassificationOutcome::success(item.id, prediction),
            Err(err) if err.is_transient() && attempt < retry.max_retries => {
                attempt += 1;
                triage_debug!(
                    "Retrying {:?} after {} (attempt {}/{})",
                    item.name,
                    err,
                    attempt,
                    retry.max_retries
                );
                tokio::time::sleep(retry.backoff * attempt).await;
            }
            Err(err) => break ClassificationOutcome::failure(item.id, err.to_string()),
        }
    };
    // The payload is released here, before the outcome is recorded.
    (item.summary(), outcome)
}

/// Appends one outcome to the job identified by `handle`. Returns `false`
/// when that job has been superseded.
fn record(
    session: &Mutex<Option<Session>>,
    sink: &dyn ProgressSink,
    handle: JobHandle,
    item: &ItemSummary,
    outcome: ClassificationOutcome,
) -> bool {
    match &outcome.result {
        OutcomeKind::Success(prediction) => triage_info!(
            "{} classified {:?} as {} ({:.4})",
            handle,
            item.name,
            prediction.label,
            prediction.confidence.get()
        ),
        OutcomeKind::Failure { reason } => {
            triage_warn!("{} could not classify {:?}: {}", handle, item.name, reason)
        }
    }

    let events = {
        let mut guard = lock(session);
        let Some(current) = guard.as_mut().filter(|current| current.handle == handle) else {
            triage_debug!("Discarding outcome for {:?} of superseded {}", item.name, handle);
            return false;
        };
        current.apply(Msg::OutcomeRecorded(outcome))
    };
    for event in events {
        sink.emit(event);
    }
    true
}
