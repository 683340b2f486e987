use std::sync::Once;

use triage_core::{
    update, ClassLabel, ClassificationOutcome, Confidence, Effect, Exclusion, InvalidInput,
    ItemSummary, JobState, JobStatus, Msg, Prediction, Progress,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(triage_logging::initialize_for_tests);
}

fn summaries(names: &[&str]) -> Vec<ItemSummary> {
    names
        .iter()
        .zip(1..)
        .map(|(name, id)| ItemSummary {
            id,
            name: name.to_string(),
        })
        .collect()
}

fn submit(names: &[&str]) -> JobState {
    let (state, _) = update(
        JobState::new(),
        Msg::Submitted {
            items: summaries(names),
            excluded: Vec::new(),
        },
    );
    state
}

fn positive(item_id: u64) -> ClassificationOutcome {
    ClassificationOutcome::success(
        item_id,
        Prediction::new(ClassLabel::Positive, Confidence::new(0.9).unwrap()),
    )
}

#[test]
fn new_state_is_idle() {
    let state = JobState::new();
    assert_eq!(state.status(), JobStatus::Idle);
    assert!(state.items().is_empty());
    assert_eq!(state.progress().total, 0);
}

#[test]
fn empty_submission_is_ignored() {
    init_logging();
    let state = submit(&["a.png"]);
    let (next, effects) = update(
        state.clone(),
        Msg::Submitted {
            items: Vec::new(),
            excluded: Vec::new(),
        },
    );
    assert_eq!(state, next);
    assert!(effects.is_empty());
}

#[test]
fn submission_starts_running_with_zero_progress() {
    init_logging();
    let excluded = vec![Exclusion {
        item: ItemSummary {
            id: 9,
            name: "notes.txt".to_string(),
        },
        reason: InvalidInput::NotAnImage,
    }];
    let (state, effects) = update(
        JobState::new(),
        Msg::Submitted {
            items: summaries(&["a.png", "b.png"]),
            excluded: excluded.clone(),
        },
    );
    assert_eq!(state.status(), JobStatus::Running);
    assert_eq!(state.excluded(), excluded.as_slice());
    assert_eq!(effects, vec![Effect::ProgressChanged(Progress::new(0, 2))]);
}

#[test]
fn progress_advances_one_unit_per_outcome_and_completes() {
    init_logging();
    let mut state = submit(&["a.png", "b.png", "c.png", "d.png"]);
    let mut last_fraction = 0.0;
    for id in 1..=4u64 {
        let outcome = if id == 2 {
            ClassificationOutcome::failure(id, "timeout")
        } else {
            positive(id)
        };
        let (next, effects) = update(state, Msg::OutcomeRecorded(outcome));
        state = next;
        let progress = state.progress();
        assert_eq!(progress.completed, id as usize);
        assert_eq!(progress.fraction, id as f64 / 4.0);
        assert!(progress.fraction >= last_fraction);
        last_fraction = progress.fraction;
        assert_eq!(effects[0], Effect::ProgressChanged(progress));
    }
    assert_eq!(state.status(), JobStatus::Completed);
    let ids: Vec<_> = state.outcomes().iter().map(|o| o.item_id).collect();
    let expected: Vec<_> = state.items().iter().map(|i| i.id).collect();
    assert_eq!(ids, expected);
}

#[test]
fn last_outcome_emits_job_finished() {
    let state = submit(&["a.png"]);
    let (state, effects) = update(state, Msg::OutcomeRecorded(positive(1)));
    assert_eq!(state.status(), JobStatus::Completed);
    assert_eq!(
        effects,
        vec![
            Effect::ProgressChanged(Progress::new(1, 1)),
            Effect::JobFinished {
                status: JobStatus::Completed,
                progress: Progress::new(1, 1),
            },
        ]
    );
}

#[test]
fn out_of_order_outcome_is_refused() {
    init_logging();
    let state = submit(&["a.png", "b.png"]);
    let (next, effects) = update(state.clone(), Msg::OutcomeRecorded(positive(2)));
    assert_eq!(next, state);
    assert_eq!(
        effects,
        vec![Effect::OutcomeRefused {
            item_id: 2,
            expected: Some(1),
        }]
    );
}

#[test]
fn outcome_after_completion_is_refused() {
    let state = submit(&["a.png"]);
    let (state, _) = update(state, Msg::OutcomeRecorded(positive(1)));
    let (next, effects) = update(state.clone(), Msg::OutcomeRecorded(positive(1)));
    assert_eq!(next.outcomes().len(), 1);
    assert_eq!(
        effects,
        vec![Effect::OutcomeRefused {
            item_id: 1,
            expected: None,
        }]
    );
}

#[test]
fn cancelled_dispatch_ends_failed() {
    init_logging();
    let state = submit(&["a.png", "b.png", "c.png"]);
    let (state, _) = update(state, Msg::OutcomeRecorded(positive(1)));
    let (state, effects) = update(state, Msg::CancelRequested);
    assert!(effects.is_empty());
    assert!(state.cancel_requested());
    assert_eq!(state.status(), JobStatus::Running);

    // The in-flight item still lands.
    let (state, _) = update(state, Msg::OutcomeRecorded(positive(2)));
    let (state, effects) = update(state, Msg::DispatchEnded);
    assert_eq!(state.status(), JobStatus::Failed);
    assert_eq!(state.outcomes().len(), 2);
    assert_eq!(
        effects,
        vec![Effect::JobFinished {
            status: JobStatus::Failed,
            progress: Progress::new(2, 3),
        }]
    );
}

#[test]
fn cancel_racing_completion_stays_completed() {
    let state = submit(&["a.png"]);
    let (state, _) = update(state, Msg::CancelRequested);
    let (state, _) = update(state, Msg::OutcomeRecorded(positive(1)));
    let (state, effects) = update(state, Msg::DispatchEnded);
    assert_eq!(state.status(), JobStatus::Completed);
    assert!(effects.is_empty());
}

#[test]
fn cancel_on_idle_is_ignored() {
    let (state, effects) = update(JobState::new(), Msg::CancelRequested);
    assert_eq!(state, JobState::new());
    assert!(effects.is_empty());
}

#[test]
fn resubmission_discards_previous_job() {
    init_logging();
    let state = submit(&["a.png", "b.png"]);
    let (state, _) = update(state, Msg::OutcomeRecorded(positive(1)));
    let (state, _) = update(state, Msg::OutcomeRecorded(positive(2)));
    assert_eq!(state.status(), JobStatus::Completed);

    let (state, _) = update(
        state,
        Msg::Submitted {
            items: vec![ItemSummary {
                id: 1,
                name: "c.png".to_string(),
            }],
            excluded: Vec::new(),
        },
    );
    assert_eq!(state.status(), JobStatus::Running);
    assert!(state.outcomes().is_empty());
    assert_eq!(state.items().len(), 1);
    assert_eq!(state.items()[0].name, "c.png");
}
