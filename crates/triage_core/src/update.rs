use crate::{Effect, JobState, JobStatus, Msg};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: JobState, msg: Msg) -> (JobState, Vec<Effect>) {
    let effects = match msg {
        Msg::Submitted { items, excluded } => {
            if items.is_empty() {
                return (state, Vec::new());
            }
            // A submission never carries anything over from the previous job.
            state = JobState {
                items,
                excluded,
                outcomes: Vec::new(),
                status: JobStatus::Running,
                cancel_requested: false,
            };
            vec![Effect::ProgressChanged(state.progress())]
        }
        Msg::OutcomeRecorded(outcome) => {
            let expected = state.next_expected().map(|item| item.id);
            if state.status != JobStatus::Running || expected != Some(outcome.item_id) {
                return (
                    state,
                    vec![Effect::OutcomeRefused {
                        item_id: outcome.item_id,
                        expected,
                    }],
                );
            }

            state.outcomes.push(outcome);
            let progress = state.progress();
            let mut effects = vec![Effect::ProgressChanged(progress)];
            if state.is_complete() {
                state.status = JobStatus::Completed;
                effects.push(Effect::JobFinished {
                    status: JobStatus::Completed,
                    progress,
                });
            }
            effects
        }
        Msg::CancelRequested => {
            if state.status == JobStatus::Running {
                state.cancel_requested = true;
            }
            Vec::new()
        }
        Msg::DispatchEnded => {
            if state.status == JobStatus::Running {
                // Dispatch stopped with items still pending.
                state.status = JobStatus::Failed;
                vec![Effect::JobFinished {
                    status: JobStatus::Failed,
                    progress: state.progress(),
                }]
            } else {
                Vec::new()
            }
        }
    };

    (state, effects)
}
