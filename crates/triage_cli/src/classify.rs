use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use bytes::Bytes;
use chrono::Utc;
use tokio::sync::mpsc::UnboundedReceiver;
use triage_core::{
    summarize, to_report_rows, ClassLabel, InputItem, InvalidInput, JobStatus, LabelTable,
};
use triage_engine::{
    export_report, BatchController, ChannelProgressSink, HttpClassifier, JobEvent, JobHandle,
};
use triage_logging::{triage_info, triage_warn};

use crate::config::TriageConfig;
use crate::ClassifyArgs;

pub async fn run(args: &ClassifyArgs, config: &TriageConfig) -> anyhow::Result<ExitCode> {
    let table = config.label_table()?;
    let (items, skipped) = read_items(&args.files, config.max_payload_bytes)?;
    for (name, reason) in &skipped {
        triage_warn!("Skipping {:?}: {}", name, reason);
        eprintln!("skipped {name}: {reason}");
    }
    if items.is_empty() {
        bail!("batch rejected: none of the {} files is small enough to classify", skipped.len());
    }

    let classifier = HttpClassifier::new(config.classifier_settings())
        .context("failed to set up the classifier")?;
    let (sink, events) = ChannelProgressSink::channel();
    let controller = BatchController::new(Arc::new(classifier), config.controller_settings())
        .with_sink(Arc::new(sink));

    let submission = controller.submit(items).context("batch rejected")?;
    for exclusion in &submission.excluded {
        eprintln!("skipped {}: {}", exclusion.item.name, exclusion.reason);
    }

    follow(&controller, submission.handle, events, &table).await;

    let status = controller.wait(submission.handle).await?;
    let state = controller.snapshot(submission.handle)?;
    let summary = summarize(state.outcomes());
    println!(
        "{}: {} of {} images processed, {} {}, {} {}, {} errors",
        status,
        summary.total,
        state.items().len(),
        summary.positive_count,
        table.entry(ClassLabel::Positive).prediction,
        summary.negative_count,
        table.entry(ClassLabel::Negative).prediction,
        summary.failure_count
    );

    let rows = to_report_rows(state.outcomes(), state.items(), &table);
    let path = export_report(
        &rows,
        &args.out_dir,
        &config.report.stem,
        Utc::now().date_naive(),
        &config.export_options(),
    )
    .context("failed to write report")?;
    triage_info!("Report written to {:?}", path);
    println!("report: {}", path.display());

    Ok(match status {
        JobStatus::Failed => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}

/// Reads the batch from disk. A file larger than `max_bytes` is skipped on its
/// metadata alone, so its contents are never loaded.
fn read_items(
    files: &[PathBuf],
    max_bytes: u64,
) -> anyhow::Result<(Vec<InputItem>, Vec<(String, InvalidInput)>)> {
    let mut named = Vec::with_capacity(files.len());
    let mut skipped = Vec::new();
    for path in files {
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let actual = fs::metadata(path)
            .with_context(|| format!("failed to read {}", path.display()))?
            .len();
        if actual > max_bytes {
            skipped.push((name, InvalidInput::TooLarge { max_bytes, actual }));
            continue;
        }
        let payload =
            fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        named.push((name, Bytes::from(payload)));
    }
    Ok((InputItem::numbered(named), skipped))
}

/// Prints a progress line per completed item until the job finishes. The
/// first Ctrl-C cancels the job; items already in flight still complete.
async fn follow(
    controller: &BatchController,
    handle: JobHandle,
    mut events: UnboundedReceiver<JobEvent>,
    table: &LabelTable,
) {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) if event.handle() != handle => {}
                Some(JobEvent::ItemCompleted { item, outcome, progress, .. }) => {
                    let row = to_report_rows(&[outcome], &[item], table)
                        .into_iter()
                        .next();
                    if let Some(row) = row {
                        println!(
                            "[{}/{}] {}: {} {}",
                            progress.completed,
                            progress.total,
                            row.filename,
                            row.status,
                            row.confidence.unwrap_or_default()
                        );
                    }
                }
                Some(JobEvent::Finished { .. }) => break,
                Some(_) => {}
                None => break,
            },
            signal = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                if let Err(err) = signal {
                    triage_warn!("Could not listen for Ctrl-C: {}", err);
                    continue;
                }
                eprintln!("cancelling; waiting for the current item");
                if let Err(err) = controller.cancel(handle) {
                    triage_warn!("Cancel failed: {}", err);
                }
            }
        }
    }
}
