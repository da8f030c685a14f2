//! Run command implementation

use crate::cli::RunArgs;
use crate::config_loader::load_config;
use crate::errors;
use crate::export;
use crate::input::load_trajectories;
use crate::output::OutputWriter;
use crate::output_types::{FailureOutput, RunOutput, SummaryRow, TrajectoryOutput};
use crate::progress::TrajectoryProgress;
use anyhow::Result;
use std::path::Path;
use trajexp_core::models::Trajectory;
use trajexp_exposure::{ExposureEngine, RunReport, RunStatus, TrajectoryResult};

pub async fn execute(args: RunArgs, config_path: Option<&Path>, output: &OutputWriter) -> Result<()> {
    let config = load_config(config_path, args.overrides.to_partial())?
        .resolve()
        .map_err(errors::from_exposure)?;

    let mut trajectories: Vec<Trajectory> = Vec::new();
    for path in &args.files {
        let loaded =
            load_trajectories(path).map_err(|e| errors::trajectory_file_unreadable(path, format!("{:#}", e)))?;
        tracing::debug!(file = %path.display(), count = loaded.len(), "Loaded trajectories");
        trajectories.extend(loaded);
    }
    if trajectories.is_empty() {
        return Err(errors::no_trajectories().into());
    }

    output.info(format!("Evaluating {} trajectories", trajectories.len()));

    let engine = ExposureEngine::from_config(&config).map_err(errors::from_exposure)?;
    let cancel = super::cancel_on_interrupt();
    let progress = TrajectoryProgress::new(trajectories.len(), output.is_json());

    let input = if args.output.is_some() { trajectories.clone() } else { Vec::new() };
    let report = match engine.run_exposure(trajectories, &config, &cancel, &progress).await {
        Ok(report) => report,
        Err(e) => {
            progress.abandon("Run aborted");
            return Err(errors::from_exposure(e).into());
        }
    };

    match report.status {
        RunStatus::Completed => progress.finish("All trajectories evaluated"),
        RunStatus::PartiallyFailed => progress.finish("Finished with failures"),
        RunStatus::Cancelled => progress.abandon("Cancelled"),
    }

    let output_file = match &args.output {
        Some(path) => {
            export::write(path, export::exposure_collection(&input, &report)?)?;
            Some(path.display().to_string())
        }
        None => None,
    };

    if output.is_json() {
        output.result(run_output(&report, output_file))?;
    } else {
        render_human(&report, output_file.as_deref(), output);
    }

    Ok(())
}

fn run_output(report: &RunReport, output_file: Option<String>) -> RunOutput {
    let trajectories = report
        .outcomes
        .iter()
        .map(|outcome| {
            let trajectory_id = outcome.trajectory_id.clone();
            match &outcome.result {
                TrajectoryResult::Succeeded(exposure) => TrajectoryOutput {
                    trajectory_id,
                    status: "succeeded",
                    summary: Some(exposure.summary.clone()),
                    records: Some(exposure.records.clone()),
                    error: None,
                },
                TrajectoryResult::Failed(failure) => TrajectoryOutput {
                    trajectory_id,
                    status: "failed",
                    summary: None,
                    records: None,
                    error: Some(FailureOutput {
                        stage: failure.stage.to_string(),
                        message: failure.error.to_string(),
                        retryable: failure.error.is_transient(),
                    }),
                },
                TrajectoryResult::Cancelled => TrajectoryOutput {
                    trajectory_id,
                    status: "cancelled",
                    summary: None,
                    records: None,
                    error: None,
                },
            }
        })
        .collect();

    RunOutput {
        status: report.status.to_string(),
        succeeded: report.succeeded_count(),
        failed: report.failed_count(),
        cancelled: report.cancelled_count(),
        trajectories,
        output_file,
    }
}

fn render_human(report: &RunReport, output_file: Option<&str>, output: &OutputWriter) {
    output.section("Exposure Summary");

    let rows: Vec<SummaryRow> = report
        .outcomes
        .iter()
        .map(|outcome| match &outcome.result {
            TrajectoryResult::Succeeded(exposure) => {
                let s = &exposure.summary;
                SummaryRow {
                    trajectory: outcome.trajectory_id.clone(),
                    status: "ok".into(),
                    segments: s.segment_count.to_string(),
                    total: format!("{:.3}", s.total_exposure_score),
                    max: format!("{:.3}", s.max_single_segment_exposure),
                    exposed: s.segments_above_threshold.to_string(),
                    buildings: s.contributing_footprint_ids.len().to_string(),
                }
            }
            TrajectoryResult::Failed(failure) => SummaryRow {
                trajectory: outcome.trajectory_id.clone(),
                status: format!("failed ({})", failure.stage),
                ..empty_row()
            },
            TrajectoryResult::Cancelled => SummaryRow {
                trajectory: outcome.trajectory_id.clone(),
                status: "cancelled".into(),
                ..empty_row()
            },
        })
        .collect();
    output.table(rows);

    for failure in report.failures() {
        output.warning(format!("{} failed during {}: {}", failure.trajectory_id, failure.stage, failure.error));
    }

    if let Some(file) = output_file {
        output.kv("Output", file);
    }

    let counts = format!(
        "{} succeeded, {} failed, {} cancelled",
        report.succeeded_count(),
        report.failed_count(),
        report.cancelled_count()
    );
    match report.status {
        RunStatus::Completed => output.success(format!("Run completed: {}", counts)),
        RunStatus::PartiallyFailed => output.warning(format!("Run partially failed: {}", counts)),
        RunStatus::Cancelled => output.warning(format!("Run cancelled: {}", counts)),
    }
}

fn empty_row() -> SummaryRow {
    SummaryRow {
        trajectory: String::new(),
        status: String::new(),
        segments: "-".into(),
        total: "-".into(),
        max: "-".into(),
        exposed: "-".into(),
        buildings: "-".into(),
    }
}
