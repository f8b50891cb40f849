//! Runs one batch: read, normalize, persist the processed dataset, compute
//! and persist the four aggregates, then commit. Any failure before the
//! commit leaves the run `FAILED` with no commit signal.

pub mod state;

pub use state::PipelineState;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};
use tracing::{error, info, info_span};

use crate::{
    aggregate::{evaluate_all, queries::REVIEW_AGGREGATES, AggregateSpec},
    config::PipelineConfig,
    history::JobLifecycle,
    process::{convert::normalize_batch, load_source},
    sink::{split_rows, DatasetSink, WriteReport},
};

/// Outcome of a committed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub job_name: String,
    pub source_files: Vec<PathBuf>,
    pub rows_in: u64,
    /// Processed dataset first, then the aggregates in write order.
    pub outputs: Vec<WriteReport>,
    pub elapsed_seconds: f64,
}

/// Destination of an aggregate: the analytics base path, or a sub-folder of it.
pub fn aggregate_destination(analytics_path: &Path, spec: &AggregateSpec) -> PathBuf {
    match spec.subpath {
        Some(sub) => analytics_path.join(sub),
        None => analytics_path.to_path_buf(),
    }
}

/// Drives a single run. Owns its lifecycle: a `Pipeline` runs at most once.
pub struct Pipeline {
    config: PipelineConfig,
    sink: Arc<dyn DatasetSink>,
    lifecycle: Arc<dyn JobLifecycle>,
    state: PipelineState,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        sink: Arc<dyn DatasetSink>,
        lifecycle: Arc<dyn JobLifecycle>,
    ) -> Self {
        Self {
            config,
            sink,
            lifecycle,
            state: PipelineState::NotStarted,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn enter(&mut self, next: PipelineState) {
        info!(from = %self.state, to = %next, "state transition");
        self.state = next;
    }

    /// Execute every stage in order. On error the state becomes `Failed`
    /// and the error is returned; the lifecycle collaborator is not called.
    pub fn run(&mut self) -> Result<RunSummary> {
        if self.state != PipelineState::NotStarted {
            bail!("pipeline already ran (state {})", self.state);
        }
        let span = info_span!("pipeline", job = %self.config.job_name);
        let _enter = span.enter();

        match self.execute() {
            Ok(summary) => Ok(summary),
            Err(e) => {
                error!(stage = %self.state, "pipeline failed: {:#}", e);
                self.state = PipelineState::Failed;
                Err(e)
            }
        }
    }

    fn execute(&mut self) -> Result<RunSummary> {
        let start = Instant::now();
        self.config.validate()?;

        // ─── 1) read ─────────────────────────────────────────────────────
        self.enter(PipelineState::Reading);
        let raw = load_source(&self.config.source_path, self.config.schema_policy)
            .context("reading source")?;
        let rows_in = raw.num_rows() as u64;

        // ─── 2) normalize ────────────────────────────────────────────────
        self.enter(PipelineState::Normalizing);
        let normalized = normalize_batch(&raw.batch).context("normalizing rows")?;

        // ─── 3) persist processed dataset ────────────────────────────────
        self.enter(PipelineState::WritingProcessed);
        let parts = split_rows(&normalized, self.config.max_rows_per_file);
        let mut outputs = Vec::with_capacity(1 + REVIEW_AGGREGATES.len());
        outputs.push(
            self.sink
                .write(&self.config.processed_path, &parts)
                .with_context(|| {
                    format!(
                        "writing processed dataset to {}",
                        self.config.processed_path.display()
                    )
                })?,
        );

        // ─── 4) aggregates: compute concurrently, write in order ─────────
        let views = evaluate_all(&normalized, &REVIEW_AGGREGATES).context("computing aggregates")?;
        for (i, view) in views.iter().enumerate() {
            self.enter(PipelineState::WritingAggregate(i + 1));
            let dest = aggregate_destination(&self.config.analytics_path, &view.spec);
            let report = self
                .sink
                .write(&dest, std::slice::from_ref(&view.batch))
                .with_context(|| format!("writing {} to {}", view.spec.name, dest.display()))?;
            outputs.push(report);
        }

        // ─── 5) commit ───────────────────────────────────────────────────
        let summary = RunSummary {
            job_name: self.config.job_name.clone(),
            source_files: raw.files,
            rows_in,
            outputs,
            elapsed_seconds: start.elapsed().as_secs_f64(),
        };
        self.lifecycle.commit(&summary).context("committing job")?;
        self.enter(PipelineState::Committed);
        info!(
            rows = rows_in,
            outputs = summary.outputs.len(),
            elapsed = ?start.elapsed(),
            "pipeline committed"
        );
        Ok(summary)
    }
}
