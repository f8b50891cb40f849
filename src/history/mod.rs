// src/history/mod.rs

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, StringArray, TimestampMicrosecondArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::Utc;
use glob::{glob, Pattern};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::{
    collections::HashSet,
    fs,
    fs::File,
    path::PathBuf,
    sync::Arc,
};
use tracing::info;

use crate::pipeline::RunSummary;

pub const COMMITTED: &str = "committed";

/// The external job-tracking collaborator. `commit` is called exactly once,
/// after every output of a run has been written.
pub trait JobLifecycle: Send + Sync {
    fn commit(&self, summary: &RunSummary) -> Result<()>;
}

/// For callers that track jobs elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLifecycle;

impl JobLifecycle for NoopLifecycle {
    fn commit(&self, summary: &RunSummary) -> Result<()> {
        info!(job = %summary.job_name, "commit (untracked)");
        Ok(())
    }
}

/// A simple job history backed by Parquet files.
pub struct JobHistory {
    history_dir: PathBuf,
}

impl JobHistory {
    /// Construct a new JobHistory at `history_dir`, creating the directory if needed.
    pub fn new(history_dir: impl Into<PathBuf>) -> Result<Self> {
        let history_dir = history_dir.into();
        fs::create_dir_all(&history_dir)
            .with_context(|| format!("creating history directory {:?}", &history_dir))?;
        Ok(Self { history_dir })
    }

    /// Record an event for `job_name` (e.g. "committed").
    /// Writes a single-row Parquet file named `<job>_<event>_<ts>.parquet`.
    pub fn record_event(
        &self,
        job_name: &str,
        event: &str,
        rows_in: u64,
        files_written: u64,
    ) -> Result<PathBuf> {
        // Timestamp in microseconds
        let ts = Utc::now().timestamp_micros();
        let filename = format!("{}_{}_{}.parquet", job_name, event, ts);
        let path = self.history_dir.join(filename);

        let schema = Arc::new(Schema::new(vec![
            Field::new("job_name", DataType::Utf8, false),
            Field::new("event", DataType::Utf8, false),
            Field::new("rows_in", DataType::UInt64, false),
            Field::new("files_written", DataType::UInt64, false),
            Field::new(
                "event_time",
                DataType::Timestamp(TimeUnit::Microsecond, None),
                false,
            ),
        ]));

        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(vec![job_name.to_string()])),
            Arc::new(StringArray::from(vec![event.to_string()])),
            Arc::new(UInt64Array::from(vec![rows_in])),
            Arc::new(UInt64Array::from(vec![files_written])),
            Arc::new(TimestampMicrosecondArray::from_iter_values(vec![ts])),
        ];

        let batch =
            RecordBatch::try_new(schema.clone(), columns).context("building history record batch")?;
        let file =
            File::create(&path).with_context(|| format!("creating history file {:?}", &path))?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut writer = ArrowWriter::try_new(file, schema, Some(props))
            .context("creating Arrow writer for history")?;
        writer.write(&batch).context("writing history batch")?;
        writer.close().context("closing history writer")?;
        Ok(path)
    }

    /// Load all distinct job names for the given `event` by scanning filenames.
    /// Uses glob pattern matching on `<job>_<event>_*.parquet`.
    pub fn load_event_names(&self, event: &str) -> Result<HashSet<String>> {
        let mut set = HashSet::new();
        let pattern = format!(
            "{}/*_{}_*.parquet",
            Pattern::escape(&self.history_dir.display().to_string()),
            event
        );
        for path in glob(&pattern)?.flatten() {
            if let Some(fname) = path.file_stem().and_then(|s| s.to_str()) {
                // fname = "<job>_<event>_<ts>"
                if let Some(idx) = fname.rfind(&format!("_{}_", event)) {
                    set.insert(fname[..idx].to_string());
                }
            }
        }
        Ok(set)
    }
}

impl JobLifecycle for JobHistory {
    fn commit(&self, summary: &RunSummary) -> Result<()> {
        let files = summary.outputs.len() as u64;
        let path = self.record_event(&summary.job_name, COMMITTED, summary.rows_in, files)?;
        info!(job = %summary.job_name, marker = %path.display(), "job committed");
        Ok(())
    }
}
