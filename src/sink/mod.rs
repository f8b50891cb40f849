pub mod local;
pub mod memory;

pub use local::LocalSink;
pub use memory::MemorySink;

use anyhow::Result;
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// On-disk encoding of a written dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Delimited text with a header row.
    #[default]
    Csv,
    Parquet,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
        }
    }
}

/// What one `write` produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    pub destination: PathBuf,
    pub files: Vec<PathBuf>,
    pub rows: u64,
    pub bytes: u64,
}

/// Persists a whole dataset to one named destination.
///
/// Each element of `parts` becomes exactly one output file; a write replaces
/// whatever an earlier write left at the same destination. `parts` must not
/// be empty; pass a zero-row batch to write an empty dataset.
pub trait DatasetSink: Send + Sync {
    fn write(&self, destination: &Path, parts: &[RecordBatch]) -> Result<WriteReport>;
}

/// Split `batch` into slices of at most `max_rows` rows. Always returns at
/// least one (possibly empty) part.
pub fn split_rows(batch: &RecordBatch, max_rows: usize) -> Vec<RecordBatch> {
    let max_rows = max_rows.max(1);
    if batch.num_rows() <= max_rows {
        return vec![batch.clone()];
    }
    (0..batch.num_rows())
        .step_by(max_rows)
        .map(|offset| batch.slice(offset, max_rows.min(batch.num_rows() - offset)))
        .collect()
}
