use anyhow::{bail, Context, Result};
use arrow::{csv::WriterBuilder, record_batch::RecordBatch};
use parquet::{
    arrow::ArrowWriter,
    basic::{BrotliLevel, Compression},
    file::properties::WriterProperties,
};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, info};

use super::{DatasetSink, OutputFormat, WriteReport};

const PART_PREFIX: &str = "part-";

/// Writes datasets as `part-NNNNN.<ext>` files into local directories.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSink {
    format: OutputFormat,
}

impl LocalSink {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Remove part files left by a previous write. Only the destination's own
    /// files are touched; nested destinations survive.
    fn clear_parts(&self, dir: &Path) -> Result<()> {
        for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if entry.file_type()?.is_file() && name.starts_with(PART_PREFIX) {
                fs::remove_file(entry.path())
                    .with_context(|| format!("removing stale {}", entry.path().display()))?;
                debug!(file = %entry.path().display(), "removed stale part");
            }
        }
        Ok(())
    }

    fn write_csv(&self, batch: &RecordBatch, file: File) -> Result<()> {
        let mut writer = WriterBuilder::new()
            .with_header(true)
            .build(BufWriter::new(file));
        writer.write(batch).context("writing CSV batch")?;
        writer.into_inner().flush().context("flushing CSV file")?;
        Ok(())
    }

    fn write_parquet(&self, batch: &RecordBatch, file: File) -> Result<()> {
        let props = WriterProperties::builder()
            .set_compression(Compression::BROTLI(BrotliLevel::try_new(5)?))
            .build();
        let mut writer = ArrowWriter::try_new(BufWriter::new(file), batch.schema(), Some(props))
            .context("creating parquet writer")?;
        writer.write(batch).context("writing batch to parquet")?;
        writer.close().context("closing parquet writer")?;
        Ok(())
    }

    /// Write one part to a temporary name, then rename it into place.
    fn write_part(&self, batch: &RecordBatch, path: &Path) -> Result<u64> {
        let tmp = path.with_extension("tmp");
        let file =
            File::create(&tmp).with_context(|| format!("creating file {}", tmp.display()))?;
        match self.format {
            OutputFormat::Csv => self.write_csv(batch, file)?,
            OutputFormat::Parquet => self.write_parquet(batch, file)?,
        }
        fs::rename(&tmp, path)
            .with_context(|| format!("renaming {} -> {}", tmp.display(), path.display()))?;

        let metadata = fs::metadata(path).context("getting file metadata")?;
        Ok(metadata.len())
    }
}

impl DatasetSink for LocalSink {
    fn write(&self, destination: &Path, parts: &[RecordBatch]) -> Result<WriteReport> {
        if parts.is_empty() {
            bail!("nothing to write to {}", destination.display());
        }
        fs::create_dir_all(destination)
            .with_context(|| format!("creating output directory {}", destination.display()))?;
        self.clear_parts(destination)?;

        let mut files: Vec<PathBuf> = Vec::with_capacity(parts.len());
        let mut rows = 0u64;
        let mut bytes = 0u64;
        for (idx, batch) in parts.iter().enumerate() {
            let path = destination.join(format!(
                "{}{:05}.{}",
                PART_PREFIX,
                idx,
                self.format.extension()
            ));
            bytes += self.write_part(batch, &path)?;
            rows += batch.num_rows() as u64;
            files.push(path);
        }

        info!(
            destination = %destination.display(),
            files = files.len(),
            rows,
            bytes,
            "dataset written"
        );
        Ok(WriteReport {
            destination: destination.to_path_buf(),
            files,
            rows,
            bytes,
        })
    }
}
