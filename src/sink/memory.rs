use anyhow::{anyhow, bail, Result};
use arrow::record_batch::RecordBatch;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Mutex,
};

use super::{DatasetSink, WriteReport};

/// Keeps written datasets in memory, keyed by destination. A later write to
/// the same destination replaces the earlier one.
#[derive(Debug, Default)]
pub struct MemorySink {
    written: Mutex<BTreeMap<PathBuf, Vec<RecordBatch>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parts last written to `destination`, if any.
    pub fn get(&self, destination: &Path) -> Option<Vec<RecordBatch>> {
        let written = self.written.lock().unwrap_or_else(|e| e.into_inner());
        written.get(destination).cloned()
    }

    /// Every destination written so far, sorted.
    pub fn destinations(&self) -> Vec<PathBuf> {
        let written = self.written.lock().unwrap_or_else(|e| e.into_inner());
        written.keys().cloned().collect()
    }
}

impl DatasetSink for MemorySink {
    fn write(&self, destination: &Path, parts: &[RecordBatch]) -> Result<WriteReport> {
        if parts.is_empty() {
            bail!("nothing to write to {}", destination.display());
        }
        let rows: u64 = parts.iter().map(|b| b.num_rows() as u64).sum();
        let bytes: u64 = parts
            .iter()
            .map(|b| b.get_array_memory_size() as u64)
            .sum();

        let mut written = self
            .written
            .lock()
            .map_err(|_| anyhow!("memory sink lock poisoned"))?;
        written.insert(destination.to_path_buf(), parts.to_vec());
        Ok(WriteReport {
            destination: destination.to_path_buf(),
            files: Vec::new(),
            rows,
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::{
        array::Int32Array,
        datatypes::{DataType, Field, Schema},
    };
    use std::sync::Arc;

    #[test]
    fn later_write_replaces_earlier() -> Result<()> {
        let schema = Arc::new(Schema::new(vec![Field::new("v", DataType::Int32, false)]));
        let one = RecordBatch::try_new(schema.clone(), vec![Arc::new(Int32Array::from(vec![1]))])?;
        let two =
            RecordBatch::try_new(schema, vec![Arc::new(Int32Array::from(vec![1, 2]))])?;

        let sink = MemorySink::new();
        let dest = Path::new("out/processed");
        sink.write(dest, &[one])?;
        let report = sink.write(dest, &[two])?;

        assert_eq!(report.rows, 2);
        assert_eq!(sink.destinations(), vec![PathBuf::from("out/processed")]);
        assert_eq!(sink.get(dest).unwrap()[0].num_rows(), 2);
        Ok(())
    }

    #[test]
    fn poisoned_lock_is_an_error_not_a_panic() -> Result<()> {
        let schema = Arc::new(Schema::new(vec![Field::new("v", DataType::Int32, false)]));
        let batch = RecordBatch::try_new(schema, vec![Arc::new(Int32Array::from(vec![7]))])?;
        let sink = Arc::new(MemorySink::new());
        sink.write(Path::new("out/a"), &[batch.clone()])?;

        let poisoner = sink.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.written.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert!(sink.write(Path::new("out/b"), &[batch]).is_err());
        assert_eq!(sink.destinations(), vec![PathBuf::from("out/a")]);
        assert!(sink.get(Path::new("out/a")).is_some());
        Ok(())
    }
}
