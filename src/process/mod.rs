// src/process/mod.rs
pub mod convert;
pub mod date_parser;
pub mod schema;
pub mod utils;

use anyhow::{Context, Result};
use arrow::{
    array::{new_null_array, Array, ArrayRef, StringBuilder},
    compute::concat_batches,
    datatypes::DataType,
    record_batch::RecordBatch,
};
use csv::{ByteRecord, ReaderBuilder};
use std::{
    fs::File,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info, warn};

use crate::process::{
    schema::{check_required, read_header, union_headers, utf8_schema, SchemaInfo, SchemaPolicy},
    utils::list_csv_files,
};

/// The raw dataset: every source row as text, aligned to one header.
#[derive(Debug)]
pub struct RawTable {
    /// Union of all file headers (first-seen order), plus any null-filled
    /// required columns appended at the end.
    pub headers: Vec<String>,
    /// All rows, all columns `Utf8`; empty cells are null.
    pub batch: RecordBatch,
    /// Files the rows came from, in read order.
    pub files: Vec<PathBuf>,
}

impl RawTable {
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }
}

/// Read every CSV file under `source` into one raw table.
///
/// Files are read in path order. A file missing some column of the union
/// header contributes nulls for it. Required columns are checked against
/// `policy` before any data row is read.
///
/// Rows are never rejected for their shape: a short row is padded with
/// nulls and fields past the header width are dropped.
#[tracing::instrument(level = "info", skip(source), fields(path = %source.as_ref().display()))]
pub fn load_source<P: AsRef<Path>>(source: P, policy: SchemaPolicy) -> Result<RawTable> {
    let files = list_csv_files(source.as_ref())?;
    let infos = files
        .iter()
        .map(|f| read_header(f))
        .collect::<Result<Vec<SchemaInfo>>>()?;

    let mut headers = union_headers(&infos);
    let fill = check_required(&headers, policy)?;
    headers.extend(fill.iter().map(|c| c.to_string()));
    let schema = utf8_schema(&headers);

    let mut batches = Vec::with_capacity(files.len());
    for (path, info) in files.iter().zip(&infos) {
        let columns = read_columns(path, info)?;
        let rows = columns.first().map_or(0, |c| c.len());

        // align to the union header
        let aligned: Vec<ArrayRef> = headers
            .iter()
            .map(|h| match info.headers.iter().position(|x| x == h) {
                Some(i) => columns[i].clone(),
                None => new_null_array(&DataType::Utf8, rows),
            })
            .collect();
        batches.push(RecordBatch::try_new(schema.clone(), aligned)?);
        debug!(file = %path.display(), rows, "read source file");
    }

    let batch = concat_batches(&schema, &batches).context("concatenating source batches")?;
    info!(files = files.len(), rows = batch.num_rows(), "loaded source");

    Ok(RawTable {
        headers,
        batch,
        files,
    })
}

/// Parse the data rows of one file into one text column per header field.
fn read_columns(path: &Path, info: &SchemaInfo) -> Result<Vec<ArrayRef>> {
    let file =
        File::open(path).with_context(|| format!("opening source file {}", path.display()))?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // ragged rows are padded or cut below, never rejected
        .from_reader(file);

    let width = info.headers.len();
    let mut builders: Vec<StringBuilder> = (0..width).map(|_| StringBuilder::new()).collect();
    let (mut short, mut long) = (0usize, 0usize);

    let mut record = ByteRecord::new();
    let mut idx = 0usize;
    while rdr
        .read_byte_record(&mut record)
        .with_context(|| format!("CSV parse error in {} at record {}", path.display(), idx))?
    {
        idx += 1;
        if record.len() < width {
            short += 1;
        } else if record.len() > width {
            long += 1;
        }
        for (i, b) in builders.iter_mut().enumerate() {
            match record.get(i) {
                Some(raw) if !raw.is_empty() => b.append_value(String::from_utf8_lossy(raw)),
                _ => b.append_null(),
            }
        }
    }

    if short > 0 || long > 0 {
        warn!(
            file = %path.display(),
            short,
            long,
            expected = width,
            "rows with a field count different from the header"
        );
    }
    Ok(builders
        .iter_mut()
        .map(|b| Arc::new(b.finish()) as ArrayRef)
        .collect())
}
