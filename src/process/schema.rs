use crate::process::utils::clean_str;
use anyhow::{bail, Context, Result};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use serde::{Deserialize, Serialize};
use std::{fs::File, path::Path, sync::Arc};
use tracing::warn;

pub const PRODUCT_ID: &str = "product_id";
pub const CUSTOMER_ID: &str = "customer_id";
pub const RATING: &str = "rating";
pub const REVIEW_DATE: &str = "review_date";
pub const REVIEW_TEXT: &str = "review_text";
pub const PRODUCT_ID_UPPER: &str = "product_id_upper";

/// Columns the normalizer and the aggregates rely on.
pub const REQUIRED_COLUMNS: [&str; 5] = [PRODUCT_ID, CUSTOMER_ID, RATING, REVIEW_DATE, REVIEW_TEXT];

/// What to do when the input header lacks one of [`REQUIRED_COLUMNS`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaPolicy {
    /// Abort the run, naming the missing columns.
    #[default]
    FailFast,
    /// Append the missing columns as all-null and let the field fallbacks apply.
    NullFill,
}

/// Cleaned header of one source file.
#[derive(Debug, Clone)]
pub struct SchemaInfo {
    pub headers: Vec<String>,
}

impl SchemaInfo {
    pub fn from_headers(headers: Vec<String>) -> Self {
        Self { headers }
    }
}

/// Every column is read as nullable text; typing happens in the normalizer.
pub fn utf8_schema(headers: &[String]) -> SchemaRef {
    let fields: Vec<Field> = headers
        .iter()
        .map(|n| Field::new(n, DataType::Utf8, true))
        .collect();
    Arc::new(Schema::new(fields))
}

/// Read the header row of `path`.
pub fn read_header(path: &Path) -> Result<SchemaInfo> {
    let file =
        File::open(path).with_context(|| format!("opening source file {}", path.display()))?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);
    let headers: Vec<String> = rdr
        .headers()
        .with_context(|| format!("reading header of {}", path.display()))?
        .iter()
        .map(clean_str)
        .collect();
    Ok(SchemaInfo::from_headers(headers))
}

/// Union of all file headers, in first-seen order.
pub fn union_headers<'a>(infos: impl IntoIterator<Item = &'a SchemaInfo>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for info in infos {
        for h in &info.headers {
            if !out.contains(h) {
                out.push(h.clone());
            }
        }
    }
    out
}

/// Required columns absent from `headers`, in [`REQUIRED_COLUMNS`] order.
pub fn missing_required(headers: &[String]) -> Vec<&'static str> {
    REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !headers.iter().any(|h| h == c))
        .collect()
}

/// Apply `policy` to the dataset header. Returns the columns that must be
/// null-filled (always empty under `FailFast`).
pub fn check_required(headers: &[String], policy: SchemaPolicy) -> Result<Vec<&'static str>> {
    let missing = missing_required(headers);
    if missing.is_empty() {
        return Ok(missing);
    }
    match policy {
        SchemaPolicy::FailFast => bail!(
            "input is missing required column(s): {}",
            missing.join(", ")
        ),
        SchemaPolicy::NullFill => {
            warn!(missing = ?missing, "required columns absent, filling with nulls");
            Ok(missing)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn read_header_trims_names() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("reviews.csv");
        fs::write(&path, " product_id ,customer_id,\"rating\"\n")?;

        let info = read_header(&path)?;
        assert_eq!(info.headers, headers(&["product_id", "customer_id", "rating"]));
        assert!(utf8_schema(&info.headers)
            .fields()
            .iter()
            .all(|f| f.data_type() == &DataType::Utf8));
        Ok(())
    }

    #[test]
    fn union_keeps_first_seen_order() {
        let a = SchemaInfo::from_headers(headers(&["product_id", "rating"]));
        let b = SchemaInfo::from_headers(headers(&["rating", "channel", "product_id"]));
        assert_eq!(
            union_headers([&a, &b]),
            headers(&["product_id", "rating", "channel"])
        );
    }

    #[test]
    fn fail_fast_names_missing_columns() {
        let err = check_required(&headers(&["product_id", "rating"]), SchemaPolicy::FailFast)
            .unwrap_err()
            .to_string();
        assert!(err.contains("customer_id"));
        assert!(err.contains("review_date"));
        assert!(err.contains("review_text"));
    }

    #[test]
    fn null_fill_reports_missing_columns() -> Result<()> {
        let missing = check_required(&headers(&["product_id", "rating"]), SchemaPolicy::NullFill)?;
        assert_eq!(missing, vec![CUSTOMER_ID, REVIEW_DATE, REVIEW_TEXT]);

        let complete = headers(&REQUIRED_COLUMNS);
        assert!(check_required(&complete, SchemaPolicy::FailFast)?.is_empty());
        Ok(())
    }
}
