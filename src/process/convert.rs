use crate::process::date_parser::{parse_review_date, to_date32};
use crate::process::schema::{PRODUCT_ID, PRODUCT_ID_UPPER, RATING, REVIEW_DATE, REVIEW_TEXT};
use anyhow::{anyhow, Result};
use arrow::{
    array::{Array, ArrayRef, Date32Builder, Int32Builder, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use std::sync::Arc;

/// Substituted for a missing review body.
pub const DEFAULT_REVIEW_TEXT: &str = "No review text";

/// Integer rating, `0` when missing or not numeric.
///
/// Integral text parses directly; a finite decimal inside `i32` range is
/// truncated toward zero (`"4.5"` → 4), matching a string→int cast.
pub fn coerce_rating(raw: Option<&str>) -> i32 {
    let Some(s) = raw.map(str::trim) else {
        return 0;
    };
    if let Ok(v) = s.parse::<i32>() {
        return v;
    }
    match s.parse::<f64>() {
        Ok(f) if f.is_finite() && f > i32::MIN as f64 - 1.0 && f < i32::MAX as f64 + 1.0 => {
            f.trunc() as i32
        }
        _ => 0,
    }
}

pub fn fill_review_text(raw: Option<&str>) -> &str {
    raw.unwrap_or(DEFAULT_REVIEW_TEXT)
}

pub fn upper_product_id(raw: Option<&str>) -> Option<String> {
    raw.map(str::to_uppercase)
}

fn text_column<'a>(arr: &'a ArrayRef, name: &str) -> Result<&'a StringArray> {
    arr.as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| anyhow!("column `{}` must be text, got {}", name, arr.data_type()))
}

/// Apply the field rules to every row of a raw (all-text) batch.
///
/// - `rating`      → Int32, never null
/// - `review_date` → Date32, null when not `YYYY-MM-DD`
/// - `review_text` → Utf8, never null
/// - `product_id_upper` appended (or replaced in place if the input already has it)
///
/// All other columns are carried through as-is. Row count is preserved.
pub fn normalize_batch(batch: &RecordBatch) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut fields: Vec<Field> = Vec::with_capacity(batch.num_columns() + 1);
    let mut out: Vec<ArrayRef> = Vec::with_capacity(batch.num_columns() + 1);
    let mut upper_at = None;

    for (arr, fld) in batch.columns().iter().zip(schema.fields()) {
        match fld.name().as_str() {
            RATING => {
                let sarr = text_column(arr, RATING)?;
                let mut b = Int32Builder::with_capacity(sarr.len());
                for opt in sarr.iter() {
                    b.append_value(coerce_rating(opt));
                }
                fields.push(Field::new(RATING, DataType::Int32, false));
                out.push(Arc::new(b.finish()) as ArrayRef);
            }

            REVIEW_DATE => {
                let sarr = text_column(arr, REVIEW_DATE)?;
                let mut b = Date32Builder::with_capacity(sarr.len());
                for opt in sarr.iter() {
                    b.append_option(opt.and_then(parse_review_date).map(to_date32));
                }
                fields.push(Field::new(REVIEW_DATE, DataType::Date32, true));
                out.push(Arc::new(b.finish()) as ArrayRef);
            }

            REVIEW_TEXT => {
                let sarr = text_column(arr, REVIEW_TEXT)?;
                let filled: StringArray = sarr.iter().map(|opt| Some(fill_review_text(opt))).collect();
                fields.push(Field::new(REVIEW_TEXT, DataType::Utf8, false));
                out.push(Arc::new(filled) as ArrayRef);
            }

            PRODUCT_ID_UPPER => {
                // recomputed below from product_id
                upper_at = Some(out.len());
                fields.push(Field::new(PRODUCT_ID_UPPER, DataType::Utf8, true));
                out.push(arr.clone());
            }

            _ => {
                fields.push(fld.as_ref().clone());
                out.push(arr.clone());
            }
        }
    }

    let pid = schema
        .index_of(PRODUCT_ID)
        .map_err(|_| anyhow!("column `{}` not found", PRODUCT_ID))?;
    let pid = text_column(batch.column(pid), PRODUCT_ID)?;
    let upper: StringArray = pid.iter().map(upper_product_id).collect();
    let upper = Arc::new(upper) as ArrayRef;

    match upper_at {
        Some(i) => out[i] = upper,
        None => {
            fields.push(Field::new(PRODUCT_ID_UPPER, DataType::Utf8, true));
            out.push(upper);
        }
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), out).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Date32Array, Int32Array};
    use chrono::NaiveDate;

    fn raw_batch(cols: &[(&str, Vec<Option<&str>>)]) -> RecordBatch {
        let fields: Vec<Field> = cols
            .iter()
            .map(|(n, _)| Field::new(*n, DataType::Utf8, true))
            .collect();
        let arrays: Vec<ArrayRef> = cols
            .iter()
            .map(|(_, v)| Arc::new(StringArray::from(v.clone())) as ArrayRef)
            .collect();
        RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).unwrap()
    }

    #[test]
    fn rating_falls_back_to_zero() {
        assert_eq!(coerce_rating(Some("4")), 4);
        assert_eq!(coerce_rating(Some(" 5 ")), 5);
        assert_eq!(coerce_rating(Some("4.5")), 4);
        assert_eq!(coerce_rating(Some("-2.9")), -2);
        assert_eq!(coerce_rating(Some("")), 0);
        assert_eq!(coerce_rating(Some("five")), 0);
        assert_eq!(coerce_rating(Some("NaN")), 0);
        assert_eq!(coerce_rating(Some("1e20")), 0);
        assert_eq!(coerce_rating(None), 0);
    }

    #[test]
    fn review_text_and_product_id_rules() {
        assert_eq!(fill_review_text(None), "No review text");
        assert_eq!(fill_review_text(Some("Great!")), "Great!");
        assert_eq!(upper_product_id(Some("abc123")), Some("ABC123".to_string()));
        assert_eq!(upper_product_id(None), None);
    }

    #[test]
    fn normalize_batch_types_and_fills() -> Result<()> {
        let batch = raw_batch(&[
            ("product_id", vec![Some("abc123"), None, Some("x9")]),
            ("customer_id", vec![Some("c1"), Some("c2"), None]),
            ("rating", vec![Some("4"), None, Some("five")]),
            ("review_date", vec![Some("2023-05-01"), Some("05/01/2023"), None]),
            ("review_text", vec![None, Some("Great!"), Some("meh")]),
            ("channel", vec![Some("web"), None, Some("app")]),
        ]);

        let out = normalize_batch(&batch)?;
        assert_eq!(out.num_rows(), 3);

        let names: Vec<&str> = out
            .schema_ref()
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "product_id",
                "customer_id",
                "rating",
                "review_date",
                "review_text",
                "channel",
                "product_id_upper"
            ]
        );

        let rating = out.column(2).as_any().downcast_ref::<Int32Array>().unwrap();
        assert_eq!(rating.values().to_vec(), vec![4, 0, 0]);
        assert_eq!(rating.null_count(), 0);

        let dates = out.column(3).as_any().downcast_ref::<Date32Array>().unwrap();
        assert_eq!(dates.value_as_date(0), NaiveDate::from_ymd_opt(2023, 5, 1));
        assert!(dates.is_null(1));
        assert!(dates.is_null(2));

        let text = out.column(4).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(text.value(0), DEFAULT_REVIEW_TEXT);
        assert_eq!(text.value(1), "Great!");
        assert_eq!(text.null_count(), 0);

        let passthrough = out.column(5).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(passthrough.value(0), "web");
        assert!(passthrough.is_null(1));

        let upper = out.column(6).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(upper.value(0), "ABC123");
        assert!(upper.is_null(1));
        assert_eq!(upper.value(2), "X9");
        Ok(())
    }

    #[test]
    fn existing_upper_column_is_recomputed_in_place() -> Result<()> {
        let batch = raw_batch(&[
            ("product_id_upper", vec![Some("stale")]),
            ("product_id", vec![Some("p1")]),
            ("customer_id", vec![Some("c1")]),
            ("rating", vec![Some("3")]),
            ("review_date", vec![Some("2024-01-02")]),
            ("review_text", vec![Some("fine")]),
        ]);
        let out = normalize_batch(&batch)?;
        assert_eq!(out.num_columns(), 6);
        let upper = out.column(0).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(upper.value(0), "P1");
        Ok(())
    }

    #[test]
    fn empty_batch_normalizes_to_empty_batch() -> Result<()> {
        let batch = raw_batch(&[
            ("product_id", vec![]),
            ("customer_id", vec![]),
            ("rating", vec![]),
            ("review_date", vec![]),
            ("review_text", vec![]),
        ]);
        let out = normalize_batch(&batch)?;
        assert_eq!(out.num_rows(), 0);
        assert_eq!(out.num_columns(), 6);
        Ok(())
    }
}
