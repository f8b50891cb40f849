//! Grouped summaries over the normalized dataset.
//!
//! Each view is an [`AggregateSpec`]: a group-key column, a reducer, an
//! ordering and an optional row limit. Groups are collected in ascending key
//! order (nulls first) and then stably sorted by the requested order, so ties
//! always fall back to the key.

pub mod queries;

use anyhow::{anyhow, bail, Result};
use arrow::{
    array::{
        Array, ArrayRef, Date32Array, Date32Builder, Float64Builder, Int32Array, Int32Builder,
        Int64Builder, StringArray, StringBuilder,
    },
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use rayon::prelude::*;
use std::{cmp::Ordering, collections::BTreeMap, sync::Arc};
use tracing::debug;

/// One group-key value. Variant order makes `Null` sort before any value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupKey {
    Null,
    Int(i32),
    Date(i32),
    Text(String),
}

/// How the rows of one group are reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    /// Row count, emitted as `output` (Int64).
    Count { output: &'static str },
    /// Arithmetic mean of an Int32 column plus the row count.
    MeanWithCount {
        value: &'static str,
        mean_output: &'static str,
        count_output: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    /// By the group key itself.
    Key(Direction),
    /// By the group's row count.
    Count(Direction),
    /// By the group's mean; only valid with [`Reducer::MeanWithCount`].
    Mean(Direction),
}

/// Definition of one aggregate view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateSpec {
    pub name: &'static str,
    /// Sub-folder under the analytics base path; `None` writes to the base itself.
    pub subpath: Option<&'static str>,
    pub key: &'static str,
    pub reducer: Reducer,
    pub order: SortBy,
    pub limit: Option<usize>,
}

/// A computed view, ready to hand to a sink.
#[derive(Debug, Clone)]
pub struct AggregateView {
    pub spec: AggregateSpec,
    pub batch: RecordBatch,
}

#[derive(Debug, Default, Clone, Copy)]
struct Accumulator {
    count: i64,
    sum: i64,
}

impl Accumulator {
    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    let idx = batch
        .schema_ref()
        .index_of(name)
        .map_err(|_| anyhow!("column `{}` not found in normalized dataset", name))?;
    Ok(batch.column(idx))
}

/// Read every row's group key out of `arr`.
fn extract_keys(arr: &ArrayRef) -> Result<Vec<GroupKey>> {
    let keys = match arr.data_type() {
        DataType::Utf8 => arr
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| anyhow!("expected StringArray"))?
            .iter()
            .map(|v| v.map_or(GroupKey::Null, |s| GroupKey::Text(s.to_string())))
            .collect(),
        DataType::Int32 => arr
            .as_any()
            .downcast_ref::<Int32Array>()
            .ok_or_else(|| anyhow!("expected Int32Array"))?
            .iter()
            .map(|v| v.map_or(GroupKey::Null, GroupKey::Int))
            .collect(),
        DataType::Date32 => arr
            .as_any()
            .downcast_ref::<Date32Array>()
            .ok_or_else(|| anyhow!("expected Date32Array"))?
            .iter()
            .map(|v| v.map_or(GroupKey::Null, GroupKey::Date))
            .collect(),
        other => bail!("cannot group by column of type {}", other),
    };
    Ok(keys)
}

/// Rebuild the key column of the output, keeping the input's type.
fn build_key_column(data_type: &DataType, keys: &[&GroupKey]) -> Result<ArrayRef> {
    let arr: ArrayRef = match data_type {
        DataType::Utf8 => {
            let mut b = StringBuilder::new();
            for k in keys {
                match k {
                    GroupKey::Text(s) => b.append_value(s),
                    _ => b.append_null(),
                }
            }
            Arc::new(b.finish())
        }
        DataType::Int32 => {
            let mut b = Int32Builder::with_capacity(keys.len());
            for k in keys {
                match k {
                    GroupKey::Int(v) => b.append_value(*v),
                    _ => b.append_null(),
                }
            }
            Arc::new(b.finish())
        }
        DataType::Date32 => {
            let mut b = Date32Builder::with_capacity(keys.len());
            for k in keys {
                match k {
                    GroupKey::Date(v) => b.append_value(*v),
                    _ => b.append_null(),
                }
            }
            Arc::new(b.finish())
        }
        other => bail!("cannot emit key column of type {}", other),
    };
    Ok(arr)
}

fn directed(ord: Ordering, dir: Direction) -> Ordering {
    match dir {
        Direction::Asc => ord,
        Direction::Desc => ord.reverse(),
    }
}

impl AggregateSpec {
    /// Group, reduce, order and limit `batch` according to this spec.
    pub fn evaluate(&self, batch: &RecordBatch) -> Result<AggregateView> {
        let key_arr = column(batch, self.key)?;
        let keys = extract_keys(key_arr)?;

        let values = match self.reducer {
            Reducer::Count { .. } => None,
            Reducer::MeanWithCount { value, .. } => Some(
                column(batch, value)?
                    .as_any()
                    .downcast_ref::<Int32Array>()
                    .ok_or_else(|| anyhow!("column `{}` must be Int32 to average", value))?,
            ),
        };
        if matches!(self.order, SortBy::Mean(_)) && values.is_none() {
            bail!("aggregate `{}` sorts by mean but does not compute one", self.name);
        }

        let mut groups: BTreeMap<GroupKey, Accumulator> = BTreeMap::new();
        for (row, key) in keys.into_iter().enumerate() {
            let acc = groups.entry(key).or_default();
            acc.count += 1;
            if let Some(v) = values {
                // nulls do not occur after normalization; treat one as 0 if they do
                acc.sum += if v.is_null(row) { 0 } else { v.value(row) as i64 };
            }
        }

        let mut rows: Vec<(GroupKey, Accumulator)> = groups.into_iter().collect();
        // stable: ties keep ascending key order
        match self.order {
            SortBy::Key(dir) => {
                if dir == Direction::Desc {
                    rows.reverse();
                }
            }
            SortBy::Count(dir) => rows.sort_by(|a, b| directed(a.1.count.cmp(&b.1.count), dir)),
            SortBy::Mean(dir) => {
                rows.sort_by(|a, b| directed(a.1.mean().total_cmp(&b.1.mean()), dir))
            }
        }
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }

        let key_type = key_arr.data_type().clone();
        let group_keys: Vec<&GroupKey> = rows.iter().map(|(k, _)| k).collect();
        let mut fields = vec![Field::new(self.key, key_type.clone(), true)];
        let mut columns = vec![build_key_column(&key_type, &group_keys)?];

        match self.reducer {
            Reducer::Count { output } => {
                let mut counts = Int64Builder::with_capacity(rows.len());
                rows.iter().for_each(|(_, acc)| counts.append_value(acc.count));
                fields.push(Field::new(output, DataType::Int64, false));
                columns.push(Arc::new(counts.finish()) as ArrayRef);
            }
            Reducer::MeanWithCount {
                mean_output,
                count_output,
                ..
            } => {
                let mut means = Float64Builder::with_capacity(rows.len());
                let mut counts = Int64Builder::with_capacity(rows.len());
                for (_, acc) in &rows {
                    means.append_value(acc.mean());
                    counts.append_value(acc.count);
                }
                fields.push(Field::new(mean_output, DataType::Float64, false));
                fields.push(Field::new(count_output, DataType::Int64, false));
                columns.push(Arc::new(means.finish()) as ArrayRef);
                columns.push(Arc::new(counts.finish()) as ArrayRef);
            }
        }

        let out = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?;
        debug!(aggregate = self.name, groups = out.num_rows(), "aggregate computed");
        Ok(AggregateView {
            spec: *self,
            batch: out,
        })
    }
}

/// Evaluate all specs over the same dataset, concurrently. Results come back
/// in `specs` order.
pub fn evaluate_all(batch: &RecordBatch, specs: &[AggregateSpec]) -> Result<Vec<AggregateView>> {
    specs.par_iter().map(|spec| spec.evaluate(batch)).collect()
}
