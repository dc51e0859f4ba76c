//! Per-field merge semantics.
//!
//! When features are fused, cobbled or combined, each metadata column of the
//! result is computed from the values of every contributing feature. An
//! [`Aggregate`] says which [`MergeOperation`] applies to which field; it is
//! resolved against a stream schema once, when an operator is built.

use crate::error::{Result, StreamError};
use crate::feature::Strand;
use crate::schema::{Schema, CHR, STRAND};
use crate::streaming::buffers::DEFAULT_TEXT_SEPARATOR;
use crate::value::{Value, ValueKind};
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// User-supplied merge function over the values of one column.
pub type MergeFn = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// Operations for merging column values.
#[derive(Clone)]
pub enum MergeOperation {
    /// Sum numbers, join text with `|`, concatenate records.
    Generic,
    /// Common value if all agree, otherwise the unstranded sentinel.
    Strand,
    First,
    Last,
    Sum,
    Min,
    Max,
    Mean,
    /// Distinct text values joined with `|`, in first-seen order.
    Distinct,
    Custom(MergeFn),
}

impl fmt::Debug for MergeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeOperation::Generic => write!(f, "Generic"),
            MergeOperation::Strand => write!(f, "Strand"),
            MergeOperation::First => write!(f, "First"),
            MergeOperation::Last => write!(f, "Last"),
            MergeOperation::Sum => write!(f, "Sum"),
            MergeOperation::Min => write!(f, "Min"),
            MergeOperation::Max => write!(f, "Max"),
            MergeOperation::Mean => write!(f, "Mean"),
            MergeOperation::Distinct => write!(f, "Distinct"),
            MergeOperation::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl MergeOperation {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "generic" => Some(MergeOperation::Generic),
            "strand" => Some(MergeOperation::Strand),
            "first" => Some(MergeOperation::First),
            "last" => Some(MergeOperation::Last),
            "sum" => Some(MergeOperation::Sum),
            "min" => Some(MergeOperation::Min),
            "max" => Some(MergeOperation::Max),
            "mean" => Some(MergeOperation::Mean),
            "distinct" => Some(MergeOperation::Distinct),
            _ => None,
        }
    }

    /// Wrap a closure as a merge operation.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        MergeOperation::Custom(Arc::new(f))
    }

    /// Check that this operation makes sense for a column kind.
    fn check_kind(&self, field: &str, kind: ValueKind) -> Result<()> {
        let numeric = matches!(kind, ValueKind::Int | ValueKind::Float);
        let ok = match self {
            MergeOperation::Sum | MergeOperation::Mean => numeric,
            MergeOperation::Distinct => kind == ValueKind::Text,
            _ => true,
        };
        if ok {
            Ok(())
        } else {
            Err(StreamError::argument(format!(
                "merge operation {:?} cannot apply to {} field '{}'",
                self, kind, field
            )))
        }
    }

    /// Merge the values of one column. An empty slice yields the kind's zero.
    pub fn apply(&self, kind: ValueKind, values: &[Value]) -> Value {
        let Some(first) = values.first() else {
            return match self {
                MergeOperation::Strand => Strand::unstranded(kind),
                _ => kind.zero(),
            };
        };
        match self {
            MergeOperation::Generic => generic_merge(kind, values),
            MergeOperation::Strand => {
                if values[1..].iter().all(|v| v == first) {
                    first.clone()
                } else {
                    Strand::unstranded(kind)
                }
            }
            MergeOperation::First => first.clone(),
            MergeOperation::Last => values[values.len() - 1].clone(),
            MergeOperation::Sum => sum(kind, values),
            MergeOperation::Min => values.iter().min().cloned().unwrap_or_else(|| kind.zero()),
            MergeOperation::Max => values.iter().max().cloned().unwrap_or_else(|| kind.zero()),
            MergeOperation::Mean => {
                let total: f64 = values.iter().filter_map(Value::as_f64).sum();
                let mean = total / values.len() as f64;
                match kind {
                    ValueKind::Int => Value::Int(mean.round() as i64),
                    _ => Value::Float(mean),
                }
            }
            MergeOperation::Distinct => {
                let mut seen: Vec<String> = Vec::with_capacity(values.len());
                for v in values {
                    for part in v.to_string().split(DEFAULT_TEXT_SEPARATOR) {
                        if !seen.iter().any(|s| s == part) {
                            seen.push(part.to_string());
                        }
                    }
                }
                Value::Text(seen.join(DEFAULT_TEXT_SEPARATOR))
            }
            MergeOperation::Custom(f) => f(values),
        }
    }
}

fn sum(kind: ValueKind, values: &[Value]) -> Value {
    match kind {
        ValueKind::Int => Value::Int(values.iter().filter_map(Value::as_int).sum()),
        _ => Value::Float(values.iter().filter_map(Value::as_f64).sum()),
    }
}

/// The default merge: chosen by the column's declared kind.
pub fn generic_merge(kind: ValueKind, values: &[Value]) -> Value {
    match kind {
        ValueKind::Int | ValueKind::Float => sum(kind, values),
        ValueKind::Text => {
            let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            Value::Text(parts.join(DEFAULT_TEXT_SEPARATOR))
        }
        ValueKind::Record => {
            let mut items = Vec::new();
            for v in values {
                match v {
                    Value::Record(inner) => items.extend(inner.iter().cloned()),
                    other => items.push(other.clone()),
                }
            }
            Value::Record(items)
        }
    }
}

/// Field name to merge operation mapping.
///
/// Fields without an override use `strand` → [`MergeOperation::Strand`],
/// `chr` → [`MergeOperation::First`], anything else →
/// [`MergeOperation::Generic`]. The value is immutable once handed to an
/// operator; each call builds its own.
#[derive(Debug, Clone, Default)]
pub struct Aggregate {
    overrides: FxHashMap<String, MergeOperation>,
}

impl Aggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the merge operation for one field (builder pattern).
    pub fn with(mut self, field: impl Into<String>, op: MergeOperation) -> Self {
        self.overrides.insert(field.into(), op);
        self
    }

    /// The operation that applies to `field`.
    pub fn operation_for(&self, field: &str) -> MergeOperation {
        if let Some(op) = self.overrides.get(field) {
            return op.clone();
        }
        match field {
            STRAND => MergeOperation::Strand,
            CHR => MergeOperation::First,
            _ => MergeOperation::Generic,
        }
    }

    /// Bind operations to the columns of `schema`.
    pub fn resolve(&self, schema: &Schema) -> Result<ResolvedAggregate> {
        let mut ops = Vec::with_capacity(schema.len());
        for field in schema.fields() {
            let op = self.operation_for(&field.name);
            op.check_kind(&field.name, field.kind)?;
            ops.push((op, field.kind));
        }
        Ok(ResolvedAggregate { ops })
    }
}

/// An [`Aggregate`] bound to column offsets of a specific schema.
#[derive(Debug, Clone)]
pub struct ResolvedAggregate {
    ops: Vec<(MergeOperation, ValueKind)>,
}

impl ResolvedAggregate {
    #[inline]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Merge the values of column `col`.
    #[inline]
    pub fn merge_column(&self, col: usize, values: &[Value]) -> Value {
        let (op, kind) = &self.ops[col];
        op.apply(*kind, values)
    }

    /// Merge two rows column by column.
    pub fn merge_pair(&self, a: &[Value], b: &[Value]) -> Vec<Value> {
        a.iter()
            .zip(b)
            .enumerate()
            .map(|(col, (x, y))| self.merge_column(col, &[x.clone(), y.clone()]))
            .collect()
    }

    /// Merge any number of rows column by column, in the given order.
    pub fn merge_rows(&self, rows: &[&[Value]]) -> Vec<Value> {
        if let [single] = rows {
            return single.to_vec();
        }
        let mut column = Vec::with_capacity(rows.len());
        (0..self.ops.len())
            .map(|col| {
                column.clear();
                column.extend(rows.iter().map(|row| row[col].clone()));
                self.merge_column(col, &column)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Field;

    #[test]
    fn test_generic_merge_by_kind() {
        assert_eq!(
            generic_merge(ValueKind::Int, &[Value::Int(2), Value::Int(3)]),
            Value::Int(5)
        );
        assert_eq!(
            generic_merge(ValueKind::Float, &[Value::Float(0.5), Value::Float(1.5)]),
            Value::Float(2.0)
        );
        assert_eq!(
            generic_merge(ValueKind::Text, &[Value::from("A"), Value::from("B")]),
            Value::from("A|B")
        );
        assert_eq!(
            generic_merge(
                ValueKind::Record,
                &[
                    Value::Record(vec![Value::from("C")]),
                    Value::Record(vec![Value::Int(1)])
                ]
            ),
            Value::Record(vec![Value::from("C"), Value::Int(1)])
        );
    }

    #[test]
    fn test_strand_merge() {
        let op = MergeOperation::Strand;
        assert_eq!(op.apply(ValueKind::Int, &[Value::Int(1), Value::Int(1)]), Value::Int(1));
        assert_eq!(op.apply(ValueKind::Int, &[Value::Int(1), Value::Int(-1)]), Value::Int(0));
        assert_eq!(
            op.apply(ValueKind::Text, &[Value::from("+"), Value::from("-")]),
            Value::from(".")
        );
    }

    #[test]
    fn test_default_operations() {
        let agg = Aggregate::new().with("score", MergeOperation::Max);
        assert!(matches!(agg.operation_for("strand"), MergeOperation::Strand));
        assert!(matches!(agg.operation_for("chr"), MergeOperation::First));
        assert!(matches!(agg.operation_for("name"), MergeOperation::Generic));
        assert!(matches!(agg.operation_for("score"), MergeOperation::Max));
    }

    #[test]
    fn test_resolve_rejects_bad_kind() {
        let schema = Schema::new(vec![Field::text("name")]).unwrap();
        let agg = Aggregate::new().with("name", MergeOperation::Sum);
        assert!(matches!(agg.resolve(&schema), Err(StreamError::Argument(_))));
    }

    #[test]
    fn test_merge_rows() {
        let schema = Schema::new(vec![
            Field::text("chr"),
            Field::text("name"),
            Field::float("score"),
        ])
        .unwrap();
        let resolved = Aggregate::new()
            .with("score", MergeOperation::Mean)
            .resolve(&schema)
            .unwrap();
        let a = vec![Value::from("chr1"), Value::from("A"), Value::Float(1.0)];
        let b = vec![Value::from("chr1"), Value::from("B"), Value::Float(3.0)];
        let merged = resolved.merge_rows(&[a.as_slice(), b.as_slice()]);
        assert_eq!(
            merged,
            vec![Value::from("chr1"), Value::from("A|B"), Value::Float(2.0)]
        );
    }

    #[test]
    fn test_custom_and_distinct() {
        let longest = MergeOperation::custom(|values| {
            values
                .iter()
                .max_by_key(|v| v.to_string().len())
                .cloned()
                .unwrap_or(Value::Text(String::new()))
        });
        assert_eq!(
            longest.apply(ValueKind::Text, &[Value::from("ab"), Value::from("abcd")]),
            Value::from("abcd")
        );
        assert_eq!(
            MergeOperation::Distinct
                .apply(ValueKind::Text, &[Value::from("A|B"), Value::from("B"), Value::from("C")]),
            Value::from("A|B|C")
        );
    }

    #[test]
    fn test_empty_values() {
        assert_eq!(MergeOperation::Generic.apply(ValueKind::Float, &[]), Value::Float(0.0));
        assert_eq!(MergeOperation::Strand.apply(ValueKind::Text, &[]), Value::from("."));
    }
}
