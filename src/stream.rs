//! The feature stream abstraction shared by every operator.
//!
//! A [`FeatureStream`] is a lazy, single-pass sequence of features together
//! with the schema of their metadata columns. Every operator consumes one or
//! more streams and produces a new one, so pipelines are built by chaining
//! calls. Nothing is pulled until the caller iterates.
//!
//! # Requirements
//!
//! Operators that merge or sweep (concatenate, fusion, cobble, combine,
//! neighborhood, segment, overlap) expect their inputs sorted by
//! `(chr, start, end)`. This is not checked unless the stream is wrapped with
//! [`FeatureStream::verify_sorted`].

use crate::error::{Result, StreamError};
use crate::feature::Feature;
use crate::genome::ChromOrder;
use crate::schema::Schema;
use crate::streaming::validation::SortValidator;
use crate::value::Value;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

type BoxedFeatures = Box<dyn Iterator<Item = Result<Feature>> + Send>;

/// An ordered, lazy, single-pass sequence of features with their schema.
pub struct FeatureStream {
    schema: Arc<Schema>,
    inner: BoxedFeatures,
}

impl fmt::Debug for FeatureStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureStream")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl FeatureStream {
    /// Wrap any iterator of feature results.
    pub fn new<I>(schema: impl Into<Arc<Schema>>, features: I) -> Self
    where
        I: IntoIterator<Item = Result<Feature>>,
        I::IntoIter: Send + 'static,
    {
        Self {
            schema: schema.into(),
            inner: Box::new(features.into_iter()),
        }
    }

    /// Stream over already materialised features.
    pub fn from_features(schema: impl Into<Arc<Schema>>, features: Vec<Feature>) -> Self {
        Self::new(schema, features.into_iter().map(Ok))
    }

    /// A stream that yields nothing.
    pub fn empty(schema: impl Into<Arc<Schema>>) -> Self {
        Self::from_features(schema, Vec::new())
    }

    pub(crate) fn from_operator<O: Operator>(schema: impl Into<Arc<Schema>>, op: O) -> Self {
        Self::new(schema, OperatorIter { op, done: false })
    }

    /// The schema of the metadata columns.
    #[inline]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Field names of the stream, coordinates first.
    pub fn field_names(&self) -> Vec<String> {
        let mut names = vec!["start".to_string(), "end".to_string()];
        names.extend(self.schema.names().map(str::to_string));
        names
    }

    /// Move `fields` to the front, keeping the remaining columns in order.
    ///
    /// Coordinate names are accepted and ignored. The stream is returned
    /// untouched when the columns already come in the requested order.
    pub fn reorder(self, fields: &[&str]) -> Result<Self> {
        match self.schema.reorder_plan(fields)? {
            None => Ok(self),
            Some((schema, columns)) => Ok(self.remap(schema, columns)),
        }
    }

    /// Keep exactly `fields`, in that order.
    pub fn select(self, fields: &[&str]) -> Result<Self> {
        let (schema, columns) = self.schema.project(fields)?;
        let identity = columns.len() == self.schema.len()
            && columns.iter().enumerate().all(|(pos, &idx)| pos == idx);
        if identity {
            return Ok(self);
        }
        Ok(self.remap(schema, columns))
    }

    fn remap(self, schema: Schema, columns: Vec<usize>) -> Self {
        let features = self.inner.map(move |item| {
            item.map(|f| Feature {
                start: f.start,
                end: f.end,
                values: columns.iter().map(|&c| f.values[c].clone()).collect(),
            })
        });
        Self::new(schema, features)
    }

    /// Check ordering as features flow past.
    ///
    /// The wrapped stream yields an `OrderingViolation` error at the first
    /// feature that breaks `(chr, start, end)` order under `order`, then ends.
    pub fn verify_sorted(self, order: ChromOrder) -> Self {
        let chr_idx = self.schema.chr_index();
        let mut validator = SortValidator::with_order(order);
        let mut failed = false;
        let features = self.inner.map_while(move |item| {
            if failed {
                return None;
            }
            let checked = item.and_then(|f| {
                let chrom = chr_idx.and_then(|i| f.chrom_at(i));
                validator.validate(chrom, f.start, f.end)?;
                Ok(f)
            });
            failed = checked.is_err();
            Some(checked)
        });
        Self::new(self.schema, features)
    }

    /// Drain the stream into a vector, stopping at the first error.
    pub fn collect_features(self) -> Result<Vec<Feature>> {
        self.collect()
    }
}

impl Iterator for FeatureStream {
    type Item = Result<Feature>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// A pull-based operator: produces its next feature on demand.
pub(crate) trait Operator: Send + 'static {
    fn step(&mut self) -> Result<Option<Feature>>;
}

/// Adapts an [`Operator`] into an iterator that ends after the first error.
struct OperatorIter<O> {
    op: O,
    done: bool,
}

impl<O: Operator> Iterator for OperatorIter<O> {
    type Item = Result<Feature>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.op.step() {
            Ok(Some(feature)) => Some(Ok(feature)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Compare two features by `(chr, start, end)`.
#[inline]
pub fn compare_position(
    a: &Feature,
    b: &Feature,
    chr_idx: Option<usize>,
    order: &ChromOrder,
) -> Ordering {
    let chrom = match chr_idx {
        Some(i) => match (a.chrom_at(i), b.chrom_at(i)) {
            (Some(x), Some(y)) => order.compare(x, y),
            _ => Ordering::Equal,
        },
        None => Ordering::Equal,
    };
    chrom
        .then(a.start.cmp(&b.start))
        .then(a.end.cmp(&b.end))
}

/// Load a whole stream and sort it by `(chr, start, end)`.
///
/// This materialises the input and is only meant for small, bounded streams.
/// The sort is stable, so equal keys keep their input order.
pub fn sorted_stream(stream: FeatureStream, order: &ChromOrder) -> Result<FeatureStream> {
    let schema = stream.schema().clone();
    let chr_idx = schema.chr_index();
    let mut features = stream.collect_features()?;
    features.sort_by(|a, b| compare_position(a, b, chr_idx, order));
    Ok(FeatureStream::from_features(schema, features))
}

/// Expand a stream into one row per base over `[start, end)`.
///
/// Row `[pos, pos + 1)` carries `fields` of the feature covering `pos`, or
/// the zero value of each field where nothing does, so exactly
/// `end - start` rows come out. Where features overlap, a later feature only
/// takes over once the earlier one has ended.
///
/// The input is expected to hold a single chromosome, sorted by start.
pub fn unroll(
    stream: FeatureStream,
    start: i64,
    end: i64,
    fields: &[&str],
) -> Result<FeatureStream> {
    if end < start {
        return Err(StreamError::argument(format!(
            "unroll range [{}, {}) is reversed",
            start, end
        )));
    }
    let stream = stream.select(fields)?;
    let schema = stream.schema().clone();
    let zeros = schema.fields().iter().map(|f| f.kind.zero()).collect();
    let op = Unroll {
        input: stream,
        pos: start,
        end,
        current: None,
        zeros,
        input_done: false,
    };
    Ok(FeatureStream::from_operator(schema, op))
}

struct Unroll {
    input: FeatureStream,
    pos: i64,
    end: i64,
    /// Feature covering or following `pos`
    current: Option<Feature>,
    zeros: Vec<Value>,
    input_done: bool,
}

impl Operator for Unroll {
    fn step(&mut self) -> Result<Option<Feature>> {
        while self.pos < self.end {
            if self.current.as_ref().map_or(true, |f| f.end <= self.pos) {
                self.current = None;
                if !self.input_done {
                    match self.input.next() {
                        Some(item) => {
                            self.current = Some(item?);
                            continue;
                        }
                        None => self.input_done = true,
                    }
                }
            }
            let pos = self.pos;
            self.pos += 1;
            let values = match &self.current {
                Some(f) if f.start <= pos => f.values.clone(),
                _ => self.zeros.clone(),
            };
            return Ok(Some(Feature::new(pos, pos + 1, values)));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StreamError;
    use crate::schema::Field;
    use crate::value::Value;

    fn scored(rows: &[(i64, i64, f64)]) -> FeatureStream {
        let schema = Schema::new(vec![Field::float("score")]).unwrap();
        let features = rows
            .iter()
            .map(|&(s, e, v)| Feature::new(s, e, vec![Value::Float(v)]))
            .collect();
        FeatureStream::from_features(schema, features)
    }

    #[test]
    fn test_reorder_moves_fields() {
        let schema = Schema::new(vec![Field::text("chr"), Field::float("score"), Field::text("name")])
            .unwrap();
        let stream = FeatureStream::from_features(
            schema,
            vec![Feature::new(
                10,
                12,
                vec![Value::from("chr1"), Value::Float(0.5), Value::from("a")],
            )],
        );
        let reordered = stream.reorder(&["end", "name", "score"]).unwrap();
        assert_eq!(
            reordered.field_names(),
            vec!["start", "end", "name", "score", "chr"]
        );
        let rows = reordered.collect_features().unwrap();
        assert_eq!(
            rows[0].values,
            vec![Value::from("a"), Value::Float(0.5), Value::from("chr1")]
        );
    }

    #[test]
    fn test_reorder_missing_field_is_eager() {
        let err = scored(&[(10, 12, 0.5)]).reorder(&["name"]).unwrap_err();
        assert!(matches!(err, StreamError::Schema { .. }));
    }

    #[test]
    fn test_select() {
        let schema = Schema::new(vec![Field::float("score"), Field::text("name")]).unwrap();
        let stream = FeatureStream::from_features(
            schema,
            vec![Feature::new(10, 12, vec![Value::Float(0.5), Value::from("a")])],
        );
        let rows = stream.select(&["name"]).unwrap().collect_features().unwrap();
        assert_eq!(rows[0].values, vec![Value::from("a")]);
    }

    #[test]
    fn test_verify_sorted_passes_sorted_input() {
        let rows = scored(&[(10, 12, 0.5), (14, 15, 1.2), (14, 20, 0.1)])
            .verify_sorted(ChromOrder::lexicographic())
            .collect_features()
            .unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_verify_sorted_reports_regression() {
        let results: Vec<_> = scored(&[(10, 12, 0.5), (8, 9, 1.2), (20, 30, 0.1)])
            .verify_sorted(ChromOrder::lexicographic())
            .collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(StreamError::OrderingViolation { position: 2, .. })
        ));
    }

    #[test]
    fn test_sorted_stream() {
        let schema = Schema::new(vec![Field::text("chr")]).unwrap();
        let features = vec![
            Feature::new(0, 1, vec![Value::from("chrX")]),
            Feature::new(3, 9, vec![Value::from("chrIX")]),
            Feature::new(3, 5, vec![Value::from("chrIX")]),
            Feature::new(2, 10, vec![Value::from("chrIX")]),
        ];
        let stream = FeatureStream::from_features(schema, features);
        let order = ChromOrder::from_names(["chrIX", "chrX"]);
        let sorted = sorted_stream(stream, &order).unwrap().collect_features().unwrap();
        let coords: Vec<(i64, i64)> = sorted.iter().map(|f| (f.start, f.end)).collect();
        assert_eq!(coords, vec![(2, 10), (3, 5), (3, 9), (0, 1)]);
    }

    fn unrolled(stream: FeatureStream, start: i64, end: i64) -> Vec<(i64, f64)> {
        unroll(stream, start, end, &["score"])
            .unwrap()
            .collect_features()
            .unwrap()
            .iter()
            .map(|f| (f.start, f.values[0].as_f64().unwrap()))
            .collect()
    }

    #[test]
    fn test_unroll_fills_gaps_with_zero() {
        let out = unrolled(scored(&[(10, 12, 0.5), (14, 15, 1.2)]), 9, 16);
        assert_eq!(
            out,
            vec![
                (9, 0.0),
                (10, 0.5),
                (11, 0.5),
                (12, 0.0),
                (13, 0.0),
                (14, 1.2),
                (15, 0.0),
            ]
        );
    }

    #[test]
    fn test_unroll_clips_to_range() {
        let out = unrolled(scored(&[(0, 5, 1.0), (8, 30, 2.0), (40, 50, 3.0)]), 3, 10);
        let values: Vec<f64> = out.iter().map(|&(_, v)| v).collect();
        assert_eq!(values, vec![1.0, 1.0, 0.0, 0.0, 0.0, 2.0, 2.0]);

        let out = unrolled(scored(&[(0, 5, 1.0), (3, 8, 2.0)]), 0, 9);
        let values: Vec<f64> = out.iter().map(|&(_, v)| v).collect();
        assert_eq!(values, vec![1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 0.0]);

        assert!(unrolled(scored(&[(0, 5, 1.0)]), 4, 4).is_empty());
    }

    #[test]
    fn test_unroll_projects_fields() {
        let schema = Schema::new(vec![Field::text("name"), Field::float("score")]).unwrap();
        let stream = FeatureStream::from_features(
            schema,
            vec![Feature::new(1, 2, vec![Value::from("a"), Value::Float(0.5)])],
        );
        let out = unroll(stream, 0, 3, &["name"]).unwrap();
        assert_eq!(out.field_names(), vec!["start", "end", "name"]);
        let names: Vec<String> = out
            .collect_features()
            .unwrap()
            .iter()
            .map(|f| f.values[0].to_string())
            .collect();
        assert_eq!(names, vec!["", "a", ""]);
    }

    #[test]
    fn test_unroll_errors() {
        let err = unroll(scored(&[]), 5, 2, &["score"]).unwrap_err();
        assert!(matches!(err, StreamError::Argument(_)));
        let err = unroll(scored(&[]), 0, 2, &["name"]).unwrap_err();
        assert!(matches!(err, StreamError::Schema { .. }));
    }
}
