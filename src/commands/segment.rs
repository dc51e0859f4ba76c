//! Split features into equal bins, with optional flanking bins.
//!
//! Each feature body is cut into `nbins` pieces at evenly spaced breakpoints
//! (integer division). Upstream and downstream flanks add their own evenly
//! spaced pieces. Every piece gets a `bin` index counting from the most
//! upstream piece (0); on the reverse strand the flanks swap sides and the
//! numbering runs from the end, so bin 0 is always biologically upstream.
//!
//! # Memory Complexity
//!
//! O(b) where b = pieces generated within the largest flank of the current
//! input position.
//!
//! # Requirements
//!
//! Input MUST be sorted by chromosome, then by start position.
//!
//! Fractional flanks grow with feature length, so output stays sorted only
//! while no later feature has a larger backward flank than those before it.
//! Flanks in bp keep the output sorted for any sorted input.

use crate::error::{Result, StreamError};
use crate::feature::{Feature, Strand};
use crate::schema::Field;
use crate::stream::FeatureStream;
use crate::streaming::buffers::DEFAULT_NBINS;
use crate::streaming::lookahead::{Expand, Generator};
use crate::value::Value;
use log::debug;

/// Name of the column added by segmentation.
pub const BIN: &str = "bin";

/// A flank: its extent and how many bins it is cut into.
///
/// A `distance` of at most 1 is a fraction of the feature length, anything
/// larger is in bp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Flank {
    pub distance: f64,
    pub bins: usize,
}

impl Flank {
    pub fn new(distance: f64, bins: usize) -> Self {
        Self { distance, bins }
    }

    #[inline]
    fn is_relative(&self) -> bool {
        self.distance <= 1.0
    }

    /// Length in bp when it does not depend on the feature.
    fn fixed(flank: Option<Flank>) -> i64 {
        flank
            .filter(|f| !f.is_relative())
            .map_or(0, |f| f.resolve(0))
    }

    /// Flank length in bp for a feature of length `len`.
    #[inline]
    fn resolve(&self, len: i64) -> i64 {
        let bp = if self.is_relative() {
            self.distance * len as f64
        } else {
            self.distance
        };
        (0.5 + bp).floor() as i64
    }

    fn validate(&self, side: &str) -> Result<()> {
        if !self.distance.is_finite() || self.distance < 0.0 {
            return Err(StreamError::argument(format!(
                "{} flank distance must be a non-negative number, got {}",
                side, self.distance
            )));
        }
        if self.bins == 0 && self.distance != 0.0 {
            return Err(StreamError::argument(format!(
                "{} flank of {} needs at least one bin",
                side, self.distance
            )));
        }
        Ok(())
    }
}

/// Segment command configuration.
#[derive(Debug, Clone)]
pub struct SegmentCommand {
    /// Number of bins over the feature body (default: 10)
    pub nbins: usize,
    pub upstream: Option<Flank>,
    pub downstream: Option<Flank>,
}

impl Default for SegmentCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentCommand {
    pub fn new() -> Self {
        Self {
            nbins: DEFAULT_NBINS,
            upstream: None,
            downstream: None,
        }
    }

    /// Set the number of body bins.
    pub fn with_nbins(mut self, nbins: usize) -> Self {
        self.nbins = nbins;
        self
    }

    /// Add an upstream flank.
    pub fn with_upstream(mut self, distance: f64, bins: usize) -> Self {
        self.upstream = Some(Flank::new(distance, bins));
        self
    }

    /// Add a downstream flank.
    pub fn with_downstream(mut self, distance: f64, bins: usize) -> Self {
        self.downstream = Some(Flank::new(distance, bins));
        self
    }

    /// Segment one sorted stream. The output gains an int `bin` column.
    pub fn run(&self, input: FeatureStream) -> Result<FeatureStream> {
        if self.nbins == 0 {
            return Err(StreamError::argument("nbins must be at least 1"));
        }
        if let Some(flank) = &self.upstream {
            flank.validate("upstream")?;
        }
        if let Some(flank) = &self.downstream {
            flank.validate("downstream")?;
        }

        let input_schema = input.schema().clone();
        let schema = input_schema.with_field(Field::int(BIN))?;
        debug!(
            "segment: nbins={}, upstream={:?}, downstream={:?}",
            self.nbins, self.upstream, self.downstream
        );

        let upstream = self.upstream.filter(|f| f.bins > 0);
        let downstream = self.downstream.filter(|f| f.bins > 0);
        let strand_idx = input_schema.strand_index();
        // the downstream flank lies before the start on the reverse strand
        let reach = match strand_idx {
            Some(_) => Flank::fixed(upstream).max(Flank::fixed(downstream)),
            None => Flank::fixed(upstream),
        };
        let generator = Segments {
            nbins: self.nbins as i64,
            upstream,
            downstream,
            strand_idx,
            reach,
            steps: Vec::new(),
        };
        Ok(FeatureStream::from_operator(schema, Expand::new(input, generator)))
    }

    /// Segment each of several streams.
    pub fn run_all(&self, inputs: Vec<FeatureStream>) -> Result<Vec<FeatureStream>> {
        inputs.into_iter().map(|input| self.run(input)).collect()
    }
}

struct Segments {
    nbins: i64,
    upstream: Option<Flank>,
    downstream: Option<Flank>,
    strand_idx: Option<usize>,
    /// Largest backward flank: bp flanks up front, fractional ones as seen
    reach: i64,
    steps: Vec<i64>,
}

fn resolved(flank: Option<Flank>, len: i64) -> (i64, i64) {
    flank.map_or((0, 0), |f| (f.resolve(len), f.bins as i64))
}

impl Generator for Segments {
    fn generate(&mut self, feature: &Feature, out: &mut Vec<Feature>) {
        let (start, end) = (feature.start, feature.end);
        let len = end - start;
        let reverse = self
            .strand_idx
            .is_some_and(|i| Strand::from_value(&feature.values[i]).is_reverse());
        let (up, up_bins) = resolved(self.upstream, len);
        let (down, down_bins) = resolved(self.downstream, len);
        let ((before, before_bins), (after, after_bins)) = if reverse {
            ((down, down_bins), (up, up_bins))
        } else {
            ((up, up_bins), (down, down_bins))
        };
        self.reach = self.reach.max(before);

        self.steps.clear();
        self.steps
            .extend((1..=before_bins).rev().map(|k| start - before * k / before_bins));
        self.steps
            .extend((0..=self.nbins).map(|k| start + len * k / self.nbins));
        self.steps
            .extend((1..=after_bins).map(|k| end + after * k / after_bins));

        let last = self.steps.len() as i64 - 2;
        for (n, w) in self.steps.windows(2).enumerate() {
            if w[1] <= w[0] {
                continue;
            }
            let bin = if reverse { last - n as i64 } else { n as i64 };
            let mut values = feature.values.clone();
            values.push(Value::Int(bin));
            out.push(Feature::new(w[0], w[1], values));
        }
    }

    fn reach(&self) -> i64 {
        self.reach
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;

    fn scored(rows: &[(i64, i64, f64)]) -> FeatureStream {
        let schema = Schema::new(vec![Field::float("score")]).unwrap();
        let features = rows
            .iter()
            .map(|&(s, e, v)| Feature::new(s, e, vec![Value::Float(v)]))
            .collect();
        FeatureStream::from_features(schema, features)
    }

    fn bins(stream: FeatureStream) -> Vec<(i64, i64, i64)> {
        stream
            .collect_features()
            .unwrap()
            .iter()
            .map(|f| (f.start, f.end, f.values.last().and_then(Value::as_int).unwrap()))
            .collect()
    }

    #[test]
    fn test_segment_with_flanks() {
        let out = SegmentCommand::new()
            .with_nbins(3)
            .with_upstream(2.0, 1)
            .with_downstream(3.0, 1)
            .run(scored(&[(10, 16, 0.5), (24, 36, 1.2)]))
            .unwrap();
        assert_eq!(out.field_names(), vec!["start", "end", "score", "bin"]);
        let rows = out.collect_features().unwrap();
        let expected: Vec<Feature> = [
            (8, 10, 0.5, 0),
            (10, 12, 0.5, 1),
            (12, 14, 0.5, 2),
            (14, 16, 0.5, 3),
            (16, 19, 0.5, 4),
            (22, 24, 1.2, 0),
            (24, 28, 1.2, 1),
            (28, 32, 1.2, 2),
            (32, 36, 1.2, 3),
            (36, 39, 1.2, 4),
        ]
        .iter()
        .map(|&(s, e, v, b)| Feature::new(s, e, vec![Value::Float(v), Value::Int(b)]))
        .collect();
        assert_eq!(rows, expected);
    }

    #[test]
    fn test_segment_reverse_strand() {
        let schema = Schema::new(vec![Field::int("strand")]).unwrap();
        let input = FeatureStream::from_features(
            schema,
            vec![
                Feature::new(10, 16, vec![Value::Int(-1)]),
                Feature::new(24, 36, vec![Value::Int(1)]),
            ],
        );
        let out = SegmentCommand::new()
            .with_nbins(2)
            .with_upstream(2.0, 1)
            .with_downstream(3.0, 1)
            .run(input)
            .unwrap();
        assert_eq!(
            bins(out),
            vec![
                (7, 10, 3),
                (10, 13, 2),
                (13, 16, 1),
                (16, 18, 0),
                (22, 24, 0),
                (24, 30, 1),
                (30, 36, 2),
                (36, 39, 3),
            ]
        );
    }

    #[test]
    fn test_segment_reverse_downstream_flank_stays_sorted() {
        let schema = Schema::new(vec![Field::int("strand")]).unwrap();
        let input = FeatureStream::from_features(
            schema,
            vec![
                Feature::new(0, 10, vec![Value::Int(1)]),
                Feature::new(15, 16, vec![Value::Int(1)]),
                Feature::new(20, 25, vec![Value::Int(-1)]),
            ],
        );
        let out = SegmentCommand::new()
            .with_nbins(1)
            .with_upstream(2.0, 1)
            .with_downstream(30.0, 1)
            .run(input)
            .unwrap();
        assert_eq!(
            bins(out),
            vec![
                (-10, 20, 2),
                (-2, 0, 0),
                (0, 10, 1),
                (10, 40, 2),
                (13, 15, 0),
                (15, 16, 1),
                (16, 46, 2),
                (20, 25, 1),
                (25, 27, 0),
            ]
        );
    }

    #[test]
    fn test_segment_fractional_flanks() {
        let out = SegmentCommand::new()
            .with_nbins(2)
            .with_upstream(0.5, 2)
            .run(scored(&[(100, 120, 1.0)]))
            .unwrap();
        assert_eq!(
            bins(out),
            vec![(90, 95, 0), (95, 100, 1), (100, 110, 2), (110, 120, 3)]
        );
    }

    #[test]
    fn test_segment_skips_empty_pieces() {
        let out = SegmentCommand::new()
            .with_nbins(4)
            .run(scored(&[(10, 12, 1.0)]))
            .unwrap();
        assert_eq!(bins(out), vec![(10, 11, 1), (11, 12, 3)]);
    }

    #[test]
    fn test_segment_sorted_when_flanks_overtake() {
        let out = SegmentCommand::new()
            .with_nbins(1)
            .with_upstream(10.0, 1)
            .run(scored(&[(10, 20, 1.0), (15, 18, 2.0)]))
            .unwrap();
        assert_eq!(
            bins(out),
            vec![(0, 10, 0), (5, 15, 0), (10, 20, 1), (15, 18, 1)]
        );
    }

    #[test]
    fn test_segment_argument_errors() {
        let err = SegmentCommand::new().with_nbins(0).run(scored(&[])).unwrap_err();
        assert!(matches!(err, StreamError::Argument(_)));

        let err = SegmentCommand::new()
            .with_upstream(5.0, 0)
            .run(scored(&[]))
            .unwrap_err();
        assert!(matches!(err, StreamError::Argument(_)));

        let schema = Schema::new(vec![Field::int("bin")]).unwrap();
        let err = SegmentCommand::new()
            .run(FeatureStream::empty(schema))
            .unwrap_err();
        assert!(matches!(err, StreamError::Schema { .. }));
    }
}
