//! Fusion: merge overlapping features into maximal disjoint spans.
//!
//! # Algorithm
//!
//! For sorted input:
//! 1. Keep a running accumulator feature
//! 2. If the next feature starts before the accumulator ends (same `chr`),
//!    extend the accumulator and merge every metadata column pairwise
//! 3. Otherwise emit the accumulator and start a new one
//!
//! In touching mode, features that abut the accumulator exactly are also
//! joined, but only when their metadata are identical.
//!
//! # Memory Complexity
//!
//! O(1) - only the accumulator is held.
//!
//! # Requirements
//!
//! Input MUST be sorted by chromosome, then by start position.

use crate::aggregate::{Aggregate, ResolvedAggregate};
use crate::error::Result;
use crate::feature::Feature;
use crate::stream::{FeatureStream, Operator};
use log::{debug, trace};

/// Fusion command configuration.
#[derive(Debug, Clone, Default)]
pub struct FusionCommand {
    /// Per-field merge operations
    pub aggregate: Aggregate,
    /// Also join abutting features with identical metadata
    pub touching: bool,
}

impl FusionCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-field merge operations.
    pub fn with_aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregate = aggregate;
        self
    }

    /// Join abutting features whose metadata are identical.
    pub fn with_touching(mut self, touching: bool) -> Self {
        self.touching = touching;
        self
    }

    /// Fuse a sorted stream.
    pub fn run(&self, input: FeatureStream) -> Result<FeatureStream> {
        let schema = input.schema().clone();
        let merge = self.aggregate.resolve(&schema)?;
        debug!(
            "fusion: {} fields, touching={}",
            schema.len(),
            self.touching
        );
        let op = Fusion {
            chr_idx: schema.chr_index(),
            input,
            merge,
            touching: self.touching,
            acc: None,
            input_done: false,
        };
        Ok(FeatureStream::from_operator(schema, op))
    }
}

struct Fusion {
    input: FeatureStream,
    merge: ResolvedAggregate,
    chr_idx: Option<usize>,
    touching: bool,
    acc: Option<Feature>,
    input_done: bool,
}

impl Fusion {
    fn same_chrom(&self, a: &Feature, b: &Feature) -> bool {
        match self.chr_idx {
            Some(i) => a.values[i] == b.values[i],
            None => true,
        }
    }
}

impl Operator for Fusion {
    fn step(&mut self) -> Result<Option<Feature>> {
        while !self.input_done {
            let Some(item) = self.input.next() else {
                self.input_done = true;
                break;
            };
            let next = item?;
            if next.is_empty() {
                trace!("fusion: skipping empty feature [{}, {})", next.start, next.end);
                continue;
            }
            let Some(mut acc) = self.acc.take() else {
                self.acc = Some(next);
                continue;
            };
            if !self.same_chrom(&acc, &next) {
                self.acc = Some(next);
                return Ok(Some(acc));
            }
            if next.start < acc.end {
                acc.end = acc.end.max(next.end);
                acc.values = self.merge.merge_pair(&acc.values, &next.values);
                self.acc = Some(acc);
            } else if self.touching && next.start == acc.end && next.values == acc.values {
                acc.end = next.end;
                self.acc = Some(acc);
            } else {
                self.acc = Some(next);
                return Ok(Some(acc));
            }
        }
        Ok(self.acc.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, Schema};
    use crate::value::Value;

    fn named(rows: &[(i64, i64, &str, i64)]) -> FeatureStream {
        let schema = Schema::new(vec![Field::text("name"), Field::int("strand")]).unwrap();
        let features = rows
            .iter()
            .map(|&(s, e, n, st)| Feature::new(s, e, vec![Value::from(n), Value::Int(st)]))
            .collect();
        FeatureStream::from_features(schema, features)
    }

    fn rows(stream: FeatureStream) -> Vec<(i64, i64, String, i64)> {
        stream
            .collect_features()
            .unwrap()
            .into_iter()
            .map(|f| {
                (
                    f.start,
                    f.end,
                    f.values[0].to_string(),
                    f.values[1].as_int().unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_fusion_basic() {
        let input = named(&[(10, 15, "A", 1), (13, 18, "B", -1), (18, 25, "C", -1)]);
        let out = FusionCommand::new().run(input).unwrap();
        assert_eq!(
            rows(out),
            vec![(10, 18, "A|B".to_string(), 0), (18, 25, "C".to_string(), -1)]
        );
    }

    #[test]
    fn test_fusion_nested() {
        let input = named(&[(0, 100, "A", 1), (10, 20, "B", 1), (50, 60, "C", 1)]);
        let out = FusionCommand::new().run(input).unwrap();
        assert_eq!(rows(out), vec![(0, 100, "A|B|C".to_string(), 1)]);
    }

    #[test]
    fn test_fusion_touching_identical() {
        let input = named(&[(0, 5, "A", 1), (5, 9, "A", 1), (9, 12, "B", 1)]);
        let plain = FusionCommand::new().run(named(&[(0, 5, "A", 1), (5, 9, "A", 1)])).unwrap();
        assert_eq!(plain.count(), 2);

        let out = FusionCommand::new().with_touching(true).run(input).unwrap();
        assert_eq!(
            rows(out),
            vec![(0, 9, "A".to_string(), 1), (9, 12, "B".to_string(), 1)]
        );
    }

    #[test]
    fn test_fusion_respects_chromosomes() {
        let schema = Schema::new(vec![Field::text("chr")]).unwrap();
        let features = vec![
            Feature::new(0, 10, vec![Value::from("chr1")]),
            Feature::new(5, 15, vec![Value::from("chr2")]),
            Feature::new(8, 20, vec![Value::from("chr2")]),
        ];
        let out = FusionCommand::new()
            .run(FeatureStream::from_features(schema, features))
            .unwrap()
            .collect_features()
            .unwrap();
        assert_eq!(
            out,
            vec![
                Feature::new(0, 10, vec![Value::from("chr1")]),
                Feature::new(5, 20, vec![Value::from("chr2")]),
            ]
        );
    }

    #[test]
    fn test_fusion_empty_input() {
        let out = FusionCommand::new().run(named(&[])).unwrap();
        assert_eq!(out.count(), 0);
    }
}
