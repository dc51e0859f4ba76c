//! Cobble: elementary decomposition of overlapping features.
//!
//! Every start and end present in the input becomes a breakpoint. Each
//! elementary piece between consecutive breakpoints that is covered by at
//! least one feature is emitted once, carrying the merged metadata of all
//! features covering it (in input order).
//!
//! # Algorithm
//!
//! Features covering the current position are kept in arrival order. When a
//! new feature arrives at `s`, every piece ending at or before `s` is closed
//! and emitted, then the piece `[pos, s)` if anything is still open, and the
//! new feature joins the open set.
//!
//! # Memory Complexity
//!
//! O(k) where k = max number of features overlapping one position.
//!
//! # Requirements
//!
//! Input MUST be sorted by chromosome, then by start position.

use crate::aggregate::{Aggregate, ResolvedAggregate};
use crate::error::Result;
use crate::feature::Feature;
use crate::stream::{FeatureStream, Operator};
use crate::value::Value;
use log::trace;
use std::collections::VecDeque;

/// Cobble command configuration.
#[derive(Debug, Clone, Default)]
pub struct CobbleCommand {
    /// Per-field merge operations
    pub aggregate: Aggregate,
}

impl CobbleCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-field merge operations.
    pub fn with_aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregate = aggregate;
        self
    }

    /// Decompose a sorted stream into elementary pieces.
    pub fn run(&self, input: FeatureStream) -> Result<FeatureStream> {
        let schema = input.schema().clone();
        let merge = self.aggregate.resolve(&schema)?;
        let op = Cobble {
            chr_idx: schema.chr_index(),
            input,
            merge,
            open: Vec::new(),
            pos: 0,
            ready: VecDeque::new(),
            input_done: false,
        };
        Ok(FeatureStream::from_operator(schema, op))
    }
}

struct Cobble {
    input: FeatureStream,
    merge: ResolvedAggregate,
    chr_idx: Option<usize>,
    /// Features covering `pos`, in arrival order
    open: Vec<Feature>,
    /// Left boundary of the next piece
    pos: i64,
    ready: VecDeque<Feature>,
    input_done: bool,
}

impl Cobble {
    fn piece(&self, start: i64, end: i64) -> Feature {
        let rows: Vec<&[Value]> = self.open.iter().map(|f| f.values.as_slice()).collect();
        Feature::new(start, end, self.merge.merge_rows(&rows))
    }

    /// Emit and drop every piece ending at or before `bound`.
    fn close_until(&mut self, bound: i64) {
        while let Some(end) = self.open.iter().map(|f| f.end).min() {
            if end > bound {
                break;
            }
            if self.pos < end {
                let piece = self.piece(self.pos, end);
                self.ready.push_back(piece);
                self.pos = end;
            }
            self.open.retain(|f| f.end != end);
        }
    }

    fn accept(&mut self, next: Feature) {
        let new_chrom = match (self.chr_idx, self.open.first()) {
            (Some(i), Some(open)) => open.values[i] != next.values[i],
            _ => false,
        };
        if new_chrom {
            self.close_until(i64::MAX);
        }
        self.close_until(next.start);
        if !self.open.is_empty() && self.pos < next.start {
            let piece = self.piece(self.pos, next.start);
            self.ready.push_back(piece);
        }
        self.pos = next.start;
        self.open.push(next);
    }
}

impl Operator for Cobble {
    fn step(&mut self) -> Result<Option<Feature>> {
        loop {
            if let Some(piece) = self.ready.pop_front() {
                return Ok(Some(piece));
            }
            if self.input_done {
                return Ok(None);
            }
            match self.input.next() {
                Some(item) => {
                    let next = item?;
                    if next.is_empty() {
                        trace!("cobble: skipping empty feature [{}, {})", next.start, next.end);
                        continue;
                    }
                    self.accept(next);
                }
                None => {
                    self.input_done = true;
                    self.close_until(i64::MAX);
                }
            }
        }
    }
}
