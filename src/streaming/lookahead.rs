//! Sorted release buffer for operators whose output can overtake their input.
//!
//! Flank and segment generation may produce features that start before
//! features generated earlier. Generated features are parked here and only
//! released, smallest `(start, end)` first, once no later input can produce
//! anything that sorts before them.

use crate::error::Result;
use crate::feature::Feature;
use crate::stream::{FeatureStream, Operator};
use crate::streaming::buffers::{DEFAULT_LOOKAHEAD_CAPACITY, LOOKAHEAD_WARNING_THRESHOLD};
use crate::value::Value;
use log::{trace, warn};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

/// Wrapper for min-heap (BinaryHeap is max-heap by default).
#[derive(Debug)]
struct Pending {
    start: i64,
    end: i64,
    seq: u64,
    feature: Feature,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap; ties keep insertion order
        other
            .start
            .cmp(&self.start)
            .then(other.end.cmp(&self.end))
            .then(other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-ordered buffer of generated features.
#[derive(Debug)]
pub struct LookaheadBuffer {
    heap: BinaryHeap<Pending>,
    seq: u64,
    max_len: usize,
    warned: bool,
}

impl Default for LookaheadBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LookaheadBuffer {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::with_capacity(DEFAULT_LOOKAHEAD_CAPACITY),
            seq: 0,
            max_len: 0,
            warned: false,
        }
    }

    /// Park a generated feature.
    pub fn push(&mut self, feature: Feature) {
        self.heap.push(Pending {
            start: feature.start,
            end: feature.end,
            seq: self.seq,
            feature,
        });
        self.seq += 1;
        self.max_len = self.max_len.max(self.heap.len());
        if !self.warned && self.heap.len() > LOOKAHEAD_WARNING_THRESHOLD {
            self.warned = true;
            warn!(
                "lookahead buffer holds {} features; flanks may be very long or the input unsorted",
                self.heap.len()
            );
        }
    }

    /// Release the smallest feature if it starts strictly before `bound`.
    #[inline]
    pub fn pop_before(&mut self, bound: i64) -> Option<Feature> {
        if self.heap.peek().is_some_and(|p| p.start < bound) {
            self.heap.pop().map(|p| p.feature)
        } else {
            None
        }
    }

    /// Release the smallest feature unconditionally.
    #[inline]
    pub fn pop(&mut self) -> Option<Feature> {
        self.heap.pop().map(|p| p.feature)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Largest number of features held at once.
    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

/// Per-feature generator driven by [`Expand`].
pub(crate) trait Generator: Send + 'static {
    /// Produce the features derived from `feature`.
    fn generate(&mut self, feature: &Feature, out: &mut Vec<Feature>);

    /// How far before its source start a generated feature may begin.
    ///
    /// Read after each call to [`generate`](Self::generate).
    fn reach(&self) -> i64;
}

/// Runs a [`Generator`] over a sorted stream and releases its output sorted.
///
/// Generated features are parked in a [`LookaheadBuffer`] until the next
/// input start, minus the generator's reach, has passed them. The buffer is
/// flushed whenever the chromosome changes and at the end of the input.
pub(crate) struct Expand<G> {
    input: FeatureStream,
    generator: G,
    chr_idx: Option<usize>,
    chrom: Option<Value>,
    buffer: LookaheadBuffer,
    ready: VecDeque<Feature>,
    scratch: Vec<Feature>,
    input_done: bool,
}

impl<G: Generator> Expand<G> {
    pub(crate) fn new(input: FeatureStream, generator: G) -> Self {
        let chr_idx = input.schema().chr_index();
        Self {
            input,
            generator,
            chr_idx,
            chrom: None,
            buffer: LookaheadBuffer::new(),
            ready: VecDeque::new(),
            scratch: Vec::new(),
            input_done: false,
        }
    }

    fn flush(&mut self) {
        while let Some(f) = self.buffer.pop() {
            self.ready.push_back(f);
        }
    }

    fn accept(&mut self, next: Feature) {
        if let Some(idx) = self.chr_idx {
            if self.chrom.as_ref() != Some(&next.values[idx]) {
                if !self.buffer.is_empty() {
                    trace!("lookahead: flushing {} features at chromosome change", self.buffer.len());
                }
                self.flush();
                self.chrom = Some(next.values[idx].clone());
            }
        }

        self.generator.generate(&next, &mut self.scratch);
        for f in self.scratch.drain(..) {
            self.buffer.push(f);
        }

        let bound = next.start.saturating_sub(self.generator.reach());
        while let Some(f) = self.buffer.pop_before(bound) {
            self.ready.push_back(f);
        }
    }
}

impl<G: Generator> Operator for Expand<G> {
    fn step(&mut self) -> Result<Option<Feature>> {
        loop {
            if let Some(f) = self.ready.pop_front() {
                return Ok(Some(f));
            }
            if self.input_done {
                return Ok(self.buffer.pop());
            }
            match self.input.next() {
                Some(item) => self.accept(item?),
                None => self.input_done = true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_releases_in_sorted_order() {
        let mut buf = LookaheadBuffer::new();
        buf.push(Feature::span(20, 30));
        buf.push(Feature::span(5, 9));
        buf.push(Feature::span(5, 7));

        assert_eq!(buf.pop_before(5), None);
        assert_eq!(buf.pop_before(10), Some(Feature::span(5, 7)));
        assert_eq!(buf.pop_before(10), Some(Feature::span(5, 9)));
        assert_eq!(buf.pop_before(10), None);
        assert_eq!(buf.pop(), Some(Feature::span(20, 30)));
        assert!(buf.is_empty());
        assert_eq!(buf.max_len(), 3);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut buf = LookaheadBuffer::new();
        buf.push(Feature::new(1, 2, vec![Value::from("first")]));
        buf.push(Feature::new(1, 2, vec![Value::from("second")]));
        assert_eq!(buf.pop().unwrap().values[0], Value::from("first"));
        assert_eq!(buf.pop().unwrap().values[0], Value::from("second"));
    }
}
