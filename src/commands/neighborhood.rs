//! Flank window generation around each feature.
//!
//! Which offsets are given selects the windows produced for a feature
//! `[start, end)`:
//!
//! | offsets given | window(s) |
//! |---|---|
//! | all four | `[start - before_start, start + after_start]` and `[end - before_end, end + after_end]` |
//! | `before_start`, `after_start` | `[start - before_start, start + after_start]` |
//! | `after_end`, `before_end` | `[end - before_end, end + after_end]` |
//! | `before_start`, `after_end` | `[start - before_start, end + after_end]` |
//!
//! With `on_strand`, features on the reverse strand are mirrored so that
//! "before" always means upstream.
//!
//! # Memory Complexity
//!
//! O(w) where w = windows generated within the largest backward offset of
//! the current input position.
//!
//! # Requirements
//!
//! Input MUST be sorted by chromosome, then by start position.

use crate::error::{Result, StreamError};
use crate::feature::{Feature, Strand};
use crate::schema::STRAND;
use crate::stream::FeatureStream;
use crate::streaming::lookahead::{Expand, Generator};
use log::debug;
use std::sync::Arc;

/// Window layout chosen from the supplied offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Span {
        before_start: i64,
        after_end: i64,
    },
    StartWindow {
        before_start: i64,
        after_start: i64,
    },
    EndWindow {
        before_end: i64,
        after_end: i64,
    },
    Pair {
        before_start: i64,
        after_start: i64,
        before_end: i64,
        after_end: i64,
    },
}

impl Shape {
    fn start_window(bs: i64, as_: i64, s: i64, e: i64, reverse: bool) -> (i64, i64) {
        if reverse {
            (e - as_, e + bs)
        } else {
            (s - bs, s + as_)
        }
    }

    fn end_window(be: i64, ae: i64, s: i64, e: i64, reverse: bool) -> (i64, i64) {
        if reverse {
            (s - ae, s + be)
        } else {
            (e - be, e + ae)
        }
    }

    fn windows(self, s: i64, e: i64, reverse: bool) -> [Option<(i64, i64)>; 2] {
        match self {
            Shape::Span {
                before_start,
                after_end,
            } => {
                let w = if reverse {
                    (s - after_end, e + before_start)
                } else {
                    (s - before_start, e + after_end)
                };
                [Some(w), None]
            }
            Shape::StartWindow {
                before_start,
                after_start,
            } => [
                Some(Self::start_window(before_start, after_start, s, e, reverse)),
                None,
            ],
            Shape::EndWindow {
                before_end,
                after_end,
            } => [
                Some(Self::end_window(before_end, after_end, s, e, reverse)),
                None,
            ],
            Shape::Pair {
                before_start,
                after_start,
                before_end,
                after_end,
            } => [
                Some(Self::start_window(before_start, after_start, s, e, reverse)),
                Some(Self::end_window(before_end, after_end, s, e, reverse)),
            ],
        }
    }
}

/// Neighborhood command configuration.
#[derive(Debug, Clone, Default)]
pub struct NeighborhoodCommand {
    /// Bases before the feature start
    pub before_start: Option<i64>,
    /// Bases after the feature end
    pub after_end: Option<i64>,
    /// Bases after the feature start
    pub after_start: Option<i64>,
    /// Bases before the feature end
    pub before_end: Option<i64>,
    /// Mirror offsets for features on the reverse strand
    pub on_strand: bool,
}

impl NeighborhoodCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_before_start(mut self, bp: i64) -> Self {
        self.before_start = Some(bp);
        self
    }

    pub fn with_after_end(mut self, bp: i64) -> Self {
        self.after_end = Some(bp);
        self
    }

    pub fn with_after_start(mut self, bp: i64) -> Self {
        self.after_start = Some(bp);
        self
    }

    pub fn with_before_end(mut self, bp: i64) -> Self {
        self.before_end = Some(bp);
        self
    }

    /// Interpret offsets relative to each feature's strand.
    pub fn with_on_strand(mut self, on_strand: bool) -> Self {
        self.on_strand = on_strand;
        self
    }

    fn shape(&self) -> Result<Shape> {
        match (
            self.before_start,
            self.after_start,
            self.before_end,
            self.after_end,
        ) {
            (Some(before_start), Some(after_start), Some(before_end), Some(after_end)) => {
                Ok(Shape::Pair {
                    before_start,
                    after_start,
                    before_end,
                    after_end,
                })
            }
            (Some(before_start), Some(after_start), _, _) => Ok(Shape::StartWindow {
                before_start,
                after_start,
            }),
            (_, _, Some(before_end), Some(after_end)) => Ok(Shape::EndWindow {
                before_end,
                after_end,
            }),
            (Some(before_start), _, _, Some(after_end)) => Ok(Shape::Span {
                before_start,
                after_end,
            }),
            _ => Err(StreamError::argument(
                "neighborhood needs before_start+after_end, before_start+after_start, \
                 before_end+after_end, or all four offsets",
            )),
        }
    }

    /// Largest distance a window may start before its feature's start.
    fn reach(&self) -> i64 {
        let mut offsets = vec![self.before_start, self.before_end];
        if self.on_strand {
            offsets.push(self.after_end);
            offsets.push(self.after_start);
        }
        offsets.into_iter().flatten().fold(0, i64::max)
    }

    /// Generate flank windows for one sorted stream.
    pub fn run(&self, input: FeatureStream) -> Result<FeatureStream> {
        let shape = self.shape()?;
        let input_schema = input.schema().clone();

        let (schema, strand_idx, columns) = if self.on_strand {
            let strand_idx = input_schema.require(STRAND)?;
            match input_schema.reorder_plan(&[STRAND])? {
                Some((schema, columns)) => (Arc::new(schema), Some(strand_idx), Some(columns)),
                None => (input_schema, Some(strand_idx), None),
            }
        } else {
            (input_schema, None, None)
        };

        let reach = self.reach();
        debug!("neighborhood: {:?}, on_strand={}, reach={}", shape, self.on_strand, reach);

        let generator = Flanks {
            shape,
            strand_idx,
            columns,
            reach,
        };
        Ok(FeatureStream::from_operator(schema, Expand::new(input, generator)))
    }

    /// Generate flank windows for each of several streams.
    pub fn run_all(&self, inputs: Vec<FeatureStream>) -> Result<Vec<FeatureStream>> {
        inputs.into_iter().map(|input| self.run(input)).collect()
    }
}

struct Flanks {
    shape: Shape,
    strand_idx: Option<usize>,
    columns: Option<Vec<usize>>,
    reach: i64,
}

impl Generator for Flanks {
    fn generate(&mut self, feature: &Feature, out: &mut Vec<Feature>) {
        let reverse = self
            .strand_idx
            .is_some_and(|i| Strand::from_value(&feature.values[i]).is_reverse());
        let values = match &self.columns {
            Some(columns) => columns.iter().map(|&c| feature.values[c].clone()).collect(),
            None => feature.values.clone(),
        };
        for (start, end) in self
            .shape
            .windows(feature.start, feature.end, reverse)
            .into_iter()
            .flatten()
        {
            if end > start {
                out.push(Feature::new(start, end, values.clone()));
            }
        }
    }

    fn reach(&self) -> i64 {
        self.reach
    }
}
