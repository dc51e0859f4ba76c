//! K-way merge of sorted streams.
//!
//! Produces one stream holding every feature of every input, ordered by the
//! composite key `(chr, start, end, name, other fields...)`.
//!
//! # Algorithm
//!
//! One row is buffered per input. At each step the input whose buffered row
//! has the smallest key is consumed; on ties the earliest input wins. An
//! exhausted input compares greater than any row.
//!
//! With duplicate removal, identical buffered rows are skipped on all but
//! the first input before each selection. With grouping, consecutive output
//! rows that agree on the group fields are merged into one.
//!
//! # Memory Complexity
//!
//! O(N) - one buffered row per input.
//!
//! # Requirements
//!
//! Every input MUST be sorted by the composite key.

use crate::aggregate::{Aggregate, ResolvedAggregate};
use crate::error::{Result, StreamError};
use crate::feature::Feature;
use crate::genome::ChromOrder;
use crate::schema::{is_coordinate, Schema, CHR, END, NAME, START};
use crate::stream::{FeatureStream, Operator};
use crate::streaming::SourceCursor;
use crate::value::Value;
use log::debug;
use std::cmp::Ordering;

/// Concatenate command configuration.
#[derive(Debug, Clone, Default)]
pub struct ConcatenateCommand {
    /// Fields to keep (default: fields of the first input common to all)
    pub fields: Option<Vec<String>>,
    /// Skip rows identical across inputs
    pub remove_duplicates: bool,
    /// Merge consecutive rows agreeing on these fields
    pub group_by: Vec<String>,
    /// Merge operations for non-group fields
    pub aggregate: Aggregate,
    /// Chromosome order for the `chr` key component
    pub chrom_order: ChromOrder,
}

impl ConcatenateCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output fields.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Enable duplicate removal.
    pub fn with_remove_duplicates(mut self, remove: bool) -> Self {
        self.remove_duplicates = remove;
        self
    }

    /// Merge rows sharing the values of `fields`.
    pub fn with_group_by<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set merge operations used when grouping.
    pub fn with_aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregate = aggregate;
        self
    }

    /// Set the chromosome order.
    pub fn with_chrom_order(mut self, order: ChromOrder) -> Self {
        self.chrom_order = order;
        self
    }

    /// Merge sorted inputs into one sorted stream.
    pub fn run(&self, mut inputs: Vec<FeatureStream>) -> Result<FeatureStream> {
        if inputs.is_empty() {
            return Err(StreamError::argument("concatenate needs at least one input"));
        }
        if inputs.len() == 1 && self.fields.is_none() && self.group_by.is_empty() {
            if let Some(only) = inputs.pop() {
                return Ok(only);
            }
        }

        let names = self.output_fields(&inputs)?;
        let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut sources = Vec::with_capacity(inputs.len());
        for input in inputs {
            sources.push(SourceCursor::new(input.select(&name_refs)?));
        }
        let schema = sources[0].schema().clone();
        let chr_col = schema.chr_index();

        let group = if self.group_by.is_empty() {
            None
        } else {
            Some(Grouping::new(&schema, &self.group_by, &self.aggregate)?)
        };

        debug!(
            "concatenate: {} inputs, fields {:?}, dedup={}, group_by={:?}",
            sources.len(),
            names,
            self.remove_duplicates,
            self.group_by
        );

        let op = Concatenate {
            sources,
            key: KeyOrder {
                chr_col,
                order: self.chrom_order.clone(),
            },
            remove_duplicates: self.remove_duplicates,
            group,
            held: None,
            done: false,
        };
        Ok(FeatureStream::from_operator(schema, op))
    }

    /// Requested fields present in every input, in key order:
    /// `chr`, `name`, then the rest as requested.
    fn output_fields(&self, inputs: &[FeatureStream]) -> Result<Vec<String>> {
        let first = inputs[0].schema();
        let requested: Vec<String> = match &self.fields {
            Some(fields) => fields.clone(),
            None => first.names().map(str::to_string).collect(),
        };

        let mut common: Vec<String> = Vec::with_capacity(requested.len());
        for name in requested {
            if is_coordinate(&name) || common.contains(&name) {
                continue;
            }
            if !inputs.iter().all(|s| s.schema().contains(&name)) {
                debug!("concatenate: dropping field '{}' missing from some inputs", name);
                continue;
            }
            let kind = inputs
                .iter()
                .find_map(|s| s.schema().kind_of(&name))
                .ok_or_else(|| StreamError::missing_field(&name))?;
            if inputs.iter().any(|s| s.schema().kind_of(&name) != Some(kind)) {
                return Err(StreamError::schema(&name, "has different kinds across inputs"));
            }
            common.push(name);
        }

        let mut ordered = Vec::with_capacity(common.len());
        for lead in [CHR, NAME] {
            if let Some(pos) = common.iter().position(|n| n == lead) {
                ordered.push(common.remove(pos));
            }
        }
        ordered.extend(common);
        Ok(ordered)
    }
}

/// Composite key comparison over the projected columns.
struct KeyOrder {
    chr_col: Option<usize>,
    order: ChromOrder,
}

impl KeyOrder {
    fn compare(&self, a: &Feature, b: &Feature) -> Ordering {
        let (chrom, rest) = match self.chr_col {
            Some(i) => {
                let chrom = match (a.chrom_at(i), b.chrom_at(i)) {
                    (Some(x), Some(y)) => self.order.compare(x, y),
                    _ => a.values[i].cmp(&b.values[i]),
                };
                (chrom, i + 1)
            }
            None => (Ordering::Equal, 0),
        };
        chrom
            .then(a.start.cmp(&b.start))
            .then(a.end.cmp(&b.end))
            .then_with(|| a.values[rest..].cmp(&b.values[rest..]))
    }
}

/// Group merging state bound to the output schema.
struct Grouping {
    columns: Vec<usize>,
    by_start: bool,
    by_end: bool,
    merge: ResolvedAggregate,
}

impl Grouping {
    fn new(schema: &Schema, group_by: &[String], aggregate: &Aggregate) -> Result<Self> {
        let mut columns = Vec::with_capacity(group_by.len() + 1);
        let mut by_start = false;
        let mut by_end = false;
        for name in group_by {
            match name.as_str() {
                START => by_start = true,
                END => by_end = true,
                other => columns.push(schema.index_of(other).ok_or_else(|| {
                    StreamError::schema(other, "is not among the concatenated fields")
                })?),
            }
        }
        // Never group across chromosomes
        if let Some(chr) = schema.chr_index() {
            if !columns.contains(&chr) {
                columns.push(chr);
            }
        }
        Ok(Self {
            columns,
            by_start,
            by_end,
            merge: aggregate.resolve(schema)?,
        })
    }

    fn same_group(&self, a: &Feature, b: &Feature) -> bool {
        (!self.by_start || a.start == b.start)
            && (!self.by_end || a.end == b.end)
            && self.columns.iter().all(|&c| a.values[c] == b.values[c])
    }

    fn merge(&self, held: Feature, next: Feature) -> Feature {
        let start = if self.by_start {
            held.start
        } else {
            held.start.min(next.start)
        };
        let end = if self.by_end {
            held.end
        } else {
            held.end.max(next.end)
        };
        let values: Vec<Value> = held
            .values
            .iter()
            .zip(&next.values)
            .enumerate()
            .map(|(col, (a, b))| {
                if self.columns.contains(&col) {
                    a.clone()
                } else {
                    self.merge.merge_column(col, &[a.clone(), b.clone()])
                }
            })
            .collect();
        Feature::new(start, end, values)
    }
}

struct Concatenate {
    sources: Vec<SourceCursor>,
    key: KeyOrder,
    remove_duplicates: bool,
    group: Option<Grouping>,
    held: Option<Feature>,
    done: bool,
}

impl Concatenate {
    /// Skip buffered rows that repeat a row buffered on an earlier input.
    fn drop_duplicates(&mut self) -> Result<()> {
        loop {
            let dup = (1..self.sources.len()).find(|&k| match self.sources[k].buffered() {
                Some(f) => self.sources[..k].iter().any(|c| c.buffered() == Some(f)),
                None => false,
            });
            match dup {
                Some(k) => {
                    self.sources[k].take()?;
                    self.sources[k].peek()?;
                }
                None => return Ok(()),
            }
        }
    }

    /// Index of the input with the smallest buffered key; first strictly-less wins.
    fn find_min(&self) -> Option<usize> {
        let mut best: Option<(usize, &Feature)> = None;
        for (i, cursor) in self.sources.iter().enumerate() {
            let Some(f) = cursor.buffered() else {
                continue;
            };
            match best {
                Some((_, b)) if self.key.compare(f, b) != Ordering::Less => {}
                _ => best = Some((i, f)),
            }
        }
        best.map(|(i, _)| i)
    }
}

impl Operator for Concatenate {
    fn step(&mut self) -> Result<Option<Feature>> {
        while !self.done {
            for cursor in &mut self.sources {
                cursor.peek()?;
            }
            if self.remove_duplicates {
                self.drop_duplicates()?;
            }
            let Some(n) = self.find_min() else {
                self.done = true;
                break;
            };
            let Some(next) = self.sources[n].take()? else {
                continue;
            };
            let Some(group) = &self.group else {
                return Ok(Some(next));
            };
            match self.held.take() {
                Some(held) if group.same_group(&held, &next) => {
                    self.held = Some(group.merge(held, next));
                }
                Some(held) => {
                    self.held = Some(next);
                    return Ok(Some(held));
                }
                None => self.held = Some(next),
            }
        }
        Ok(self.held.take())
    }
}
