//! Keep features overlapping a second, filter stream.
//!
//! # Algorithm
//!
//! Both streams are swept together. Filter features are loaded into an
//! active set as soon as they start before the end of the current query,
//! and expire once they end at or before the query start. A query passes if
//! any active filter feature overlaps it (or, in strict mode, lies entirely
//! inside it).
//!
//! The filter can first be flattened with [`fusion`](super::fusion) or
//! [`cobble`](super::cobble). With `annotate`, the filter fields the query
//! stream lacks are appended to each kept feature, merged over every filter
//! feature that matched it.
//!
//! # Memory Complexity
//!
//! O(k) where k = max number of filter features overlapping one query.
//!
//! # Requirements
//!
//! Both streams MUST be sorted by chromosome, then by start position.

use crate::aggregate::{Aggregate, ResolvedAggregate};
use crate::commands::cobble::CobbleCommand;
use crate::commands::fusion::FusionCommand;
use crate::error::{Result, StreamError};
use crate::feature::Feature;
use crate::genome::ChromOrder;
use crate::schema::{Schema, CHR, STRAND};
use crate::stream::{FeatureStream, Operator};
use crate::streaming::{ActiveSet, SourceCursor};
use crate::value::ValueKind;
use log::debug;
use std::cmp::Ordering;
use std::sync::Arc;

/// Pre-processing applied to the filter stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flatten {
    /// Use the filter features as given
    #[default]
    None,
    /// Merge overlapping filter features
    Fusion,
    /// Split overlapping filter features into disjoint pieces
    Cobble,
}

/// Overlap command configuration.
#[derive(Debug, Clone, Default)]
pub struct OverlapCommand {
    /// Require a filter feature to lie entirely inside the query
    pub strict: bool,
    /// Append the filter's own fields to kept features
    pub annotate: bool,
    pub flatten: Flatten,
    /// Merge operations for flattening and annotation
    pub aggregate: Aggregate,
    /// Chromosome order shared by both streams
    pub chrom_order: ChromOrder,
}

impl OverlapCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require full containment of a filter feature.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Append the filter fields missing from the query stream.
    pub fn with_annotate(mut self, annotate: bool) -> Self {
        self.annotate = annotate;
        self
    }

    /// Flatten the filter before matching.
    pub fn with_flatten(mut self, flatten: Flatten) -> Self {
        self.flatten = flatten;
        self
    }

    /// Set the merge operations used by flattening and annotation.
    pub fn with_aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregate = aggregate;
        self
    }

    /// Set the chromosome order.
    pub fn with_chrom_order(mut self, order: ChromOrder) -> Self {
        self.chrom_order = order;
        self
    }

    /// Keep the features of `features` that overlap some feature of `filter`.
    pub fn run(&self, features: FeatureStream, filter: FeatureStream) -> Result<FeatureStream> {
        let filter = match self.flatten {
            Flatten::None => filter,
            Flatten::Fusion => FusionCommand::new()
                .with_aggregate(self.aggregate.clone())
                .run(filter)?,
            Flatten::Cobble => CobbleCommand::new()
                .with_aggregate(self.aggregate.clone())
                .run(filter)?,
        };
        let schema = features.schema().clone();
        let chr = paired_columns(&schema, filter.schema(), CHR)?;
        if chr.is_some() {
            for s in [&schema, filter.schema()] {
                if s.kind_of(CHR) != Some(ValueKind::Text) {
                    return Err(StreamError::schema(CHR, "must hold text"));
                }
            }
        }
        let strand = paired_columns(&schema, filter.schema(), STRAND)?;

        let (out_schema, annotation) = if self.annotate {
            let filter_schema = filter.schema();
            let merge = self.aggregate.resolve(filter_schema)?;
            let mut out = Schema::clone(&schema);
            let mut columns = Vec::new();
            for (col, field) in filter_schema.fields().iter().enumerate() {
                if !schema.contains(&field.name) {
                    out = out.with_field(field.clone())?;
                    columns.push(col);
                }
            }
            (Arc::new(out), Some(Annotation { columns, merge }))
        } else {
            (schema, None)
        };

        debug!(
            "overlap: strict={}, flatten={:?}, annotate={}, chromosome-aware={}, stranded={}",
            self.strict,
            self.flatten,
            self.annotate,
            chr.is_some(),
            strand.is_some()
        );

        let op = Overlap {
            input: features,
            filter: SourceCursor::new(filter),
            active: ActiveSet::new(),
            strict: self.strict,
            chr,
            strand,
            annotation,
            order: self.chrom_order.clone(),
            chrom: None,
        };
        Ok(FeatureStream::from_operator(out_schema, op))
    }
}

/// Filter columns appended to kept features.
struct Annotation {
    columns: Vec<usize>,
    merge: ResolvedAggregate,
}

impl Annotation {
    fn append(&self, query: &mut Feature, hits: &[&Feature]) {
        let mut column = Vec::with_capacity(hits.len());
        for &col in &self.columns {
            column.clear();
            column.extend(hits.iter().map(|f| f.values[col].clone()));
            query.values.push(self.merge.merge_column(col, &column));
        }
    }
}

/// Column of `name` in both schemas, when both carry it.
fn paired_columns(a: &Schema, b: &Schema, name: &str) -> Result<Option<(usize, usize)>> {
    match (a.index_of(name), b.index_of(name)) {
        (Some(x), Some(y)) => {
            if a.field(x).kind != b.field(y).kind {
                return Err(StreamError::schema(name, "has different kinds in the two streams"));
            }
            Ok(Some((x, y)))
        }
        _ => Ok(None),
    }
}

struct Overlap {
    input: FeatureStream,
    filter: SourceCursor,
    active: ActiveSet<Feature>,
    strict: bool,
    /// (query column, filter column)
    chr: Option<(usize, usize)>,
    strand: Option<(usize, usize)>,
    annotation: Option<Annotation>,
    order: ChromOrder,
    chrom: Option<String>,
}

impl Overlap {
    /// Load filter features that start before `query` ends on its chromosome.
    fn load(&mut self, query: &Feature) -> Result<()> {
        loop {
            let (rel, starts_before) = {
                let Some(next) = self.filter.peek()? else {
                    return Ok(());
                };
                let rel = match (self.chr, self.chrom.as_deref()) {
                    (Some((_, col)), Some(cur)) => match next.chrom_at(col) {
                        Some(c) => self.order.compare(c, cur),
                        None => Ordering::Less,
                    },
                    _ => Ordering::Equal,
                };
                (rel, next.start < query.end)
            };
            match rel {
                Ordering::Less => {
                    self.filter.take()?;
                }
                Ordering::Equal if starts_before => {
                    if let Some(next) = self.filter.take()? {
                        self.active.push(next);
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Active filter features matching `query`.
    fn hits<'a>(&'a self, query: &'a Feature) -> impl Iterator<Item = &'a Feature> + 'a {
        let strict = self.strict;
        self.active
            .iter_overlapping(query.start, query.end)
            .filter(move |f| !strict || query.contains(f))
            .filter(move |f| match self.strand {
                Some((q, t)) => query.values[q] == f.values[t],
                None => true,
            })
    }
}

impl Operator for Overlap {
    fn step(&mut self) -> Result<Option<Feature>> {
        while let Some(item) = self.input.next() {
            let query = item?;
            if let Some((col, _)) = self.chr {
                let chrom = query.chrom_at(col);
                if self.chrom.as_deref() != chrom {
                    self.active.clear();
                    self.chrom = chrom.map(str::to_string);
                }
            }
            self.load(&query)?;
            self.active.expire_before(query.start);
            let Some(annotation) = &self.annotation else {
                if self.hits(&query).next().is_some() {
                    return Ok(Some(query));
                }
                continue;
            };
            let hits: Vec<&Feature> = self.hits(&query).collect();
            if !hits.is_empty() {
                let mut kept = query.clone();
                annotation.append(&mut kept, &hits);
                return Ok(Some(kept));
            }
        }
        Ok(None)
    }
}
