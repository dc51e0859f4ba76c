//! Sweep-line boolean combination of N sorted streams.
//!
//! Each input is first cobbled into disjoint pieces. Every piece contributes
//! an enter event (carrying its metadata) and a leave event. Events are
//! swept left to right while one activity bit per input is maintained; each
//! span between consecutive event positions on which the predicate holds is
//! emitted with the merged metadata of the inputs active over it.
//!
//! # Algorithm
//!
//! 1. Sweep one chromosome at a time (when inputs carry `chr`)
//! 2. Advance a window `[base, base + w)` over the chromosome; `w` starts at
//!    `win_size` and doubles until the window reaches the next pending
//!    position, so every window makes progress
//! 3. Load every piece starting inside the window, then process every event
//!    inside it
//! 4. Coalesce abutting emissions with identical metadata
//!
//! # Memory Complexity
//!
//! O(N + pieces starting inside one window), independent of chromosome size.
//!
//! # Requirements
//!
//! Every input MUST be sorted by chromosome, then by start position.
//!
//! The sweep runs per chromosome as soon as any input carries `chr`; every
//! input then needs a text `chr` field, otherwise `run` fails with a schema
//! error.

use crate::aggregate::{Aggregate, ResolvedAggregate};
use crate::commands::cobble::CobbleCommand;
use crate::commands::fusion::FusionCommand;
use crate::error::{Result, StreamError};
use crate::feature::Feature;
use crate::genome::ChromOrder;
use crate::schema::CHR;
use crate::stream::{FeatureStream, Operator};
use crate::streaming::buffers::{event_capacity, DEFAULT_WIN_SIZE};
use crate::streaming::SourceCursor;
use crate::value::{Value, ValueKind};
use log::{debug, trace};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::fmt;
use std::sync::Arc;

/// User-supplied predicate over the activity vector.
pub type PredicateFn = Arc<dyn Fn(&[bool]) -> bool + Send + Sync>;

/// True when every input is active.
pub fn intersection(activity: &[bool]) -> bool {
    activity.iter().all(|&a| a)
}

/// True when any input is active.
pub fn union(activity: &[bool]) -> bool {
    activity.iter().any(|&a| a)
}

/// True when some input outside `indices` is active and none inside is.
pub fn exclude(activity: &[bool], indices: &[usize]) -> bool {
    let mut outside = false;
    for (i, &active) in activity.iter().enumerate() {
        if indices.contains(&i) {
            if active {
                return false;
            }
        } else if active {
            outside = true;
        }
    }
    outside
}

/// True when some input outside `indices` is active and all inside are.
pub fn require(activity: &[bool], indices: &[usize]) -> bool {
    let mut outside = false;
    for (i, &active) in activity.iter().enumerate() {
        if indices.contains(&i) {
            if !active {
                return false;
            }
        } else if active {
            outside = true;
        }
    }
    outside
}

/// Activity confined to `indices` or confined to its complement.
pub fn disjunction(activity: &[bool], indices: &[usize]) -> bool {
    let complement: Vec<usize> = (0..activity.len())
        .filter(|i| !indices.contains(i))
        .collect();
    exclude(activity, indices) || exclude(activity, &complement)
}

/// Boolean predicate applied to the activity vector.
#[derive(Clone)]
pub enum Predicate {
    Intersection,
    Union,
    Exclude(Vec<usize>),
    Require(Vec<usize>),
    Disjunction(Vec<usize>),
    Custom(PredicateFn),
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Intersection => write!(f, "Intersection"),
            Predicate::Union => write!(f, "Union"),
            Predicate::Exclude(idx) => write!(f, "Exclude({:?})", idx),
            Predicate::Require(idx) => write!(f, "Require({:?})", idx),
            Predicate::Disjunction(idx) => write!(f, "Disjunction({:?})", idx),
            Predicate::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl Predicate {
    /// Wrap a closure as a predicate.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&[bool]) -> bool + Send + Sync + 'static,
    {
        Predicate::Custom(Arc::new(f))
    }

    #[inline]
    pub fn evaluate(&self, activity: &[bool]) -> bool {
        match self {
            Predicate::Intersection => intersection(activity),
            Predicate::Union => union(activity),
            Predicate::Exclude(idx) => exclude(activity, idx),
            Predicate::Require(idx) => require(activity, idx),
            Predicate::Disjunction(idx) => disjunction(activity, idx),
            Predicate::Custom(f) => f(activity),
        }
    }

    fn validate(&self, sources: usize) -> Result<()> {
        let indices = match self {
            Predicate::Exclude(idx) | Predicate::Require(idx) | Predicate::Disjunction(idx) => idx,
            _ => return Ok(()),
        };
        match indices.iter().find(|&&i| i >= sources) {
            Some(bad) => Err(StreamError::argument(format!(
                "predicate index {} out of range for {} inputs",
                bad, sources
            ))),
            None => Ok(()),
        }
    }
}

/// Combine command configuration.
#[derive(Debug, Clone)]
pub struct CombineCommand {
    /// Which activity patterns produce output
    pub predicate: Predicate,
    /// Initial sweep window in bp (default: 1000)
    pub win_size: i64,
    /// Per-field merge operations
    pub aggregate: Aggregate,
    /// Chromosome order of the inputs
    pub chrom_order: ChromOrder,
}

impl Default for CombineCommand {
    fn default() -> Self {
        Self::new(Predicate::Intersection)
    }
}

impl CombineCommand {
    pub fn new(predicate: Predicate) -> Self {
        Self {
            predicate,
            win_size: DEFAULT_WIN_SIZE,
            aggregate: Aggregate::default(),
            chrom_order: ChromOrder::default(),
        }
    }

    /// Set the initial window size.
    pub fn with_win_size(mut self, win_size: i64) -> Self {
        self.win_size = win_size;
        self
    }

    /// Set the per-field merge operations.
    pub fn with_aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregate = aggregate;
        self
    }

    /// Set the chromosome order.
    pub fn with_chrom_order(mut self, order: ChromOrder) -> Self {
        self.chrom_order = order;
        self
    }

    /// Combine sorted inputs. The output carries the fields of the first.
    pub fn run(&self, inputs: Vec<FeatureStream>) -> Result<FeatureStream> {
        if inputs.is_empty() {
            return Err(StreamError::argument("combine needs at least one input"));
        }
        if self.win_size <= 0 {
            return Err(StreamError::argument(format!(
                "window size must be positive, got {}",
                self.win_size
            )));
        }
        self.predicate.validate(inputs.len())?;

        let schema = inputs[0].schema().clone();
        let merge = self.aggregate.resolve(&schema)?;
        let chrom_aware = inputs.iter().any(|s| s.schema().contains(CHR));

        let mut sources = Vec::with_capacity(inputs.len());
        for input in inputs {
            let chr_col = if chrom_aware {
                let col = input.schema().require(CHR)?;
                if input.schema().field(col).kind != ValueKind::Text {
                    return Err(StreamError::schema(CHR, "must hold text"));
                }
                Some(col)
            } else {
                None
            };
            let columns = input.schema().projection_onto(&schema)?;
            let cobbled = CobbleCommand::new()
                .with_aggregate(self.aggregate.clone())
                .run(input)?;
            sources.push(Source {
                cursor: SourceCursor::new(cobbled),
                columns,
                chr_col,
            });
        }

        debug!(
            "combine: {} inputs, predicate {:?}, win_size={}, chromosome-aware={}",
            sources.len(),
            self.predicate,
            self.win_size,
            chrom_aware
        );

        let n = sources.len();
        let op = Combine {
            sources,
            predicate: self.predicate.clone(),
            merge,
            out_chr: schema.chr_index(),
            order: self.chrom_order.clone(),
            win_size: self.win_size,
            chrom: None,
            in_chrom: false,
            events: BinaryHeap::with_capacity(event_capacity(n)),
            active: vec![false; n],
            cached: vec![None; n],
            boundary: None,
            limit: 0,
            ready: VecDeque::new(),
            done: false,
        };
        let swept = FeatureStream::from_operator(schema, op);
        FusionCommand::new()
            .with_aggregate(self.aggregate.clone())
            .with_touching(true)
            .run(swept)
    }
}

/// Positions covered by every input.
pub fn intersect(inputs: Vec<FeatureStream>) -> Result<FeatureStream> {
    CombineCommand::new(Predicate::Intersection).run(inputs)
}

/// Positions covered by any input.
pub fn union_all(inputs: Vec<FeatureStream>) -> Result<FeatureStream> {
    CombineCommand::new(Predicate::Union).run(inputs)
}

/// Positions covered by some input outside `indices` and by none inside.
pub fn exclude_tracks(inputs: Vec<FeatureStream>, indices: &[usize]) -> Result<FeatureStream> {
    CombineCommand::new(Predicate::Exclude(indices.to_vec())).run(inputs)
}

/// Positions covered by every input in `indices` and some input outside.
pub fn require_tracks(inputs: Vec<FeatureStream>, indices: &[usize]) -> Result<FeatureStream> {
    CombineCommand::new(Predicate::Require(indices.to_vec())).run(inputs)
}

/// Positions covered only within `indices` or only outside it.
pub fn disjoint_tracks(inputs: Vec<FeatureStream>, indices: &[usize]) -> Result<FeatureStream> {
    CombineCommand::new(Predicate::Disjunction(indices.to_vec())).run(inputs)
}

/// Projected metadata of one piece, aligned to the output columns.
type Projected = Vec<Option<Value>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EventKind {
    Leave,
    Enter,
}

/// Sweep event. Ordered for a min-heap on `(pos, source, kind)`.
#[derive(Debug)]
struct Event {
    pos: i64,
    source: usize,
    kind: EventKind,
    payload: Option<Projected>,
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Event {}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap; leaves come before enters
        other
            .pos
            .cmp(&self.pos)
            .then(other.source.cmp(&self.source))
            .then(other.kind.cmp(&self.kind))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Source {
    cursor: SourceCursor,
    columns: Vec<Option<usize>>,
    chr_col: Option<usize>,
}

struct Combine {
    sources: Vec<Source>,
    predicate: Predicate,
    merge: ResolvedAggregate,
    out_chr: Option<usize>,
    order: ChromOrder,
    win_size: i64,
    /// Chromosome being swept (None for inputs without `chr`)
    chrom: Option<String>,
    in_chrom: bool,
    events: BinaryHeap<Event>,
    active: Vec<bool>,
    cached: Vec<Option<Projected>>,
    boundary: Option<i64>,
    /// Right edge of the last processed window
    limit: i64,
    ready: VecDeque<Feature>,
    done: bool,
}

impl Combine {
    /// Start of the next piece of input `i` on the current chromosome.
    fn head_start(&mut self, i: usize) -> Result<Option<i64>> {
        let src = &mut self.sources[i];
        let Some(head) = src.cursor.peek()? else {
            return Ok(None);
        };
        let on_chrom = match (src.chr_col, self.chrom.as_deref()) {
            (Some(col), Some(chrom)) => head.chrom_at(col) == Some(chrom),
            _ => true,
        };
        Ok(on_chrom.then_some(head.start))
    }

    /// Smallest position still to be processed on the current chromosome.
    fn frontier(&mut self) -> Result<Option<i64>> {
        let mut best = self.events.peek().map(|e| e.pos);
        for i in 0..self.sources.len() {
            if let Some(start) = self.head_start(i)? {
                best = Some(best.map_or(start, |b| b.min(start)));
            }
        }
        Ok(best)
    }

    fn start_chrom(&mut self) -> Result<()> {
        let mut next: Option<String> = None;
        let mut pending = false;
        for src in &mut self.sources {
            let Some(head) = src.cursor.peek()? else {
                continue;
            };
            pending = true;
            let Some(chrom) = src.chr_col.and_then(|col| head.chrom_at(col)) else {
                continue;
            };
            let earlier = next
                .as_deref()
                .map_or(true, |best| self.order.compare(chrom, best) == Ordering::Less);
            if earlier {
                next = Some(chrom.to_string());
            }
        }
        if !pending {
            self.done = true;
            return Ok(());
        }

        self.chrom = next;
        self.in_chrom = true;
        self.events.clear();
        self.active.iter_mut().for_each(|a| *a = false);
        self.cached.iter_mut().for_each(|c| *c = None);
        self.boundary = None;
        self.limit = self.frontier()?.unwrap_or(0);
        trace!("combine: sweeping {:?} from {}", self.chrom, self.limit);
        Ok(())
    }

    fn advance(&mut self) -> Result<()> {
        if !self.in_chrom {
            return self.start_chrom();
        }
        let Some(frontier) = self.frontier()? else {
            self.in_chrom = false;
            return Ok(());
        };

        let base = self.limit;
        let mut win = self.win_size;
        let mut limit = base.saturating_add(win);
        while limit <= frontier {
            win = win.saturating_mul(2);
            limit = base.saturating_add(win);
        }
        if win > self.win_size {
            trace!("combine: window grown to {} at {}", win, base);
        }
        self.limit = limit;

        self.load(limit)?;
        self.sweep(limit);
        Ok(())
    }

    /// Queue the events of every piece starting before `limit`.
    fn load(&mut self, limit: i64) -> Result<()> {
        for i in 0..self.sources.len() {
            while matches!(self.head_start(i)?, Some(start) if start < limit) {
                let src = &mut self.sources[i];
                let Some(piece) = src.cursor.take()? else {
                    break;
                };
                let values: Projected = src
                    .columns
                    .iter()
                    .map(|col| col.map(|c| piece.values[c].clone()))
                    .collect();
                self.events.push(Event {
                    pos: piece.start,
                    source: i,
                    kind: EventKind::Enter,
                    payload: Some(values),
                });
                self.events.push(Event {
                    pos: piece.end,
                    source: i,
                    kind: EventKind::Leave,
                    payload: None,
                });
            }
        }
        Ok(())
    }

    /// Process every queued event before `limit`.
    fn sweep(&mut self, limit: i64) {
        while let Some(pos) = self.events.peek().map(|e| e.pos) {
            if pos >= limit {
                break;
            }
            if let Some(boundary) = self.boundary {
                if boundary < pos && self.predicate.evaluate(&self.active) {
                    let feature = self.emit(boundary, pos);
                    self.ready.push_back(feature);
                }
            }
            while self.events.peek().is_some_and(|e| e.pos == pos) {
                let Some(event) = self.events.pop() else {
                    break;
                };
                self.active[event.source] = event.kind == EventKind::Enter;
                self.cached[event.source] = event.payload;
            }
            self.boundary = Some(pos);
        }
    }

    fn emit(&self, start: i64, end: i64) -> Feature {
        let mut values = Vec::with_capacity(self.merge.len());
        let mut column = Vec::with_capacity(self.sources.len());
        for col in 0..self.merge.len() {
            if let (Some(chr), Some(chrom)) = (self.out_chr, &self.chrom) {
                if chr == col {
                    values.push(Value::Text(chrom.clone()));
                    continue;
                }
            }
            column.clear();
            column.extend(
                self.cached
                    .iter()
                    .flatten()
                    .filter_map(|row| row[col].clone()),
            );
            values.push(self.merge.merge_column(col, &column));
        }
        Feature::new(start, end, values)
    }
}

impl Operator for Combine {
    fn step(&mut self) -> Result<Option<Feature>> {
        loop {
            if let Some(feature) = self.ready.pop_front() {
                return Ok(Some(feature));
            }
            if self.done {
                return Ok(None);
            }
            self.advance()?;
        }
    }
}
