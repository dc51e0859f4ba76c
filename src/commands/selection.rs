//! Row filtering by field conditions.
//!
//! A selection is an OR of filters; a filter is an AND of per-field
//! conditions. Field names are resolved to columns once, when the command
//! runs, and the coordinates `start`/`end` may be named like any field.

use crate::error::{Result, StreamError};
use crate::feature::Feature;
use crate::schema::{Schema, END, START};
use crate::stream::FeatureStream;
use crate::value::Value;
use log::debug;

/// Condition on one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Numeric value in `[lo, hi)`
    Range(f64, f64),
    /// Value equal to one of these
    OneOf(Vec<Value>),
    Equals(Value),
}

impl Condition {
    #[inline]
    fn matches(&self, value: &Value) -> bool {
        match self {
            Condition::Range(lo, hi) => value.as_f64().is_some_and(|v| *lo <= v && v < *hi),
            Condition::OneOf(values) => values.contains(value),
            Condition::Equals(expected) => value == expected,
        }
    }
}

/// Conditions that must all hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub conditions: Vec<(String, Condition)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition on `field` (builder pattern).
    pub fn with(mut self, field: impl Into<String>, condition: Condition) -> Self {
        self.conditions.push((field.into(), condition));
        self
    }
}

#[derive(Debug, Clone, Copy)]
enum Column {
    Start,
    End,
    Meta(usize),
}

impl Column {
    fn resolve(schema: &Schema, name: &str) -> Result<Self> {
        match name {
            START => Ok(Column::Start),
            END => Ok(Column::End),
            other => schema.require(other).map(Column::Meta),
        }
    }
}

/// A [`Filter`] bound to the columns of one schema.
#[derive(Debug, Clone)]
struct BoundFilter {
    conditions: Vec<(Column, Condition)>,
}

impl BoundFilter {
    fn matches(&self, feature: &Feature) -> bool {
        self.conditions.iter().all(|(column, condition)| match column {
            Column::Start => condition.matches(&Value::Int(feature.start)),
            Column::End => condition.matches(&Value::Int(feature.end)),
            Column::Meta(idx) => condition.matches(&feature.values[*idx]),
        })
    }
}

/// Selection command configuration.
#[derive(Debug, Clone, Default)]
pub struct SelectionCommand {
    /// Alternatives; a feature passes if any filter matches
    pub filters: Vec<Filter>,
}

impl SelectionCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an alternative filter.
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Keep the features of `input` matching at least one filter.
    pub fn run(&self, input: FeatureStream) -> Result<FeatureStream> {
        if self.filters.is_empty() {
            return Err(StreamError::argument("selection needs at least one filter"));
        }
        let schema = input.schema().clone();
        let mut bound = Vec::with_capacity(self.filters.len());
        for filter in &self.filters {
            let conditions = filter
                .conditions
                .iter()
                .map(|(name, cond)| Ok((Column::resolve(&schema, name)?, cond.clone())))
                .collect::<Result<Vec<_>>>()?;
            bound.push(BoundFilter { conditions });
        }
        debug!("selection: {} filters", bound.len());

        let features = input.filter(move |item| match item {
            Ok(f) => bound.iter().any(|filter| filter.matches(f)),
            Err(_) => true,
        });
        Ok(FeatureStream::new(schema, features))
    }

    /// Filter each of several streams.
    pub fn run_all(&self, inputs: Vec<FeatureStream>) -> Result<Vec<FeatureStream>> {
        inputs.into_iter().map(|input| self.run(input)).collect()
    }
}
