//! Core feature type for genomic stream records.

use crate::value::{Value, ValueKind};
use std::fmt;

/// A genomic feature: a half-open span `[start, end)` plus metadata columns.
///
/// The meaning of `values` is given by the [`crate::Schema`] of the stream the
/// feature travels in. Coordinates are signed so that flank generation can
/// step before position 0 without wrapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    pub start: i64,
    pub end: i64,
    pub values: Vec<Value>,
}

impl Feature {
    /// Create a new feature.
    #[inline]
    pub fn new(start: i64, end: i64, values: Vec<Value>) -> Self {
        Self { start, end, values }
    }

    /// Create a feature with no metadata.
    #[inline]
    pub fn span(start: i64, end: i64) -> Self {
        Self::new(start, end, Vec::new())
    }

    /// Returns the length of the feature.
    #[inline]
    pub fn len(&self) -> i64 {
        (self.end - self.start).max(0)
    }

    /// Returns true if the feature covers no position.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Check if this feature overlaps another, ignoring chromosomes.
    #[inline]
    pub fn overlaps(&self, other: &Feature) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Check if this feature fully contains another.
    #[inline]
    pub fn contains(&self, other: &Feature) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Metadata value at a column index.
    #[inline]
    pub fn value(&self, idx: usize) -> &Value {
        &self.values[idx]
    }

    /// Chromosome name stored at `idx`, if that column holds text.
    #[inline]
    pub fn chrom_at(&self, idx: usize) -> Option<&str> {
        self.values.get(idx).and_then(Value::as_text)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.start, self.end)?;
        for value in &self.values {
            write!(f, "\t{}", value)?;
        }
        Ok(())
    }
}

/// Strand orientation as read from a `strand` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Plus,
    Minus,
    Unknown,
}

impl Strand {
    pub fn from_char(c: char) -> Self {
        match c {
            '+' => Strand::Plus,
            '-' => Strand::Minus,
            _ => Strand::Unknown,
        }
    }

    /// Interpret a strand column value: negative ints and `"-"` are reverse.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Int(v) if *v > 0 => Strand::Plus,
            Value::Int(v) if *v < 0 => Strand::Minus,
            Value::Float(v) if *v > 0.0 => Strand::Plus,
            Value::Float(v) if *v < 0.0 => Strand::Minus,
            Value::Text(s) => s.chars().next().map(Strand::from_char).unwrap_or(Strand::Unknown),
            _ => Strand::Unknown,
        }
    }

    #[inline]
    pub fn is_reverse(self) -> bool {
        self == Strand::Minus
    }

    /// The "unstranded" value for a strand column of the given kind.
    pub fn unstranded(kind: ValueKind) -> Value {
        match kind {
            ValueKind::Text => Value::Text(".".to_string()),
            other => other.zero(),
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Plus => write!(f, "+"),
            Strand::Minus => write!(f, "-"),
            Strand::Unknown => write!(f, "."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_overlap() {
        let a = Feature::span(100, 200);
        let b = Feature::span(150, 250);
        let c = Feature::span(200, 300);

        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c)); // Adjacent, not overlapping
        assert!(a.contains(&Feature::span(120, 200)));
        assert!(!a.contains(&b));
    }

    #[test]
    fn test_feature_len() {
        assert_eq!(Feature::span(10, 16).len(), 6);
        assert_eq!(Feature::span(10, 10).len(), 0);
        assert!(Feature::span(10, 10).is_empty());
        assert!(Feature::span(12, 10).is_empty());
    }

    #[test]
    fn test_feature_equality_with_float_values() {
        let a = Feature::new(1, 2, vec![Value::Float(f64::NAN), Value::from("x")]);
        assert_eq!(a, a.clone());
        assert_ne!(a, Feature::new(1, 2, vec![Value::Float(0.0), Value::from("x")]));
        assert_ne!(
            Feature::new(1, 2, vec![Value::Float(0.0)]),
            Feature::new(1, 2, vec![Value::Float(-0.0)])
        );
    }

    #[test]
    fn test_feature_display() {
        let f = Feature::new(10, 16, vec![Value::from("chr1"), Value::Float(0.5)]);
        assert_eq!(f.to_string(), "10\t16\tchr1\t0.5");
    }

    #[test]
    fn test_strand_from_value() {
        assert_eq!(Strand::from_value(&Value::Int(-1)), Strand::Minus);
        assert_eq!(Strand::from_value(&Value::Int(1)), Strand::Plus);
        assert_eq!(Strand::from_value(&Value::Int(0)), Strand::Unknown);
        assert_eq!(Strand::from_value(&Value::from("-")), Strand::Minus);
        assert_eq!(Strand::from_value(&Value::from("+")), Strand::Plus);
        assert_eq!(Strand::from_value(&Value::from("")), Strand::Unknown);
    }

    #[test]
    fn test_unstranded_sentinel() {
        assert_eq!(Strand::unstranded(ValueKind::Int), Value::Int(0));
        assert_eq!(Strand::unstranded(ValueKind::Text), Value::from("."));
    }
}
