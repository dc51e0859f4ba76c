//! Sort validation for streaming operations.
//!
//! Streaming algorithms require sorted input. Checking it costs a comparison
//! per feature, so it is opt-in: wrap a stream with
//! [`crate::FeatureStream::verify_sorted`] to get an `OrderingViolation` at the
//! first regression instead of silently wrong output.
//!
//! Sort validation checks that:
//! 1. All features for a chromosome are contiguous (no interleaving)
//! 2. Chromosomes follow the supplied [`ChromOrder`]
//! 3. Within a chromosome, `(start, end)` is non-decreasing

use crate::error::{Result, StreamError};
use crate::genome::ChromOrder;
use rustc_hash::FxHashSet;
use std::cmp::Ordering;

/// Inline sort validator for use within streaming loops.
#[derive(Debug, Default)]
pub struct SortValidator {
    order: ChromOrder,
    prev_chrom: Option<String>,
    prev_start: i64,
    prev_end: i64,
    seen_chroms: FxHashSet<String>,
    record_count: usize,
}

impl SortValidator {
    /// Create a validator using lexicographic chromosome order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a validator for a caller-supplied chromosome order.
    pub fn with_order(order: ChromOrder) -> Self {
        Self {
            order,
            ..Self::default()
        }
    }

    /// Validate that the given feature maintains sort order.
    ///
    /// `chrom` is `None` for streams without a `chr` column.
    #[inline]
    pub fn validate(&mut self, chrom: Option<&str>, start: i64, end: i64) -> Result<()> {
        self.record_count += 1;

        if self.record_count > 1 {
            let same_chrom = chrom == self.prev_chrom.as_deref();
            if !same_chrom {
                if let (Some(c), Some(pc)) = (chrom, self.prev_chrom.as_deref()) {
                    // Switching chromosomes - check we haven't seen this one before
                    if self.seen_chroms.contains(c) {
                        return Err(self.violation(format!(
                            "chromosome '{}' was seen earlier (chromosomes must be contiguous)",
                            c
                        )));
                    }
                    if self.order.compare(c, pc) == Ordering::Less {
                        return Err(self.violation(format!(
                            "chromosome '{}' should come before '{}'",
                            c, pc
                        )));
                    }
                    self.seen_chroms.insert(pc.to_string());
                }
            } else if (start, end) < (self.prev_start, self.prev_end) {
                return Err(self.violation(format!(
                    "feature [{}, {}) comes after [{}, {}){}",
                    start,
                    end,
                    self.prev_start,
                    self.prev_end,
                    chrom.map(|c| format!(" on {}", c)).unwrap_or_default()
                )));
            }
        }

        if chrom != self.prev_chrom.as_deref() {
            self.prev_chrom = chrom.map(str::to_string);
        }
        self.prev_start = start;
        self.prev_end = end;

        Ok(())
    }

    fn violation(&self, message: String) -> StreamError {
        StreamError::OrderingViolation {
            position: self.record_count,
            message,
        }
    }

    /// Get the number of features validated.
    pub fn record_count(&self) -> usize {
        self.record_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_validator() {
        let mut validator = SortValidator::new();
        assert!(validator.validate(Some("chr1"), 100, 200).is_ok());
        assert!(validator.validate(Some("chr1"), 200, 300).is_ok());
        assert!(validator.validate(Some("chr2"), 100, 200).is_ok());
        assert_eq!(validator.record_count(), 3);
    }

    #[test]
    fn test_sort_validator_invalid_position() {
        let mut validator = SortValidator::new();
        assert!(validator.validate(Some("chr1"), 200, 300).is_ok());
        let err = validator.validate(Some("chr1"), 100, 200).unwrap_err();
        assert!(err.to_string().contains("not sorted"));
    }

    #[test]
    fn test_sort_validator_end_tiebreak() {
        let mut validator = SortValidator::new();
        assert!(validator.validate(None, 100, 300).is_ok());
        assert!(validator.validate(None, 100, 200).is_err());
    }

    #[test]
    fn test_sort_validator_interleaved_chrom() {
        // chr1 appears, then chr2, then chr1 again - this is invalid
        let order = ChromOrder::from_names(["chr1", "chr2"]);
        let mut validator = SortValidator::with_order(order);
        assert!(validator.validate(Some("chr1"), 100, 200).is_ok());
        assert!(validator.validate(Some("chr2"), 100, 200).is_ok());
        let err = validator.validate(Some("chr1"), 300, 400).unwrap_err();
        assert!(err.to_string().contains("contiguous"));
    }

    #[test]
    fn test_sort_validator_genome_order() {
        let order = ChromOrder::from_names(["chr1", "chr2", "chr10"]);
        let mut validator = SortValidator::with_order(order);
        assert!(validator.validate(Some("chr2"), 100, 200).is_ok());
        assert!(validator.validate(Some("chr10"), 100, 200).is_ok());

        // Lexicographic order rejects the same sequence
        let mut validator = SortValidator::new();
        assert!(validator.validate(Some("chr2"), 100, 200).is_ok());
        assert!(validator.validate(Some("chr10"), 100, 200).is_err());
    }
}
