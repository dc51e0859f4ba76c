//! Chromosome ordering and sizes.
//!
//! Streams are sorted by chromosome first. The order is either supplied by the
//! caller (usually an assembly's chromosome list) or falls back to plain
//! lexicographic comparison of the names.

use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::sync::Arc;

/// Genome information containing chromosome sizes.
/// Preserves chromosome order from insertion.
#[derive(Debug, Clone, Default)]
pub struct Genome {
    /// Map of chromosome name to size
    sizes: FxHashMap<String, i64>,
    /// Chromosome order (preserves insertion order)
    order: Vec<String>,
}

impl Genome {
    /// Create an empty genome.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a genome from `(name, size)` pairs, keeping their order.
    pub fn from_sizes<I, S>(chromosomes: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        let mut genome = Self::new();
        for (chrom, size) in chromosomes {
            genome.insert(chrom.into(), size);
        }
        genome
    }

    /// Get the size of a chromosome.
    #[inline]
    pub fn chrom_size(&self, chrom: &str) -> Option<i64> {
        self.sizes.get(chrom).copied()
    }

    /// Check if a chromosome exists.
    #[inline]
    pub fn has_chrom(&self, chrom: &str) -> bool {
        self.sizes.contains_key(chrom)
    }

    /// Get all chromosome names in order.
    pub fn chromosomes(&self) -> impl Iterator<Item = &String> {
        self.order.iter()
    }

    /// Get number of chromosomes.
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Insert a chromosome size (appends to order if new).
    pub fn insert(&mut self, chrom: String, size: i64) {
        if !self.sizes.contains_key(&chrom) {
            self.order.push(chrom.clone());
        }
        self.sizes.insert(chrom, size);
    }

    /// Chromosome order following this genome's listing.
    pub fn chrom_order(&self) -> ChromOrder {
        ChromOrder::from_names(self.order.iter().cloned())
    }
}

/// Comparator for chromosome names.
///
/// Listed chromosomes sort by their listing position; names not in the list
/// sort after every listed one, lexicographically among themselves.
#[derive(Debug, Clone, Default)]
pub struct ChromOrder {
    ranks: Option<Arc<FxHashMap<String, usize>>>,
}

impl ChromOrder {
    /// Plain lexicographic order.
    pub fn lexicographic() -> Self {
        Self { ranks: None }
    }

    /// Order given by an explicit chromosome list.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ranks = FxHashMap::default();
        for name in names {
            let next = ranks.len();
            ranks.entry(name.into()).or_insert(next);
        }
        Self {
            ranks: Some(Arc::new(ranks)),
        }
    }

    /// Position of a chromosome in the explicit list, if any.
    #[inline]
    pub fn rank(&self, chrom: &str) -> Option<usize> {
        self.ranks.as_ref().and_then(|r| r.get(chrom).copied())
    }

    /// Compare two chromosome names.
    #[inline]
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        match (self.rank(a), self.rank(b)) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.cmp(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genome_sizes() {
        let genome = Genome::from_sizes([("chr1", 1000000), ("chr2", 500000), ("chr3", 250000)]);

        assert_eq!(genome.chrom_size("chr1"), Some(1000000));
        assert_eq!(genome.chrom_size("chr2"), Some(500000));
        assert_eq!(genome.chrom_size("chr4"), None);
        assert_eq!(genome.len(), 3);
        assert!(genome.has_chrom("chr3"));
    }

    #[test]
    fn test_lexicographic_order() {
        let order = ChromOrder::lexicographic();
        assert_eq!(order.compare("chr1", "chr10"), Ordering::Less);
        assert_eq!(order.compare("chr10", "chr2"), Ordering::Less);
        assert_eq!(order.compare("chr2", "chr2"), Ordering::Equal);
    }

    #[test]
    fn test_genome_order() {
        let genome = Genome::from_sizes([("chr1", 100), ("chr2", 100), ("chr10", 100)]);
        let order = genome.chrom_order();
        assert_eq!(order.compare("chr2", "chr10"), Ordering::Less);
        assert_eq!(order.compare("chr10", "chr1"), Ordering::Greater);
        // Unlisted names come last
        assert_eq!(order.compare("chrM", "chr10"), Ordering::Greater);
        assert_eq!(order.compare("chrM", "chrUn"), Ordering::Less);
    }
}
