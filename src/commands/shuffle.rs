//! Random relocation of features, for building null models.
//!
//! Each feature keeps its length and metadata and gets a new start drawn
//! uniformly from `[0, chrom_len - length]`. The chromosome length comes from
//! the genome when the stream has a `chr` column and the chromosome is listed,
//! otherwise from the fallback `chrom_len`.
//!
//! Results are reproducible for a given seed.
//!
//! # Memory Complexity
//!
//! O(n * repeat) when sorting the output (the default), O(1) otherwise.

use crate::error::{Result, StreamError};
use crate::feature::Feature;
use crate::genome::Genome;
use crate::stream::{sorted_stream, FeatureStream, Operator};
use log::debug;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Default random seed.
pub const DEFAULT_SEED: u64 = 42;

/// Shuffle command configuration.
#[derive(Debug, Clone)]
pub struct ShuffleCommand {
    /// Chromosome sizes, looked up through the `chr` column
    pub genome: Genome,
    /// Length used when the genome has no entry for a feature
    pub chrom_len: Option<i64>,
    /// Copies generated per input feature (default: 1)
    pub repeat: usize,
    pub seed: u64,
    /// Sort the output by position (default: true)
    pub sorted: bool,
}

impl Default for ShuffleCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl ShuffleCommand {
    pub fn new() -> Self {
        Self {
            genome: Genome::new(),
            chrom_len: None,
            repeat: 1,
            seed: DEFAULT_SEED,
            sorted: true,
        }
    }

    pub fn with_genome(mut self, genome: Genome) -> Self {
        self.genome = genome;
        self
    }

    pub fn with_chrom_len(mut self, len: i64) -> Self {
        self.chrom_len = Some(len);
        self
    }

    pub fn with_repeat(mut self, repeat: usize) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_sorted(mut self, sorted: bool) -> Self {
        self.sorted = sorted;
        self
    }

    /// Relocate every feature of `input`.
    pub fn run(&self, input: FeatureStream) -> Result<FeatureStream> {
        if self.repeat == 0 {
            return Err(StreamError::argument("repeat must be at least 1"));
        }
        if self.genome.is_empty() && self.chrom_len.is_none() {
            return Err(StreamError::argument(
                "shuffle needs a genome or a chromosome length",
            ));
        }
        let schema = input.schema().clone();
        debug!(
            "shuffle: repeat={}, seed={}, chromosomes={}",
            self.repeat,
            self.seed,
            self.genome.len()
        );

        let op = Shuffle {
            input,
            genome: self.genome.clone(),
            chrom_len: self.chrom_len,
            chr_idx: schema.chr_index(),
            rng: SmallRng::seed_from_u64(self.seed),
            repeat: self.repeat,
            current: None,
            left: 0,
        };
        let shuffled = FeatureStream::from_operator(schema, op);
        if !self.sorted {
            return Ok(shuffled);
        }
        sorted_stream(shuffled, &self.genome.chrom_order())
    }
}

struct Shuffle {
    input: FeatureStream,
    genome: Genome,
    chrom_len: Option<i64>,
    chr_idx: Option<usize>,
    rng: SmallRng,
    repeat: usize,
    /// Feature being repeated, with its chromosome length
    current: Option<(Feature, i64)>,
    left: usize,
}

impl Shuffle {
    fn chrom_len(&self, feature: &Feature) -> Result<i64> {
        let listed = self
            .chr_idx
            .and_then(|i| feature.chrom_at(i))
            .and_then(|c| self.genome.chrom_size(c));
        listed.or(self.chrom_len).ok_or_else(|| {
            StreamError::argument(format!(
                "no length known for the chromosome of feature {}-{}",
                feature.start, feature.end
            ))
        })
    }
}

impl Operator for Shuffle {
    fn step(&mut self) -> Result<Option<Feature>> {
        if self.left == 0 {
            let Some(item) = self.input.next() else {
                return Ok(None);
            };
            let feature = item?;
            let chrom_len = self.chrom_len(&feature)?;
            if feature.len() > chrom_len {
                return Err(StreamError::argument(format!(
                    "feature {}-{} is longer than its chromosome ({} bp)",
                    feature.start, feature.end, chrom_len
                )));
            }
            self.current = Some((feature, chrom_len));
            self.left = self.repeat;
        }
        let Some((feature, chrom_len)) = &self.current else {
            return Ok(None);
        };
        self.left -= 1;
        let len = feature.len();
        let start = self.rng.gen_range(0..=chrom_len - len);
        Ok(Some(Feature::new(start, start + len, feature.values.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, Schema};
    use crate::value::Value;

    fn scored() -> FeatureStream {
        let schema = Schema::new(vec![Field::float("score")]).unwrap();
        FeatureStream::from_features(
            schema,
            vec![
                Feature::new(10, 12, vec![Value::Float(0.5)]),
                Feature::new(14, 15, vec![Value::Float(1.2)]),
            ],
        )
    }

    #[test]
    fn test_shuffle_keeps_lengths_and_values() {
        let out = ShuffleCommand::new()
            .with_chrom_len(25)
            .run(scored())
            .unwrap()
            .collect_features()
            .unwrap();
        assert_eq!(out.len(), 2);
        let mut pairs: Vec<(i64, String)> = out
            .iter()
            .map(|f| (f.len(), f.values[0].to_string()))
            .collect();
        pairs.sort();
        assert_eq!(pairs, vec![(1, "1.2".to_string()), (2, "0.5".to_string())]);
        assert!(out.iter().all(|f| f.start >= 0 && f.end <= 25));
        assert!(out.windows(2).all(|w| w[0].start <= w[1].start));
    }

    #[test]
    fn test_shuffle_is_deterministic() {
        let run = |seed| {
            ShuffleCommand::new()
                .with_chrom_len(1000)
                .with_repeat(5)
                .with_seed(seed)
                .run(scored())
                .unwrap()
                .collect_features()
                .unwrap()
        };
        assert_eq!(run(7), run(7));
        assert_eq!(run(7).len(), 10);
    }

    #[test]
    fn test_shuffle_uses_genome_sizes() {
        let schema = Schema::new(vec![Field::text("chr")]).unwrap();
        let input = FeatureStream::from_features(
            schema,
            vec![
                Feature::new(0, 5, vec![Value::from("chrB")]),
                Feature::new(0, 10, vec![Value::from("chrA")]),
            ],
        );
        let genome = Genome::from_sizes([("chrB", 5), ("chrA", 100)]);
        let out = ShuffleCommand::new()
            .with_genome(genome)
            .with_repeat(20)
            .run(input)
            .unwrap()
            .collect_features()
            .unwrap();
        assert_eq!(out.len(), 40);
        // genome order: chrB first, and its only possible placement is [0, 5)
        assert!(out[..20].iter().all(|f| f.chrom_at(0) == Some("chrB") && f.start == 0));
        assert!(out[20..].iter().all(|f| f.end <= 100));
    }

    #[test]
    fn test_shuffle_errors() {
        let err = ShuffleCommand::new().run(scored()).unwrap_err();
        assert!(matches!(err, StreamError::Argument(_)));

        // sorting materialises the stream, so the error comes back from run
        let err = ShuffleCommand::new().with_chrom_len(1).run(scored()).unwrap_err();
        assert!(matches!(err, StreamError::Argument(_)));

        let err = ShuffleCommand::new()
            .with_chrom_len(1)
            .with_sorted(false)
            .run(scored())
            .unwrap()
            .collect_features()
            .unwrap_err();
        assert!(matches!(err, StreamError::Argument(_)));

        let err = ShuffleCommand::new()
            .with_chrom_len(100)
            .with_repeat(0)
            .run(scored())
            .unwrap_err();
        assert!(matches!(err, StreamError::Argument(_)));
    }
}
