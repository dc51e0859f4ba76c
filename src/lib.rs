//! GRIT streams: an algebra over sorted genomic feature streams.
//!
//! A [`FeatureStream`] is a lazy, sorted sequence of features (half-open
//! `[start, end)` spans plus typed metadata columns) with a shared
//! [`Schema`]. Operators in [`commands`] take one or more streams and return
//! a new stream, so pipelines compose without materialising their inputs.
//!
//! # Features
//!
//! - **Streaming**: memory is bounded by local overlap depth, never by
//!   stream length
//! - **K-way merge, fusion and cobbling** of overlapping features
//! - **Sweep-line combination** of any number of tracks under a boolean
//!   predicate (intersection, union, exclusion and more)
//! - **Flanks and binning** around features, strand-aware
//!
//! # Example
//!
//! ```rust
//! use grit_streams::prelude::*;
//!
//! let a = FeatureStream::from_features(
//!     Schema::empty(),
//!     vec![Feature::span(0, 10), Feature::span(20, 30)],
//! );
//! let b = FeatureStream::from_features(Schema::empty(), vec![Feature::span(5, 25)]);
//!
//! let common = CombineCommand::new(Predicate::Intersection)
//!     .run(vec![a, b])
//!     .unwrap()
//!     .collect_features()
//!     .unwrap();
//! assert_eq!(common, vec![Feature::span(5, 10), Feature::span(20, 25)]);
//! ```

pub mod aggregate;
pub mod commands;
pub mod error;
pub mod feature;
pub mod genome;
pub mod schema;
pub mod stream;
pub mod streaming;
pub mod value;

// Re-export commonly used types
pub use aggregate::{Aggregate, MergeOperation};
pub use error::{Result, StreamError};
pub use feature::{Feature, Strand};
pub use genome::{ChromOrder, Genome};
pub use schema::{Field, Schema};
pub use stream::{compare_position, sorted_stream, unroll, FeatureStream};
pub use value::{Value, ValueKind};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::aggregate::{Aggregate, MergeOperation};
    pub use crate::commands::{
        CobbleCommand, CombineCommand, ConcatenateCommand, Condition, Filter, FusionCommand,
        Flatten, NeighborhoodCommand, OverlapCommand, Predicate, SegmentCommand, SelectionCommand,
        ShuffleCommand,
    };
    pub use crate::error::{Result, StreamError};
    pub use crate::feature::{Feature, Strand};
    pub use crate::genome::{ChromOrder, Genome};
    pub use crate::schema::{Field, Schema};
    pub use crate::stream::{sorted_stream, unroll, FeatureStream};
    pub use crate::value::{Value, ValueKind};
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn test_basic_pipeline() {
        let schema = Schema::new(vec![Field::text("chr"), Field::text("name")]).unwrap();
        let row = |s: i64, e: i64, n: &str| {
            Feature::new(s, e, vec![Value::from("chr1"), Value::from(n)])
        };
        let a = FeatureStream::from_features(schema.clone(), vec![row(10, 15, "A"), row(13, 18, "B")]);
        let b = FeatureStream::from_features(schema, vec![row(12, 20, "C")]);

        let merged = ConcatenateCommand::new().run(vec![a, b]).unwrap();
        let fused = FusionCommand::new()
            .run(merged)
            .unwrap()
            .collect_features()
            .unwrap();
        assert_eq!(fused.len(), 1);
        assert_eq!((fused[0].start, fused[0].end), (10, 20));
        assert_eq!(fused[0].values[1], Value::from("A|C|B"));
    }
}
