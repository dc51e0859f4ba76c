//! Stream operators.
//!
//! Every command is a configuration struct with builder methods and a `run`
//! method that consumes sorted [`FeatureStream`](crate::stream::FeatureStream)s
//! and returns a new lazily evaluated one.

pub mod cobble;
pub mod combine;
pub mod concatenate;
pub mod fusion;
pub mod neighborhood;
pub mod overlap;
pub mod segment;
pub mod selection;
pub mod shuffle;

pub use cobble::CobbleCommand;
pub use combine::{
    disjoint_tracks, exclude_tracks, intersect, require_tracks, union_all, CombineCommand,
    Predicate, PredicateFn,
};
pub use concatenate::ConcatenateCommand;
pub use fusion::FusionCommand;
pub use neighborhood::NeighborhoodCommand;
pub use overlap::{Flatten, OverlapCommand};
pub use segment::{Flank, SegmentCommand};
pub use selection::{Condition, Filter, SelectionCommand};
pub use shuffle::ShuffleCommand;
