//! Shared streaming primitives for GRIT stream operators.
//!
//! This module provides the components every operator builds on:
//! - One-row lookahead over an input (end-of-stream sentinel handling)
//! - Sorted release buffers for operators whose output can overtake input
//! - Active set management with automatic compaction
//! - Sort validation
//!
//! Operators keep memory bounded by local lookahead, never by stream length.

pub mod active_set;
pub mod buffers;
pub mod cursor;
pub mod lookahead;
pub mod validation;

pub use active_set::ActiveSet;
pub use cursor::SourceCursor;
pub use lookahead::LookaheadBuffer;
pub use validation::SortValidator;
