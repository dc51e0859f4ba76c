//! Buffer size constants and shared defaults for streaming operators.
//!
//! These constants control lookahead vs memory tradeoffs. Every operator
//! accepts an explicit value; these are only the defaults.

/// Default sweep window of the combine engine, in bp.
pub const DEFAULT_WIN_SIZE: i64 = 1000;

/// Default number of body bins for segment splitting.
pub const DEFAULT_NBINS: usize = 10;

/// Separator used when text values are joined by a merge.
pub const DEFAULT_TEXT_SEPARATOR: &str = "|";

/// Lookahead buffers larger than this trigger a warning (potential
/// pathological input, e.g. very long flanks or an unsorted stream).
pub const LOOKAHEAD_WARNING_THRESHOLD: usize = 100_000;

/// Initial capacity of per-operator lookahead buffers.
pub const DEFAULT_LOOKAHEAD_CAPACITY: usize = 64;

/// Initial capacity of the combine engine's event queue.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Returns the starting lookahead capacity for `sources` inputs.
#[inline]
pub const fn event_capacity(sources: usize) -> usize {
    if sources * 4 > DEFAULT_EVENT_CAPACITY {
        sources * 4
    } else {
        DEFAULT_EVENT_CAPACITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_capacity() {
        assert_eq!(event_capacity(2), DEFAULT_EVENT_CAPACITY);
        assert_eq!(event_capacity(1000), 4000);
    }
}
