//! Sentinel-safe one-row lookahead over a feature stream.
//!
//! N-way operators need to look at the next feature of every input before
//! deciding which one to consume. A [`SourceCursor`] buffers exactly one
//! feature per input and reports `None` once the input is exhausted, which
//! callers treat as a key greater than any real feature.

use crate::error::Result;
use crate::feature::Feature;
use crate::schema::Schema;
use crate::stream::FeatureStream;
use std::sync::Arc;

/// One buffered row over a stream.
#[derive(Debug)]
pub struct SourceCursor {
    stream: FeatureStream,
    head: Option<Feature>,
    exhausted: bool,
    consumed: usize,
}

impl SourceCursor {
    pub fn new(stream: FeatureStream) -> Self {
        Self {
            stream,
            head: None,
            exhausted: false,
            consumed: 0,
        }
    }

    #[inline]
    pub fn schema(&self) -> &Arc<Schema> {
        self.stream.schema()
    }

    fn fill(&mut self) -> Result<()> {
        if self.head.is_none() && !self.exhausted {
            match self.stream.next() {
                Some(item) => self.head = Some(item?),
                None => self.exhausted = true,
            }
        }
        Ok(())
    }

    /// Look at the next feature without consuming it.
    #[inline]
    pub fn peek(&mut self) -> Result<Option<&Feature>> {
        self.fill()?;
        Ok(self.head.as_ref())
    }

    /// The feature already buffered by a previous [`peek`](Self::peek), if any.
    ///
    /// Never pulls from the input.
    #[inline]
    pub fn buffered(&self) -> Option<&Feature> {
        self.head.as_ref()
    }

    /// Consume and return the next feature.
    #[inline]
    pub fn take(&mut self) -> Result<Option<Feature>> {
        self.fill()?;
        let head = self.head.take();
        if head.is_some() {
            self.consumed += 1;
        }
        Ok(head)
    }

    /// True once the input has no more features.
    #[inline]
    pub fn is_exhausted(&mut self) -> Result<bool> {
        self.fill()?;
        Ok(self.head.is_none())
    }

    /// Number of features consumed so far.
    #[inline]
    pub fn consumed(&self) -> usize {
        self.consumed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StreamError;

    #[test]
    fn test_cursor_peek_and_take() {
        let stream = FeatureStream::from_features(
            Schema::empty(),
            vec![Feature::span(1, 3), Feature::span(5, 9)],
        );
        let mut cursor = SourceCursor::new(stream);
        assert_eq!(cursor.buffered(), None);
        assert_eq!(cursor.peek().unwrap(), Some(&Feature::span(1, 3)));
        assert_eq!(cursor.peek().unwrap(), Some(&Feature::span(1, 3)));
        assert_eq!(cursor.buffered(), Some(&Feature::span(1, 3)));
        assert_eq!(cursor.take().unwrap(), Some(Feature::span(1, 3)));
        assert_eq!(cursor.take().unwrap(), Some(Feature::span(5, 9)));
        assert!(cursor.is_exhausted().unwrap());
        assert_eq!(cursor.take().unwrap(), None);
        assert_eq!(cursor.consumed(), 2);
    }

    #[test]
    fn test_cursor_forwards_errors() {
        let stream = FeatureStream::new(
            Schema::empty(),
            vec![Err(StreamError::argument("broken producer"))],
        );
        let mut cursor = SourceCursor::new(stream);
        assert!(cursor.peek().is_err());
    }
}
