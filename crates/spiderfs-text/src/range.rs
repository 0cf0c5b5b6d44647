//! One-based inclusive line ranges.

use std::fmt;

use serde::Serialize;

use crate::error::TextError;

/// Closed interval of one-based line numbers.
///
/// Construction validates `1 <= start <= end`; bounds against a concrete file
/// are checked later by [`LineIndex::resolve`](crate::LineIndex::resolve).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LineRange {
    start: usize,
    end: usize,
}

impl LineRange {
    /// Builds a range, rejecting zero-based or inverted bounds.
    ///
    /// # Errors
    ///
    /// Returns [`TextError::InvalidRange`] when `start` is zero or exceeds
    /// `end`.
    pub const fn new(start: usize, end: usize) -> Result<Self, TextError> {
        if start == 0 || end < start {
            return Err(TextError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Range covering exactly one line.
    ///
    /// # Errors
    ///
    /// Returns [`TextError::InvalidRange`] when `line` is zero.
    pub const fn single(line: usize) -> Result<Self, TextError> {
        Self::new(line, line)
    }

    /// First line of the range.
    #[must_use]
    pub const fn start(&self) -> usize {
        self.start
    }

    /// Last line of the range.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.end
    }

    /// Number of lines covered.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Always false; a valid range covers at least one line.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Returns true when the two ranges share at least one line.
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A [`LineRange`] after it has been checked against a concrete file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedRange {
    start: usize,
    end: usize,
    clamped: bool,
}

impl ResolvedRange {
    pub(crate) const fn new(start: usize, end: usize, clamped: bool) -> Self {
        Self {
            start,
            end,
            clamped,
        }
    }

    /// First line actually covered.
    #[must_use]
    pub const fn start(&self) -> usize {
        self.start
    }

    /// Last line actually covered, after clamping.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.end
    }

    /// True when the requested end lay beyond the file and was pulled in.
    #[must_use]
    pub const fn clamped(&self) -> bool {
        self.clamped
    }

    /// Number of lines covered.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Always false; a resolved range covers at least one line.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, 1)]
    #[case(3, 2)]
    #[case(0, 0)]
    fn rejects_malformed_bounds(#[case] start: usize, #[case] end: usize) {
        let error = LineRange::new(start, end).expect_err("range should be rejected");
        assert!(matches!(error, TextError::InvalidRange { .. }));
    }

    #[rstest]
    #[case((1, 2), (2, 3), true)]
    #[case((1, 2), (3, 4), false)]
    #[case((5, 5), (1, 9), true)]
    fn detects_overlap(
        #[case] left: (usize, usize),
        #[case] right: (usize, usize),
        #[case] expected: bool,
    ) {
        let a = LineRange::new(left.0, left.1).expect("valid range");
        let b = LineRange::new(right.0, right.1).expect("valid range");
        assert_eq!(a.overlaps(&b), expected);
        assert_eq!(b.overlaps(&a), expected);
    }
}
