/// Byte-offset ranges
///
/// All source positions in Veneer are byte offsets. A `Range` is half-open:
/// `start` is inclusive, `end` is exclusive.

/// A half-open [start, end) byte range within a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Range {
    /// Start byte offset (inclusive)
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
}

impl Range {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "range start must not exceed end");
        Range { start, end }
    }

    /// A zero-length range anchored at `offset`.
    pub fn empty_at(offset: usize) -> Self {
        Range {
            start: offset,
            end: offset,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `offset` falls inside this range. Empty ranges contain only
    /// their own anchor offset.
    pub fn contains(&self, offset: usize) -> bool {
        if self.is_empty() {
            offset == self.start
        } else {
            offset >= self.start && offset < self.end
        }
    }

    /// Whether `other` is fully inside this range.
    pub fn contains_range(&self, other: Range) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    /// Whether the two ranges share at least one offset. A directive's empty
    /// area still intersects a diagnostic range that covers its anchor.
    pub fn intersects(&self, other: Range) -> bool {
        if self.is_empty() {
            return other.contains(self.start);
        }
        if other.is_empty() {
            return self.contains(other.start);
        }
        self.start < other.end && other.start < self.end
    }

    /// The same range shifted forward by `delta` bytes.
    pub fn shifted(&self, delta: usize) -> Range {
        Range {
            start: self.start + delta,
            end: self.end + delta,
        }
    }
}
