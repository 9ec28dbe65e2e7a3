//! Tape-cell allocation. The allocator is monotonic within one lowering:
//! cells are never freed or reused, so every live interval stays valid for
//! the life of the compilation and temporaries consume tape permanently.

use hashbrown::HashMap;

use crate::codegen::layout::USER_SPACE_START;

/// A half-open `[start, start + length)` block of tape cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: usize,
    pub length: usize,
}

impl Interval {
    fn overlaps(self, other: Interval) -> bool {
        self.start < other.start + other.length && other.start < self.start + self.length
    }
}

#[derive(Debug)]
pub struct CellAllocator {
    /// High-water mark: the first candidate position for the next probe.
    next: usize,
    live: Vec<Interval>,
    bindings: HashMap<String, usize>,
}

impl Default for CellAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl CellAllocator {
    pub fn new() -> Self {
        Self::with_base(USER_SPACE_START)
    }

    pub fn with_base(base: usize) -> Self {
        Self {
            next: base,
            live: Vec::new(),
            bindings: HashMap::new(),
        }
    }

    /// Reserves the lowest non-overlapping block of `length` cells at or
    /// after the base address. Linear probing against the live set is plenty
    /// at the tape sizes involved.
    pub fn allocate(&mut self, length: usize) -> usize {
        debug_assert!(length >= 1);

        let mut candidate = Interval {
            start: self.next,
            length,
        };
        while self.live.iter().any(|live| live.overlaps(candidate)) {
            candidate.start += 1;
        }

        self.live.push(candidate);
        self.next = self.next.max(candidate.start + length);
        candidate.start
    }

    /// Returns the cell bound to `name`, allocating and binding a fresh
    /// scalar cell on first reference.
    pub fn variable(&mut self, name: &str) -> usize {
        if let Some(&cell) = self.bindings.get(name) {
            return cell;
        }

        let cell = self.allocate(1);
        self.bindings.insert(name.to_owned(), cell);
        cell
    }

    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.bindings.get(name).copied()
    }

    pub fn live_intervals(&self) -> &[Interval] {
        &self.live
    }

    pub fn into_bindings(self) -> HashMap<String, usize> {
        self.bindings
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn allocations_start_at_the_base() {
        let mut allocator = CellAllocator::new();
        assert_eq!(allocator.allocate(1), USER_SPACE_START);
        assert_eq!(allocator.allocate(1), USER_SPACE_START + 1);
    }

    #[test]
    fn blocks_and_scalars_never_overlap() {
        let mut allocator = CellAllocator::new();
        allocator.allocate(4);
        allocator.allocate(1);
        allocator.allocate(7);
        allocator.allocate(2);

        let live = allocator.live_intervals();
        for (i, a) in live.iter().enumerate() {
            for b in &live[i + 1..] {
                assert!(
                    a.start + a.length <= b.start || b.start + b.length <= a.start,
                    "{a:?} overlaps {b:?}"
                );
            }
        }
    }

    #[test]
    fn variable_bindings_are_stable() {
        let mut allocator = CellAllocator::new();
        let first = allocator.variable("x");
        allocator.allocate(3);
        let second = allocator.variable("x");
        assert_eq!(first, second);
        assert_eq!(allocator.lookup("x"), Some(first));
        assert_eq!(allocator.lookup("y"), None);
    }
}
