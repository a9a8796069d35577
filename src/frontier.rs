//! Double-buffered frontier queues
//!
//! Each device slice owns one [`Frontier`]: an input queue that the current
//! Advance reads and an output queue that Advance/Filter/Exchange write. The
//! two swap roles at the end of every iteration. Capacity is fixed when the
//! frontier is allocated; a write that would exceed it is refused whole.

use std::fmt;

/// A write would have exceeded the frontier capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityExceeded {
    /// Items the write needed room for
    pub required: usize,
    /// Allocated capacity
    pub capacity: usize,
}

impl fmt::Display for CapacityExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} items exceed frontier capacity {}",
            self.required, self.capacity
        )
    }
}

/// Pair of vertex queues alternating between input and output
#[derive(Debug, Clone)]
pub struct Frontier<V> {
    queues: [Vec<V>; 2],
    input: usize,
    capacity: usize,
}

impl<V: Copy> Frontier<V> {
    /// Frontier whose queues hold at most `capacity` items each
    ///
    /// Host storage grows on demand; the capacity is the device limit.
    #[must_use]
    pub const fn with_capacity(capacity: usize) -> Self {
        Self {
            queues: [Vec::new(), Vec::new()],
            input: 0,
            capacity,
        }
    }

    /// Queue capacity for a graph with `edge_count` edges
    ///
    /// `ceil(factor * edge_count)`, never less than one item.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn capacity_for(edge_count: usize, factor: f64) -> usize {
        let scaled = (factor * edge_count as f64).ceil();
        if scaled >= usize::MAX as f64 {
            usize::MAX
        } else {
            (scaled as usize).max(1)
        }
    }

    /// Device bytes for both queues at `capacity`
    #[must_use]
    pub const fn bytes_for(capacity: usize) -> usize {
        capacity.saturating_mul(2 * std::mem::size_of::<V>())
    }

    /// Capacity of each queue
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current input queue
    #[must_use]
    pub fn input(&self) -> &[V] {
        &self.queues[self.input]
    }

    /// Current output queue
    #[must_use]
    pub fn output(&self) -> &[V] {
        &self.queues[1 - self.input]
    }

    /// Items in the input queue
    #[must_use]
    pub fn len(&self) -> usize {
        self.input().len()
    }

    /// Whether the input queue is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.input().is_empty()
    }

    /// Empty both queues
    pub fn clear(&mut self) {
        self.queues[0].clear();
        self.queues[1].clear();
        self.input = 0;
    }

    /// Replace the frontier with `items` as the input queue
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` (and leaves the frontier empty) if `items`
    /// does not fit
    pub fn seed(&mut self, items: &[V]) -> Result<(), CapacityExceeded> {
        self.clear();
        self.check(items.len())?;
        self.queues[self.input].extend_from_slice(items);
        Ok(())
    }

    /// Replace the output queue with the concatenation of `chunks`
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` without touching the queue if the chunks
    /// hold more than `capacity` items
    pub fn write_output(&mut self, chunks: &[Vec<V>]) -> Result<(), CapacityExceeded> {
        let required = chunks.iter().map(Vec::len).sum();
        self.check(required)?;
        let output = &mut self.queues[1 - self.input];
        output.clear();
        for chunk in chunks {
            output.extend_from_slice(chunk);
        }
        Ok(())
    }

    /// Append `items` to the output queue
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` without touching the queue if the result
    /// would hold more than `capacity` items
    pub fn append_output(&mut self, items: &[V]) -> Result<(), CapacityExceeded> {
        let required = self.output().len() + items.len();
        self.check(required)?;
        self.queues[1 - self.input].extend_from_slice(items);
        Ok(())
    }

    /// Make the output the next input; the new output starts empty
    pub fn swap(&mut self) {
        self.input = 1 - self.input;
        self.queues[1 - self.input].clear();
    }

    const fn check(&self, required: usize) -> Result<(), CapacityExceeded> {
        if required > self.capacity {
            Err(CapacityExceeded {
                required,
                capacity: self.capacity,
            })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_for() {
        assert_eq!(Frontier::<u32>::capacity_for(10, 1.0), 10);
        assert_eq!(Frontier::<u32>::capacity_for(10, 0.25), 3);
        assert_eq!(Frontier::<u32>::capacity_for(0, 1.0), 1);
        assert_eq!(Frontier::<u32>::capacity_for(3, 0.01), 1);
        assert_eq!(Frontier::<u64>::bytes_for(4), 64);
    }

    #[test]
    fn test_seed_and_swap() {
        let mut frontier = Frontier::<u32>::with_capacity(4);
        frontier.seed(&[3]).unwrap();
        assert_eq!(frontier.input(), &[3]);
        assert!(frontier.output().is_empty());

        frontier.write_output(&[vec![1, 2], vec![4]]).unwrap();
        frontier.swap();
        assert_eq!(frontier.input(), &[1, 2, 4]);
        assert!(frontier.output().is_empty());
        assert_eq!(frontier.len(), 3);
    }

    #[test]
    fn test_overflow_never_truncates() {
        let mut frontier = Frontier::<u32>::with_capacity(2);
        frontier.write_output(&[vec![7]]).unwrap();

        let err = frontier.write_output(&[vec![1, 2], vec![3]]).unwrap_err();
        assert_eq!(
            err,
            CapacityExceeded {
                required: 3,
                capacity: 2
            }
        );
        assert_eq!(frontier.output(), &[7]);

        let err = frontier.append_output(&[8, 9]).unwrap_err();
        assert_eq!(err.required, 3);
        assert_eq!(frontier.output(), &[7]);

        frontier.append_output(&[8]).unwrap();
        assert_eq!(frontier.output(), &[7, 8]);
    }

    #[test]
    fn test_seed_overflow_leaves_empty() {
        let mut frontier = Frontier::<u32>::with_capacity(1);
        assert!(frontier.seed(&[0, 1]).is_err());
        assert!(frontier.is_empty());
    }
}
