//! Word-packed atomic bitset
//!
//! Dense alternative to `Vec<AtomicBool>` for visited sets and the
//! per-iteration duplicate filter.

use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};

const WORD_BITS: usize = 64;

/// Fixed-size atomic bitset
#[derive(Debug)]
pub struct AtomicBitset {
    bits: usize,
    words: Vec<AtomicU64>,
}

impl AtomicBitset {
    /// Bitset with `bits` bits, all cleared
    #[must_use]
    pub fn new(bits: usize) -> Self {
        let words = (0..bits.div_ceil(WORD_BITS))
            .map(|_| AtomicU64::new(0))
            .collect();
        Self { bits, words }
    }

    /// Bytes occupied by a bitset of `bits` bits
    #[must_use]
    pub const fn bytes_for(bits: usize) -> usize {
        bits.div_ceil(WORD_BITS) * std::mem::size_of::<u64>()
    }

    /// Number of bits
    #[must_use]
    pub const fn len(&self) -> usize {
        self.bits
    }

    /// Whether the bitset holds zero bits
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Clear every bit
    pub fn clear_all(&self) {
        self.words
            .par_iter()
            .for_each(|w| w.store(0, Ordering::Relaxed));
    }

    /// Whether `bit` is set
    ///
    /// # Panics
    ///
    /// Panics if `bit >= len()`
    #[must_use]
    pub fn is_set(&self, bit: usize) -> bool {
        assert!(bit < self.bits, "bit {bit} out of range {}", self.bits);
        let (word, mask) = word_mask(bit);
        self.words[word].load(Ordering::Acquire) & mask != 0
    }

    /// Set `bit`
    ///
    /// # Panics
    ///
    /// Panics if `bit >= len()`
    pub fn set(&self, bit: usize) {
        self.test_and_set(bit);
    }

    /// Set `bit`, returning `true` iff this call flipped it from 0 to 1
    ///
    /// # Panics
    ///
    /// Panics if `bit >= len()`
    pub fn test_and_set(&self, bit: usize) -> bool {
        assert!(bit < self.bits, "bit {bit} out of range {}", self.bits);
        let (word, mask) = word_mask(bit);
        self.words[word].fetch_or(mask, Ordering::AcqRel) & mask == 0
    }

    /// Number of set bits
    #[must_use]
    pub fn count_ones(&self) -> usize {
        self.words
            .iter()
            .map(|w| w.load(Ordering::Relaxed).count_ones() as usize)
            .sum()
    }
}

#[inline]
const fn word_mask(bit: usize) -> (usize, u64) {
    (bit / WORD_BITS, 1_u64 << (bit % WORD_BITS))
}
