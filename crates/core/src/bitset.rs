//! Word-based bit sets used for change-field tracking and active-row sets.
//!
//! Bits are stored little-endian within each `u64` word: bit 0 is the LSB of word 0.
//! The set grows on demand to hold the highest bit ever set; reading a bit beyond
//! the current length returns `false`. Iteration is always in ascending order, which
//! operators rely on when translating field ids.

use alloc::vec::Vec;

const WORD_BITS: usize = 64;

/// A growable set of small non-negative integers.
#[derive(Clone, Default)]
pub struct BitSet {
    words: Vec<u64>,
}

/// A set of field ids whose values changed in one notification.
pub type FieldBitSet = BitSet;

impl BitSet {
    /// Creates an empty bit set.
    pub fn new() -> Self {
        Self { words: Vec::new() }
    }

    /// Creates an empty bit set with room for `bits` bits before reallocating.
    pub fn with_capacity(bits: usize) -> Self {
        Self {
            words: Vec::with_capacity(bits.div_ceil(WORD_BITS)),
        }
    }

    /// Creates a bit set from the given bit positions.
    pub fn from_bits(bits: impl IntoIterator<Item = usize>) -> Self {
        let mut set = Self::new();
        for bit in bits {
            set.set(bit);
        }
        set
    }

    #[inline]
    fn ensure_word(&mut self, word: usize) {
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
    }

    /// Sets a bit. Returns true if the bit was previously unset.
    pub fn set(&mut self, bit: usize) -> bool {
        let word = bit / WORD_BITS;
        self.ensure_word(word);
        let mask = 1u64 << (bit % WORD_BITS);
        let was_set = self.words[word] & mask != 0;
        self.words[word] |= mask;
        !was_set
    }

    /// Unsets a bit. Returns true if the bit was previously set.
    pub fn unset(&mut self, bit: usize) -> bool {
        let word = bit / WORD_BITS;
        match self.words.get_mut(word) {
            Some(w) => {
                let mask = 1u64 << (bit % WORD_BITS);
                let was_set = *w & mask != 0;
                *w &= !mask;
                was_set
            }
            None => false,
        }
    }

    /// Returns whether a bit is set.
    #[inline]
    pub fn get(&self, bit: usize) -> bool {
        self.words
            .get(bit / WORD_BITS)
            .map(|w| w & (1u64 << (bit % WORD_BITS)) != 0)
            .unwrap_or(false)
    }

    /// Clears every bit, keeping the allocation.
    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    /// Returns true if no bit is set.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Returns the number of set bits.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Returns the highest set bit, if any.
    pub fn last_one(&self) -> Option<usize> {
        self.words
            .iter()
            .enumerate()
            .rev()
            .find(|(_, w)| **w != 0)
            .map(|(i, w)| i * WORD_BITS + (WORD_BITS - 1 - w.leading_zeros() as usize))
    }

    /// Returns true if any bit is set in both sets.
    pub fn intersects(&self, other: &BitSet) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(a, b)| a & b != 0)
    }

    /// Sets every bit that is set in `other`.
    pub fn union_with(&mut self, other: &BitSet) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a |= *b;
        }
    }

    /// Sets bits `0..len`.
    pub fn set_range(&mut self, len: usize) {
        for bit in 0..len {
            self.set(bit);
        }
    }

    /// Iterates set bits in ascending order.
    pub fn iter_ones(&self) -> Ones<'_> {
        Ones {
            words: &self.words,
            word_index: 0,
            current: self.words.first().copied().unwrap_or(0),
        }
    }
}

impl PartialEq for BitSet {
    fn eq(&self, other: &Self) -> bool {
        let (short, long) = if self.words.len() <= other.words.len() {
            (&self.words, &other.words)
        } else {
            (&other.words, &self.words)
        };
        short.iter().zip(long.iter()).all(|(a, b)| a == b)
            && long[short.len()..].iter().all(|w| *w == 0)
    }
}

impl Eq for BitSet {}

impl core::fmt::Debug for BitSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.iter_ones()).finish()
    }
}

impl FromIterator<usize> for BitSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self::from_bits(iter)
    }
}

/// Ascending iterator over the set bits of a [`BitSet`].
pub struct Ones<'a> {
    words: &'a [u64],
    word_index: usize,
    current: u64,
}

impl Iterator for Ones<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        loop {
            if self.current != 0 {
                let tz = self.current.trailing_zeros() as usize;
                self.current &= self.current - 1;
                return Some(self.word_index * WORD_BITS + tz);
            }
            self.word_index += 1;
            if self.word_index >= self.words.len() {
                return None;
            }
            self.current = self.words[self.word_index];
        }
    }
}
