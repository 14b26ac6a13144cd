//! Fixed-width bit set with named scan operations.
//!
//! All bit twiddling in the crate lives here: the binding cache only ever asks
//! for "highest set bit", "next set bit" or "next run of set bits".

use std::fmt;

/// A bit set of `W * 64` bits backed by an array of words.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitSet<const W: usize> {
    words: [u64; W],
}

/// Bit set wide enough for every root parameter of a layout.
pub type ParamSet = BitSet<1>;

/// Bit set wide enough for every slot of the shadow cache.
pub type SlotSet = BitSet<4>;

impl<const W: usize> BitSet<W> {
    /// Number of bits the set can hold.
    pub const BITS: usize = W * 64;

    /// Create an empty set.
    pub const fn new() -> Self {
        Self { words: [0; W] }
    }

    /// Create a set from its raw words (lowest bits first).
    pub const fn from_words(words: [u64; W]) -> Self {
        Self { words }
    }

    #[inline]
    fn split(bit: usize) -> (usize, u64) {
        debug_assert!(bit < Self::BITS, "bit {} out of range for {} bits", bit, Self::BITS);
        (bit / 64, 1u64 << (bit % 64))
    }

    /// Set a bit.
    pub fn insert(&mut self, bit: usize) {
        let (word, mask) = Self::split(bit);
        self.words[word] |= mask;
    }

    /// Set `len` consecutive bits starting at `start`.
    pub fn insert_range(&mut self, start: usize, len: usize) {
        debug_assert!(start + len <= Self::BITS);
        let end = start + len;
        let mut bit = start;
        while bit < end {
            let word = bit / 64;
            let lo = bit % 64;
            let hi = (end - word * 64).min(64);
            let width = hi - lo;
            let mask = if width == 64 { u64::MAX } else { ((1u64 << width) - 1) << lo };
            self.words[word] |= mask;
            bit = word * 64 + hi;
        }
    }

    /// Clear a bit.
    pub fn remove(&mut self, bit: usize) {
        let (word, mask) = Self::split(bit);
        self.words[word] &= !mask;
    }

    /// Check whether a bit is set.
    pub fn contains(&self, bit: usize) -> bool {
        if bit >= Self::BITS {
            return false;
        }
        let (word, mask) = Self::split(bit);
        self.words[word] & mask != 0
    }

    /// Clear every bit.
    pub fn clear(&mut self) {
        self.words = [0; W];
    }

    /// True if no bit is set.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Number of set bits.
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Lowest set bit.
    pub fn first_set(&self) -> Option<usize> {
        self.next_set(0)
    }

    /// Highest set bit.
    pub fn highest_set(&self) -> Option<usize> {
        self.words
            .iter()
            .enumerate()
            .rev()
            .find(|(_, &w)| w != 0)
            .map(|(i, &w)| i * 64 + 63 - w.leading_zeros() as usize)
    }

    /// First set bit at or after `from`.
    pub fn next_set(&self, from: usize) -> Option<usize> {
        if from >= Self::BITS {
            return None;
        }
        let mut word = from / 64;
        let mut bits = self.words[word] & (u64::MAX << (from % 64));
        loop {
            if bits != 0 {
                return Some(word * 64 + bits.trailing_zeros() as usize);
            }
            word += 1;
            if word == W {
                return None;
            }
            bits = self.words[word];
        }
    }

    /// First unset bit at or after `from`, or `BITS` if every remaining bit is set.
    pub fn next_unset(&self, from: usize) -> usize {
        if from >= Self::BITS {
            return Self::BITS;
        }
        let mut word = from / 64;
        let mut bits = !self.words[word] & (u64::MAX << (from % 64));
        loop {
            if bits != 0 {
                return word * 64 + bits.trailing_zeros() as usize;
            }
            word += 1;
            if word == W {
                return Self::BITS;
            }
            bits = !self.words[word];
        }
    }

    /// Iterate set bits in ascending order.
    pub fn iter(&self) -> Iter<'_, W> {
        Iter { set: self, next: 0 }
    }

    /// Iterate maximal runs of set bits as `(start, len)`, in ascending order.
    pub fn runs(&self) -> Runs<'_, W> {
        Runs { set: self, next: 0 }
    }
}

impl<const W: usize> Default for BitSet<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const W: usize> fmt::Debug for BitSet<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<const W: usize> FromIterator<usize> for BitSet<W> {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = Self::new();
        for bit in iter {
            set.insert(bit);
        }
        set
    }
}

/// Iterator over set bits.
pub struct Iter<'a, const W: usize> {
    set: &'a BitSet<W>,
    next: usize,
}

impl<'a, const W: usize> Iterator for Iter<'a, W> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let bit = self.set.next_set(self.next)?;
        self.next = bit + 1;
        Some(bit)
    }
}

/// Iterator over runs of set bits.
pub struct Runs<'a, const W: usize> {
    set: &'a BitSet<W>,
    next: usize,
}

impl<'a, const W: usize> Iterator for Runs<'a, W> {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<(usize, usize)> {
        let start = self.set.next_set(self.next)?;
        let end = self.set.next_unset(start);
        self.next = end;
        Some((start, end - start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highest_and_first() {
        let mut set = SlotSet::new();
        assert_eq!(set.highest_set(), None);
        assert_eq!(set.first_set(), None);

        set.insert(2);
        set.insert(10);
        set.insert(130);
        assert_eq!(set.first_set(), Some(2));
        assert_eq!(set.highest_set(), Some(130));
        assert_eq!(set.count(), 3);
    }

    #[test]
    fn test_runs_skip_gaps() {
        let set: SlotSet = [1, 2, 3, 5, 8, 9, 10].into_iter().collect();
        let runs: Vec<_> = set.runs().collect();
        assert_eq!(runs, vec![(1, 3), (5, 1), (8, 3)]);
    }

    #[test]
    fn test_runs_cross_word_boundary() {
        let mut set = SlotSet::new();
        set.insert_range(60, 10);
        set.insert(255);
        let runs: Vec<_> = set.runs().collect();
        assert_eq!(runs, vec![(60, 10), (255, 1)]);
        assert_eq!(set.next_unset(255), SlotSet::BITS);
    }

    #[test]
    fn test_insert_full_word_range() {
        let mut set = SlotSet::new();
        set.insert_range(64, 128);
        assert_eq!(set.count(), 128);
        assert!(!set.contains(63));
        assert!(set.contains(64));
        assert!(set.contains(191));
        assert!(!set.contains(192));
    }

    #[test]
    fn test_next_set_and_unset() {
        let set: ParamSet = [0, 1, 4].into_iter().collect();
        assert_eq!(set.next_set(2), Some(4));
        assert_eq!(set.next_set(5), None);
        assert_eq!(set.next_unset(0), 2);
        assert_eq!(set.next_unset(4), 5);
    }

    #[test]
    fn test_clear_and_remove() {
        let mut set: ParamSet = [3, 7].into_iter().collect();
        set.remove(3);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![7]);
        set.clear();
        assert!(set.is_empty());
        set.clear();
        assert!(set.is_empty());
    }
}
