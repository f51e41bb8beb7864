//! # Occupancy Bitmap
//!
//! Fixed-length bitset marking which slots of a pool page hold a live value.
//! 64 slots per `u64` word.

/// Fixed-length occupancy bitmap.
///
/// ## Performance
///
/// - Set / clear / test: O(1)
/// - Iterate occupied: O(words + occupied)
#[derive(Clone, Debug)]
pub struct OccupancyBits {
    /// 1 = occupied, 0 = free. 64 slots per word.
    words: Box<[u64]>,
    /// Number of slots tracked.
    len: usize,
    /// Cached count of set bits.
    count: usize,
}

impl OccupancyBits {
    /// Creates a bitmap of `len` cleared bits.
    #[must_use]
    pub fn new(len: usize) -> Self {
        let word_count = len.div_ceil(64);
        Self {
            words: vec![0u64; word_count].into_boxed_slice(),
            len,
            count: 0,
        }
    }

    /// Number of slots tracked.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the bitmap tracks zero slots.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of set bits.
    #[inline]
    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Tests a bit. Out-of-range indices read as clear.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        (self.words[index / 64] >> (index % 64)) & 1 == 1
    }

    /// Sets a bit. Returns `true` if it was previously clear.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    #[inline]
    pub fn set(&mut self, index: usize) -> bool {
        assert!(index < self.len, "occupancy index {index} out of range {}", self.len);
        let word = &mut self.words[index / 64];
        let mask = 1u64 << (index % 64);
        let was_clear = *word & mask == 0;
        *word |= mask;
        if was_clear {
            self.count += 1;
        }
        was_clear
    }

    /// Clears a bit. Returns `true` if it was previously set.
    #[inline]
    pub fn clear(&mut self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        let word = &mut self.words[index / 64];
        let mask = 1u64 << (index % 64);
        let was_set = *word & mask != 0;
        *word &= !mask;
        if was_set {
            self.count -= 1;
        }
        was_set
    }

    /// Iterates over set bit indices in ascending order.
    pub fn iter(&self) -> OccupiedIter<'_> {
        OccupiedIter {
            words: &self.words,
            word_idx: 0,
            current_word: self.words.first().copied().unwrap_or(0),
        }
    }
}

/// Iterator over set indices of an [`OccupancyBits`].
pub struct OccupiedIter<'a> {
    words: &'a [u64],
    word_idx: usize,
    current_word: u64,
}

impl Iterator for OccupiedIter<'_> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current_word != 0 {
                let bit = self.current_word.trailing_zeros() as usize;
                // Clear lowest set bit
                self.current_word &= self.current_word - 1;
                return Some(self.word_idx * 64 + bit);
            }

            self.word_idx += 1;
            if self.word_idx >= self.words.len() {
                return None;
            }
            self.current_word = self.words[self.word_idx];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_clear() {
        let mut bits = OccupancyBits::new(100);
        assert!(!bits.get(70));

        assert!(bits.set(70));
        assert!(!bits.set(70));
        assert!(bits.get(70));
        assert_eq!(bits.count(), 1);

        assert!(bits.clear(70));
        assert!(!bits.clear(70));
        assert!(!bits.get(70));
        assert_eq!(bits.count(), 0);
    }

    #[test]
    fn test_out_of_range_reads_clear() {
        let bits = OccupancyBits::new(10);
        assert!(!bits.get(10));
        assert!(!bits.get(1000));
    }

    #[test]
    fn test_iter_crosses_words() {
        let mut bits = OccupancyBits::new(200);
        for i in [0, 63, 64, 130, 199] {
            bits.set(i);
        }
        let collected: Vec<usize> = bits.iter().collect();
        assert_eq!(collected, vec![0, 63, 64, 130, 199]);
    }
}
