//! Fixed-size bit set of slot indices.

const WORD_BITS: usize = u64::BITS as usize;

/// Set of slot indices parked on one slot, one bit per table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaiterSet {
    words: Box<[u64]>,
}

impl WaiterSet {
    /// Create an empty set able to hold indices below `capacity`.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity.div_ceil(WORD_BITS)].into_boxed_slice(),
        }
    }

    /// Add `index`. Returns `false` if it was already present.
    pub fn insert(&mut self, index: usize) -> bool {
        let (word, mask) = Self::locate(index);
        let absent = self.words[word] & mask == 0;
        self.words[word] |= mask;
        absent
    }

    /// Whether `index` is in the set.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        let (word, mask) = Self::locate(index);
        self.words.get(word).is_some_and(|w| w & mask != 0)
    }

    /// Number of indices in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Remove every index.
    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    /// Indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words
            .iter()
            .enumerate()
            .flat_map(|(i, &word)| Bits { word, base: i * WORD_BITS })
    }

    const fn locate(index: usize) -> (usize, u64) {
        (index / WORD_BITS, 1 << (index % WORD_BITS))
    }
}

struct Bits {
    word: u64,
    base: usize,
}

impl Iterator for Bits {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.word == 0 {
            return None;
        }
        let bit = self.word.trailing_zeros() as usize;
        self.word &= self.word - 1;
        Some(self.base + bit)
    }
}
