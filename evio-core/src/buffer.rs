//! Bounded staging buffer for raw records.

use crate::parser;

/// A reusable buffer holding one raw record at a time.
///
/// The buffer is allocated once with a fixed word capacity and overwritten by
/// every read. It never grows: words beyond the capacity are refused, so a
/// record whose declared length exceeds the capacity is only ever staged as a
/// prefix.
#[derive(Debug, Clone)]
pub struct RecordBuffer {
    words: Vec<u32>,
    capacity: usize,
}

impl RecordBuffer {
    /// Creates an empty buffer able to hold `capacity` words.
    pub fn new(capacity: usize) -> Self {
        Self {
            words: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Maximum number of words this buffer can stage.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Discards the staged record.
    #[inline]
    pub fn clear(&mut self) {
        self.words.clear();
    }

    /// Appends one word. Returns `false` if the buffer is full.
    #[inline]
    pub fn push(&mut self, word: u32) -> bool {
        if self.words.len() >= self.capacity {
            return false;
        }
        self.words.push(word);
        true
    }

    /// Replaces the staged record with as much of `record` as fits.
    ///
    /// Returns the number of words staged.
    pub fn load(&mut self, record: &[u32]) -> usize {
        self.words.clear();
        let n = record.len().min(self.capacity);
        self.words.extend_from_slice(&record[..n]);
        n
    }

    /// The staged words.
    #[inline]
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Record length declared by word 0, or `None` if nothing is staged.
    #[inline]
    pub fn declared_len(&self) -> Option<u64> {
        self.words
            .get(parser::LENGTH_WORD)
            .map(|&w| parser::record_length(w))
    }
}
