//! Low-level field extraction from EVIO 32-bit words.
//!
//! These helpers only decode bits; bounds and capacity checks live in the
//! classifier.

// ============================================================================
// Event header, word 0
// Bits: [31:0] length - 1 (words following the length word)
// ============================================================================

/// Index of the length word.
pub const LENGTH_WORD: usize = 0;

/// Decodes the total record length in words from word 0.
#[inline]
pub fn record_length(word: u32) -> u64 {
    word as u64 + 1
}

// ============================================================================
// Event header, word 1
// Bits: [31:16] tag | [15:8] data type | [7:0] num
// ============================================================================

/// Index of the tag word.
pub const TAG_WORD: usize = 1;

/// Extracts the 16-bit tag from the second header word.
#[inline]
pub fn header_tag(word: u32) -> u16 {
    (word >> 16) as u16
}

// ============================================================================
// v2 physics events, word 4
// Bits: [31:0] event number
// ============================================================================

/// Index of the event number word in v2 physics events.
pub const EVENT_NUMBER_WORD: usize = 4;

// ============================================================================
// EVIO v1-3 block header
// [0] block size | [1] block number | [2] header length | [3] first event
// [4] words used | [5] version (bits 7:0) | [6] reserved | [7] magic
// ============================================================================

/// Number of words in a block header.
pub const BLOCK_HEADER_WORDS: usize = 8;

/// Magic number stored in the last word of every block header.
pub const BLOCK_MAGIC: u32 = 0xc0da_0100;

pub const BLOCK_SIZE: usize = 0;
pub const BLOCK_NUMBER: usize = 1;
pub const BLOCK_HEADER_LENGTH: usize = 2;
pub const BLOCK_USED: usize = 4;
pub const BLOCK_VERSION: usize = 5;
pub const BLOCK_MAGIC_WORD: usize = 7;

/// Extracts the format version from the block header version word.
#[inline]
pub fn block_version(word: u32) -> u32 {
    word & 0xFF
}
