//! Boundary tag words.
//!
//! Every block begins with a header word and ends with a footer word, and
//! both carry the same encoding:
//!
//! ```text
//!      63                          4  3  2  1  0
//!     ┌─────────────────────────────────────────┐
//!     │ s  s  s  s  ...  s  s  s  s  0  0  0  a │
//!     └─────────────────────────────────────────┘
//! ```
//!
//! The `s` bits hold the total block size in bytes (header, payload, footer).
//! Sizes are always multiples of 16, so the low four bits are free for flags;
//! bit 0 (`a`) is set iff the block is allocated.

use std::mem;

/// The tag word type. Headers and footers are single words.
pub(crate) type Word = u64;

/// Word size (bytes); also the size of a header or footer.
pub(crate) const WSIZE: usize = mem::size_of::<Word>();

/// Double word size (bytes); the block size granule and payload alignment.
pub(crate) const DSIZE: usize = 2 * WSIZE;

/// Minimum usable block size: header, two free-list link words, footer.
pub(crate) const MIN_BLOCK_SIZE: usize = 4 * WSIZE;

/// Default heap extension request (bytes), a multiple of [`DSIZE`].
pub(crate) const CHUNKSIZE: usize = 1 << 12;

/// Mask selecting the allocation flag of a tag word.
const ALLOC_MASK: Word = 0x1;

/// Mask selecting the size bits of a tag word.
const SIZE_MASK: Word = !(0xF as Word);

/// Builds a tag word for a block of the given size and allocation status.
pub(crate) fn pack(
  size: usize,
  alloc: bool,
) -> Word {
  debug_assert_eq!(size & 0xF, 0, "block sizes are multiples of {DSIZE}");

  if alloc {
    size as Word | ALLOC_MASK
  } else {
    size as Word
  }
}

/// Returns the block size encoded in a tag word.
pub(crate) fn extract_size(word: Word) -> usize {
  (word & SIZE_MASK) as usize
}

/// Returns whether a tag word marks its block as allocated.
pub(crate) fn extract_alloc(word: Word) -> bool {
  word & ALLOC_MASK != 0
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pack_sets_only_the_alloc_bit() {
    assert_eq!(pack(48, false), 48);
    assert_eq!(pack(48, true), 49);
    assert_eq!(pack(0, true), 1);
  }

  #[test]
  fn extract_recovers_size_and_status() {
    let word = pack(4096, true);
    assert_eq!(extract_size(word), 4096);
    assert!(extract_alloc(word));

    let word = pack(MIN_BLOCK_SIZE, false);
    assert_eq!(extract_size(word), MIN_BLOCK_SIZE);
    assert!(!extract_alloc(word));
  }

  #[test]
  fn sentinel_word_is_zero_size_allocated() {
    let word = pack(0, true);
    assert_eq!(extract_size(word), 0);
    assert!(extract_alloc(word));
  }
}
