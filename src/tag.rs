//! Boundary tags.
//!
//! Every block carries the same `size | allocated` word twice: once as its
//! header and once as its footer. The footer lets a block find its left
//! neighbor in O(1): the word just before a header is the previous block's
//! footer.

use crate::align::{ALIGNMENT, WORD_SIZE};

/// Header and footer together.
pub const TAG_OVERHEAD: usize = 2 * WORD_SIZE;

/// A decoded boundary tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tag {
  pub size: usize,
  pub allocated: bool,
}

impl Tag {
  pub fn new(
    size: usize,
    allocated: bool,
  ) -> Self {
    Self { size, allocated }
  }

  /// Packs the allocated flag into the low bit of the size. Sizes are
  /// multiples of [`ALIGNMENT`], so that bit is always spare.
  pub fn encode(self) -> usize {
    debug_assert_eq!(self.size % ALIGNMENT, 0, "unaligned block size {}", self.size);
    self.size | self.allocated as usize
  }

  pub fn decode(word: usize) -> Self {
    Self {
      size: word & !(ALIGNMENT - 1),
      allocated: word & 1 == 1,
    }
  }
}

/// Reads the native-endian 64-bit word at `offset`.
///
/// # Panics
///
/// Panics if the word does not lie entirely inside `heap`.
pub fn read_word(
  heap: &[u8],
  offset: usize,
) -> usize {
  let mut raw = [0u8; WORD_SIZE];
  raw.copy_from_slice(&heap[offset..offset + WORD_SIZE]);
  u64::from_ne_bytes(raw) as usize
}

/// Writes `word` at `offset`.
///
/// # Panics
///
/// Panics if the word does not lie entirely inside `heap`.
pub fn write_word(
  heap: &mut [u8],
  offset: usize,
  word: usize,
) {
  heap[offset..offset + WORD_SIZE].copy_from_slice(&(word as u64).to_ne_bytes());
}

pub fn read_header(
  heap: &[u8],
  block: usize,
) -> Tag {
  Tag::decode(read_word(heap, block))
}

/// Offset of the footer of a block of `size` bytes starting at `block`.
pub fn footer_offset(
  block: usize,
  size: usize,
) -> usize {
  block + size - WORD_SIZE
}

pub fn read_footer(
  heap: &[u8],
  block: usize,
  size: usize,
) -> Tag {
  Tag::decode(read_word(heap, footer_offset(block, size)))
}

/// Writes the same tag as header and footer of the block at `block`.
pub fn write_tags(
  heap: &mut [u8],
  block: usize,
  tag: Tag,
) {
  let word = tag.encode();
  write_word(heap, block, word);
  write_word(heap, footer_offset(block, tag.size), word);
}
