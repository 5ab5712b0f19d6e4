//! Explicit free list.
//!
//! A circular doubly-linked list threaded through the payloads of free
//! blocks. Links are heap offsets of block headers. The sentinel is a
//! size-0 node that is always present; an empty list is a sentinel linked to
//! itself.
//!
//! ```text
//!   free block:
//!   ┌────────┬────────┬────────┬──────────────┬────────┐
//!   │ header │  next  │  prev  │     ...      │ footer │
//!   └────────┴────────┴────────┴──────────────┴────────┘
//!   +0       +8       +16                     +size-8
//! ```

use crate::align::{ALIGNMENT, WORD_SIZE};
use crate::align;
use crate::tag::{self, Tag};

const NEXT: usize = WORD_SIZE;
const PREV: usize = 2 * WORD_SIZE;

/// Bytes reserved for the sentinel node: a tag word and two links.
pub const SENTINEL_SIZE: usize = align!(3 * WORD_SIZE);

/// Smallest block that can later hold the links while free.
pub const MIN_BLOCK_SIZE: usize = align!(SENTINEL_SIZE + WORD_SIZE);

const _: () = assert!(MIN_BLOCK_SIZE % ALIGNMENT == 0);

/// Handle on the list. Holds only the sentinel offset; the nodes themselves
/// live in the heap bytes passed to every call.
#[derive(Clone, Copy, Debug)]
pub struct FreeList {
  sentinel: usize,
}

impl FreeList {
  /// Writes an empty list with its sentinel at `sentinel`.
  pub fn init(
    heap: &mut [u8],
    sentinel: usize,
  ) -> Self {
    tag::write_word(heap, sentinel, Tag::new(0, false).encode());
    let list = Self { sentinel };
    list.set_next(heap, sentinel, sentinel);
    list.set_prev(heap, sentinel, sentinel);
    list
  }

  pub fn sentinel(&self) -> usize {
    self.sentinel
  }

  pub fn next(
    &self,
    heap: &[u8],
    block: usize,
  ) -> usize {
    tag::read_word(heap, block + NEXT)
  }

  pub fn prev(
    &self,
    heap: &[u8],
    block: usize,
  ) -> usize {
    tag::read_word(heap, block + PREV)
  }

  fn set_next(
    &self,
    heap: &mut [u8],
    block: usize,
    next: usize,
  ) {
    tag::write_word(heap, block + NEXT, next);
  }

  fn set_prev(
    &self,
    heap: &mut [u8],
    block: usize,
    prev: usize,
  ) {
    tag::write_word(heap, block + PREV, prev);
  }

  #[cfg(test)]
  pub fn is_empty(
    &self,
    heap: &[u8],
  ) -> bool {
    self.next(heap, self.sentinel) == self.sentinel
  }

  /// Links `block` right after the sentinel.
  pub fn insert_front(
    &self,
    heap: &mut [u8],
    block: usize,
  ) {
    let first = self.next(heap, self.sentinel);

    self.set_next(heap, block, first);
    self.set_prev(heap, block, self.sentinel);
    self.set_prev(heap, first, block);
    self.set_next(heap, self.sentinel, block);
  }

  /// Unlinks `block`. Only valid while `block` is on the list.
  pub fn remove(
    &self,
    heap: &mut [u8],
    block: usize,
  ) {
    debug_assert_ne!(block, self.sentinel, "the sentinel is never removed");

    let next = self.next(heap, block);
    let prev = self.prev(heap, block);

    self.set_next(heap, prev, next);
    self.set_prev(heap, next, prev);
  }

  /// First block in list order whose size is at least `size`.
  pub fn find_fit(
    &self,
    heap: &[u8],
    size: usize,
  ) -> Option<usize> {
    self
      .iter(heap)
      .find(|&block| tag::read_header(heap, block).size >= size)
  }

  /// Free blocks in list order, sentinel excluded.
  pub fn iter<'a>(
    &self,
    heap: &'a [u8],
  ) -> Iter<'a> {
    Iter {
      heap,
      list: *self,
      current: self.next(heap, self.sentinel),
    }
  }
}

pub struct Iter<'a> {
  heap: &'a [u8],
  list: FreeList,
  current: usize,
}

impl Iterator for Iter<'_> {
  type Item = usize;

  fn next(&mut self) -> Option<usize> {
    if self.current == self.list.sentinel {
      return None;
    }

    let block = self.current;
    self.current = self.list.next(self.heap, block);
    Some(block)
  }
}
