//! Allocator error types.

use std::error::Error;
use std::fmt;

/// Errors surfaced by the arena and the allocator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AllocError {
  /// The arena could not grow by the requested amount.
  OutOfMemory {
    /// Number of bytes requested from the arena.
    requested: usize,
    /// Bytes still available before the arena limit.
    available: usize,
  },
  /// The arena could not reserve its backing region.
  MapFailed {
    /// Length of the reservation in bytes.
    len: usize,
    /// `errno` reported by the mapping call.
    errno: i32,
  },
  /// A handle passed to `release` does not name a live allocation.
  InvalidRelease {
    /// Payload offset carried by the handle.
    offset: usize,
    /// What the validation found.
    reason: &'static str,
  },
}

impl fmt::Display for AllocError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      Self::OutOfMemory {
        requested,
        available,
      } => {
        write!(
          f,
          "out of memory: requested {requested} bytes, {available} bytes available"
        )
      }
      Self::MapFailed { len, errno } => {
        write!(f, "failed to map {len} bytes (errno {errno})")
      }
      Self::InvalidRelease { offset, reason } => {
        write!(f, "invalid release at offset {offset}: {reason}")
      }
    }
  }
}

impl Error for AllocError {}

/// The first broken heap invariant found by
/// [`ExplicitAllocator::check_heap`](crate::ExplicitAllocator::check_heap).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeapViolation {
  /// A block or payload offset is not a multiple of the alignment unit.
  Misaligned { offset: usize },
  /// A block is smaller than the minimum block size.
  TooSmall { offset: usize, size: usize },
  /// Header and footer of a block disagree.
  TagMismatch {
    offset: usize,
    header: usize,
    footer: usize,
  },
  /// A block extends past the end of the arena.
  Overrun {
    offset: usize,
    size: usize,
    heap_size: usize,
  },
  /// Two address-adjacent blocks are both free.
  AdjacentFree { left: usize, right: usize },
  /// The free list reaches a block whose allocated bit is set.
  FreeListAllocated { offset: usize },
  /// A free-list link points outside the heap, or `next.prev` does not
  /// point back.
  FreeListBrokenLink { offset: usize },
  /// The free list and the heap walk disagree on the number of free blocks.
  FreeListCount { in_list: usize, in_heap: usize },
}

impl fmt::Display for HeapViolation {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      Self::Misaligned { offset } => write!(f, "misaligned block at offset {offset}"),
      Self::TooSmall { offset, size } => {
        write!(f, "block at offset {offset} is too small ({size} bytes)")
      }
      Self::TagMismatch {
        offset,
        header,
        footer,
      } => {
        write!(
          f,
          "block at offset {offset}: header {header:#x} does not match footer {footer:#x}"
        )
      }
      Self::Overrun {
        offset,
        size,
        heap_size,
      } => {
        write!(
          f,
          "block at offset {offset} of {size} bytes overruns the heap ({heap_size} bytes)"
        )
      }
      Self::AdjacentFree { left, right } => {
        write!(f, "adjacent free blocks at offsets {left} and {right}")
      }
      Self::FreeListAllocated { offset } => {
        write!(f, "allocated block at offset {offset} is on the free list")
      }
      Self::FreeListBrokenLink { offset } => {
        write!(f, "broken free-list link at offset {offset}")
      }
      Self::FreeListCount { in_list, in_heap } => {
        write!(
          f,
          "free list holds {in_list} blocks but the heap has {in_heap} free blocks"
        )
      }
    }
  }
}

impl Error for HeapViolation {}
