//! Heap walking, consistency checking and statistics.

use std::collections::BTreeMap;
use std::fmt;

use crate::align::{ALIGNMENT, WORD_SIZE};
use crate::arena::Arena;
use crate::error::HeapViolation;
use crate::explicit::{ExplicitAllocator, Ptr};
use crate::free_list::MIN_BLOCK_SIZE;
use crate::tag::{self, TAG_OVERHEAD};

/// One block as seen by a heap walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
  pub offset: usize,
  pub size: usize,
  pub allocated: bool,
}

impl BlockInfo {
  /// Handle to the payload, when the block is allocated.
  pub fn ptr(&self) -> Option<Ptr> {
    if self.allocated {
      Ptr::from_offset(self.offset + WORD_SIZE)
    } else {
      None
    }
  }
}

/// Blocks in address order, starting after the sentinel.
#[derive(Clone)]
pub struct Blocks<'a> {
  heap: &'a [u8],
  offset: usize,
}

impl Iterator for Blocks<'_> {
  type Item = BlockInfo;

  fn next(&mut self) -> Option<BlockInfo> {
    if self.offset + WORD_SIZE > self.heap.len() {
      return None;
    }

    let header = tag::read_header(self.heap, self.offset);
    let block = BlockInfo {
      offset: self.offset,
      size: header.size,
      allocated: header.allocated,
    };

    // a zero size would never advance
    self.offset = match header.size {
      0 => self.heap.len(),
      size => self.offset + size,
    };

    Some(block)
  }
}

/// Totals over one heap walk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
  /// Arena size, sentinel included.
  pub heap_size: usize,
  pub allocated_blocks: usize,
  pub free_blocks: usize,
  /// Payload bytes of allocated blocks.
  pub allocated_bytes: usize,
  /// Whole-block bytes of free blocks.
  pub free_bytes: usize,
  pub largest_free: usize,
}

impl HeapStats {
  /// Fraction of the arena handed out as payload.
  pub fn utilization(&self) -> f64 {
    if self.heap_size == 0 {
      return 0.0;
    }
    self.allocated_bytes as f64 / self.heap_size as f64
  }
}

impl<A: Arena> ExplicitAllocator<A> {
  pub fn blocks(&self) -> Blocks<'_> {
    Blocks {
      heap: self.arena.bytes(),
      offset: self.first_block,
    }
  }

  /// Offsets of the blocks on the free list, in list order.
  pub fn free_blocks(&self) -> Vec<usize> {
    self.free_list.iter(self.arena.bytes()).collect()
  }

  pub fn stats(&self) -> HeapStats {
    let mut stats = HeapStats {
      heap_size: self.arena.size(),
      ..HeapStats::default()
    };

    for block in self.blocks() {
      if block.allocated {
        stats.allocated_blocks += 1;
        stats.allocated_bytes += block.size.saturating_sub(TAG_OVERHEAD);
      } else {
        stats.free_blocks += 1;
        stats.free_bytes += block.size;
        stats.largest_free = stats.largest_free.max(block.size);
      }
    }

    stats
  }

  /// Walks every block and the whole free list and reports the first broken
  /// invariant.
  pub fn check_heap(&self) -> Result<(), HeapViolation> {
    let heap = self.arena.bytes();
    let low = self.arena.low() as usize;

    // offset -> allocated, for every block start
    let mut blocks = BTreeMap::new();
    let mut previous_free = None;
    let mut free_in_heap = 0;
    let mut offset = self.first_block;

    while offset < heap.len() {
      if offset % ALIGNMENT != 0 || (low + offset + WORD_SIZE) % ALIGNMENT != 0 {
        return Err(HeapViolation::Misaligned { offset });
      }
      if offset + WORD_SIZE > heap.len() {
        return Err(HeapViolation::Overrun {
          offset,
          size: WORD_SIZE,
          heap_size: heap.len(),
        });
      }

      let header = tag::read_header(heap, offset);

      if header.size < MIN_BLOCK_SIZE {
        return Err(HeapViolation::TooSmall {
          offset,
          size: header.size,
        });
      }
      if offset + header.size > heap.len() {
        return Err(HeapViolation::Overrun {
          offset,
          size: header.size,
          heap_size: heap.len(),
        });
      }

      let footer = tag::read_word(heap, tag::footer_offset(offset, header.size));
      if footer != header.encode() {
        return Err(HeapViolation::TagMismatch {
          offset,
          header: tag::read_word(heap, offset),
          footer,
        });
      }

      if header.allocated {
        previous_free = None;
      } else {
        if let Some(left) = previous_free {
          return Err(HeapViolation::AdjacentFree {
            left,
            right: offset,
          });
        }
        previous_free = Some(offset);
        free_in_heap += 1;
      }

      blocks.insert(offset, header.allocated);
      offset += header.size;
    }

    let list = self.free_list;
    let sentinel = list.sentinel();
    let mut in_list = 0;
    let mut previous = sentinel;
    let mut current = list.next(heap, sentinel);

    while current != sentinel {
      match blocks.get(&current) {
        None => return Err(HeapViolation::FreeListBrokenLink { offset: current }),
        Some(true) => return Err(HeapViolation::FreeListAllocated { offset: current }),
        Some(false) => {}
      }
      if list.prev(heap, current) != previous {
        return Err(HeapViolation::FreeListBrokenLink { offset: current });
      }

      in_list += 1;
      // a cycle or a repeated entry runs past the real count
      if in_list > free_in_heap {
        return Err(HeapViolation::FreeListCount {
          in_list,
          in_heap: free_in_heap,
        });
      }

      previous = current;
      current = list.next(heap, current);
    }

    if list.prev(heap, sentinel) != previous {
      return Err(HeapViolation::FreeListBrokenLink { offset: sentinel });
    }
    if in_list != free_in_heap {
      return Err(HeapViolation::FreeListCount {
        in_list,
        in_heap: free_in_heap,
      });
    }

    Ok(())
  }

  /// Printable block-by-block view of the heap.
  pub fn dump(&self) -> HeapDump<'_> {
    HeapDump {
      blocks: self.blocks(),
      low: self.arena.low(),
    }
  }
}

pub struct HeapDump<'a> {
  blocks: Blocks<'a>,
  low: *const u8,
}

impl fmt::Display for HeapDump<'_> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    for block in self.blocks.clone() {
      writeln!(
        f,
        "{} block at {:?} (offset {}), size {}",
        if block.allocated { "allocated" } else { "free" },
        self.low.wrapping_add(block.offset),
        block.offset,
        block.size,
      )?;
    }

    Ok(())
  }
}
