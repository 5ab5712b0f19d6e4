use std::num::NonZeroUsize;

use tracing::{debug, trace, warn};

use crate::align::{self, ALIGNMENT, WORD_SIZE};
use crate::arena::{Arena, MemArena};
use crate::config::AllocatorConfig;
use crate::error::AllocError;
use crate::free_list::{FreeList, MIN_BLOCK_SIZE, SENTINEL_SIZE};
use crate::tag::{self, TAG_OVERHEAD, Tag};

/// Handle to a live allocation: the payload's byte offset from the arena's
/// low end. Never zero, so `Option<Ptr>` is one word and `None` plays the
/// part of a null pointer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ptr(NonZeroUsize);

impl Ptr {
  /// Builds a handle from a raw payload offset. Only useful for handing a
  /// handle back to [`ExplicitAllocator::try_release`]; the allocator never
  /// returns a handle it did not build itself.
  pub fn from_offset(offset: usize) -> Option<Self> {
    NonZeroUsize::new(offset).map(Self)
  }

  fn from_block(block: usize) -> Option<Self> {
    Self::from_offset(block + WORD_SIZE)
  }

  pub fn offset(self) -> usize {
    self.0.get()
  }

  pub(crate) fn block(self) -> usize {
    self.offset() - WORD_SIZE
  }
}

/// First-fit allocator over an explicit, boundary-tagged free list.
///
/// All state lives in the arena bytes: block tags, the sentinel node and the
/// free-list links stored in free payloads. The struct itself only keeps the
/// offsets needed to find them again.
pub struct ExplicitAllocator<A: Arena = MemArena> {
  pub(crate) arena: A,
  pub(crate) free_list: FreeList,
  pub(crate) first_block: usize,
  config: AllocatorConfig,
}

impl ExplicitAllocator<MemArena> {
  /// An allocator over a fresh [`MemArena`] with the default configuration.
  pub fn new() -> Result<Self, AllocError> {
    Self::with_config(AllocatorConfig::default())
  }

  pub fn with_config(config: AllocatorConfig) -> Result<Self, AllocError> {
    let arena = MemArena::new(config.max_heap)?;
    Self::init(arena, config)
  }
}

impl<A: Arena> ExplicitAllocator<A> {
  /// Resets `arena`, places the sentinel at its start and returns an
  /// allocator with an empty free list.
  pub fn init(
    mut arena: A,
    config: AllocatorConfig,
  ) -> Result<Self, AllocError> {
    arena.reset();

    let sentinel = arena.grow(SENTINEL_SIZE)?;
    let free_list = FreeList::init(arena.bytes_mut(), sentinel);
    let first_block = sentinel + SENTINEL_SIZE;

    debug!(sentinel, first_block, growth = ?config.growth, "allocator initialised");

    Ok(Self {
      arena,
      free_list,
      first_block,
      config,
    })
  }

  pub fn config(&self) -> &AllocatorConfig {
    &self.config
  }

  pub fn arena(&self) -> &A {
    &self.arena
  }

  /// Current arena size in bytes, sentinel included.
  pub fn heap_size(&self) -> usize {
    self.arena.size()
  }

  /// Total block size for a request of `size` payload bytes.
  fn block_size(size: usize) -> Option<usize> {
    let size = align::align_up(size.checked_add(TAG_OVERHEAD)?)?;
    Some(size.max(MIN_BLOCK_SIZE))
  }

  /// Allocates a block with at least `size` payload bytes.
  ///
  /// Returns `None` for a zero-sized request and when the arena cannot grow;
  /// in both cases the heap is left untouched.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Option<Ptr> {
    if size == 0 {
      trace!("zero-sized allocation");
      return None;
    }

    let Some(block_size) = Self::block_size(size) else {
      warn!(size, "allocation size overflows");
      return None;
    };

    let fit = self.free_list.find_fit(self.arena.bytes(), block_size);

    let (block, block_size) = match fit {
      Some(block) => (block, self.place(block, block_size)),
      None => {
        let grow = self.config.growth.grow_size(block_size)?;

        match self.arena.grow(grow) {
          Ok(block) => (block, grow),
          // the padding does not fit, the bare block might
          Err(err) if grow > block_size => match self.arena.grow(block_size) {
            Ok(block) => {
              debug!(size, grow, block_size, %err, "padded growth failed, grew exactly");
              (block, block_size)
            }
            Err(err) => {
              warn!(size, %err, "allocation failed");
              return None;
            }
          },
          Err(err) => {
            warn!(size, %err, "allocation failed");
            return None;
          }
        }
      }
    };

    tag::write_tags(self.arena.bytes_mut(), block, Tag::new(block_size, true));

    let ptr = Ptr::from_block(block)?;
    debug_assert_eq!(
      self.as_ptr(ptr) as usize % ALIGNMENT,
      0,
      "misaligned payload at offset {}",
      ptr.offset()
    );

    trace!(size, block, block_size, reused = fit.is_some(), "allocate");

    Some(ptr)
  }

  /// Takes the free `block` off the list for a request of `block_size`
  /// bytes. When the leftover can stand as a block of its own it is split off
  /// and put back on the list. Returns the size of the part handed out.
  fn place(
    &mut self,
    block: usize,
    block_size: usize,
  ) -> usize {
    let heap = self.arena.bytes_mut();
    let free_size = tag::read_header(heap, block).size;

    self.free_list.remove(heap, block);

    let rest_size = free_size - block_size;
    if rest_size < MIN_BLOCK_SIZE {
      return free_size;
    }

    let rest = block + block_size;
    tag::write_tags(heap, rest, Tag::new(rest_size, false));
    self.free_list.insert_front(heap, rest);

    trace!(block, rest, rest_size, "split");

    block_size
  }

  /// Frees the block behind `ptr` and merges it with free neighbors.
  ///
  /// `ptr` must come from [`allocate`](Self::allocate) or
  /// [`reallocate`](Self::reallocate) and must not have been released
  /// since. With [`AllocatorConfig::hardened`] set this is verified and a
  /// violation panics; otherwise a bad handle corrupts the heap (or panics on
  /// an out-of-range offset).
  pub fn release(
    &mut self,
    ptr: Ptr,
  ) {
    if self.config.hardened {
      self.assert_live(ptr);
    }

    self.free_block(ptr.block());
  }

  /// Like [`release`](Self::release), but always validates `ptr` first and
  /// leaves the heap alone if it does not name a live allocation.
  pub fn try_release(
    &mut self,
    ptr: Ptr,
  ) -> Result<(), AllocError> {
    let block = self.validate(ptr)?;
    self.free_block(block);
    Ok(())
  }

  /// Resizes the allocation behind `ptr`.
  ///
  /// `None` allocates, a zero `size` releases and returns `None`. Otherwise
  /// the payload moves to a fresh block, keeping the first
  /// `min(old, size)` bytes. On failure `None` is returned and `ptr` stays
  /// live and unchanged.
  pub fn reallocate(
    &mut self,
    ptr: Option<Ptr>,
    size: usize,
  ) -> Option<Ptr> {
    let Some(ptr) = ptr else {
      return self.allocate(size);
    };

    if size == 0 {
      self.release(ptr);
      return None;
    }

    if self.config.hardened {
      self.assert_live(ptr);
    }

    let new_ptr = self.allocate(size)?;
    let copy = self.usable_size(ptr).min(size);

    self
      .arena
      .bytes_mut()
      .copy_within(ptr.offset()..ptr.offset() + copy, new_ptr.offset());

    self.free_block(ptr.block());

    trace!(from = ptr.offset(), to = new_ptr.offset(), copy, "reallocate");

    Some(new_ptr)
  }

  /// Payload bytes available behind `ptr`. May exceed the requested size
  /// because of rounding, unsplit leftovers and padded growth.
  pub fn usable_size(
    &self,
    ptr: Ptr,
  ) -> usize {
    tag::read_header(self.arena.bytes(), ptr.block()).size - TAG_OVERHEAD
  }

  pub fn payload(
    &self,
    ptr: Ptr,
  ) -> &[u8] {
    let start = ptr.offset();
    let len = self.usable_size(ptr);
    &self.arena.bytes()[start..start + len]
  }

  pub fn payload_mut(
    &mut self,
    ptr: Ptr,
  ) -> &mut [u8] {
    let start = ptr.offset();
    let len = self.usable_size(ptr);
    &mut self.arena.bytes_mut()[start..start + len]
  }

  /// The payload's address inside the arena.
  pub fn as_ptr(
    &self,
    ptr: Ptr,
  ) -> *const u8 {
    self.arena.low().wrapping_add(ptr.offset())
  }

  fn assert_live(
    &self,
    ptr: Ptr,
  ) {
    if let Err(err) = self.validate(ptr) {
      panic!("{err}");
    }
  }

  /// Checks that `ptr` names a live allocation and returns its block offset.
  fn validate(
    &self,
    ptr: Ptr,
  ) -> Result<usize, AllocError> {
    let heap = self.arena.bytes();
    let offset = ptr.offset();
    let invalid = |reason| AllocError::InvalidRelease { offset, reason };

    if offset % ALIGNMENT != 0 {
      return Err(invalid("misaligned handle"));
    }
    if offset < self.first_block + WORD_SIZE || ptr.block() + MIN_BLOCK_SIZE > heap.len() {
      return Err(invalid("handle outside the heap"));
    }

    let block = ptr.block();
    let header = tag::read_header(heap, block);

    if header.size < MIN_BLOCK_SIZE || block + header.size > heap.len() {
      return Err(invalid("corrupt block header"));
    }
    if tag::read_footer(heap, block, header.size) != header {
      return Err(invalid("header and footer disagree"));
    }
    if !header.allocated {
      return Err(invalid("block is not allocated"));
    }

    Ok(block)
  }

  fn free_block(
    &mut self,
    block: usize,
  ) {
    let heap = self.arena.bytes_mut();
    let size = tag::read_header(heap, block).size;

    tag::write_tags(heap, block, Tag::new(size, false));

    let merged = self.coalesce(block, size);

    trace!(block, size, merged, "release");
  }

  /// Merges the free `block` with whichever neighbors are free and puts
  /// the result on the list. Returns the offset of the merged block.
  fn coalesce(
    &mut self,
    block: usize,
    size: usize,
  ) -> usize {
    let first_block = self.first_block;
    let list = self.free_list;
    let heap = self.arena.bytes_mut();

    let left = free_left_neighbor(heap, first_block, block);
    let right = free_right_neighbor(heap, block + size);

    let (start, total) = match (left, right) {
      (None, None) => (block, size),
      (Some(left), None) => {
        list.remove(heap, left.0);
        (left.0, left.1 + size)
      }
      (None, Some(right)) => {
        list.remove(heap, right.0);
        (block, size + right.1)
      }
      (Some(left), Some(right)) => {
        list.remove(heap, left.0);
        list.remove(heap, right.0);
        (left.0, left.1 + size + right.1)
      }
    };

    tag::write_tags(heap, start, Tag::new(total, false));
    list.insert_front(heap, start);

    start
  }
}

/// Offset and size of the block ending right before `block`, if there is
/// one and it is free.
fn free_left_neighbor(
  heap: &[u8],
  first_block: usize,
  block: usize,
) -> Option<(usize, usize)> {
  if block <= first_block {
    return None;
  }

  let footer = Tag::decode(tag::read_word(heap, block - WORD_SIZE));
  (!footer.allocated).then_some((block - footer.size, footer.size))
}

/// Offset and size of the block starting at `next`, if it lies inside the
/// heap and is free.
fn free_right_neighbor(
  heap: &[u8],
  next: usize,
) -> Option<(usize, usize)> {
  if next >= heap.len() {
    return None;
  }

  let header = tag::read_header(heap, next);
  (!header.allocated).then_some((next, header.size))
}
