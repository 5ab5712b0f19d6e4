//! Allocator configuration.

use crate::align;

/// How much the allocator asks the arena for when the free list has no fit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum GrowthPolicy {
  /// Grow by exactly the block size needed.
  Exact,
  /// Grow by the block size plus an eighth, rounded up to the alignment
  /// unit. The whole grown span goes to the caller and is never split, so
  /// blocks of 256 bytes and up carry at least [`MIN_BLOCK_SIZE`] spare
  /// bytes that only return to the free list when the block is released.
  /// Falls back to the bare block size when the padded span does not fit.
  ///
  /// [`MIN_BLOCK_SIZE`]: crate::MIN_BLOCK_SIZE
  #[default]
  Padded,
}

impl GrowthPolicy {
  /// Bytes to request from the arena for a block of `block_size` bytes.
  pub fn grow_size(
    self,
    block_size: usize,
  ) -> Option<usize> {
    match self {
      Self::Exact => Some(block_size),
      Self::Padded => align::align_up(block_size.checked_add(block_size / 8)?),
    }
  }
}

/// Configuration for [`ExplicitAllocator`](crate::ExplicitAllocator) and
/// its default arena.
#[derive(Clone, Debug)]
pub struct AllocatorConfig {
  /// Upper bound on the arena size in bytes. Growth past this fails with
  /// `OutOfMemory`.
  ///
  /// Default: 20 MiB.
  pub max_heap: usize,

  /// Arena growth heuristic on a free-list miss.
  pub growth: GrowthPolicy,

  /// Validate every `release` and panic on a handle that does not name a
  /// live allocation.
  pub hardened: bool,
}

impl AllocatorConfig {
  /// Default arena limit.
  pub const DEFAULT_MAX_HEAP: usize = 20 * (1 << 20);

  pub fn new() -> Self {
    Self {
      max_heap: Self::DEFAULT_MAX_HEAP,
      growth: GrowthPolicy::default(),
      hardened: false,
    }
  }

  pub fn with_max_heap(
    mut self,
    max_heap: usize,
  ) -> Self {
    self.max_heap = max_heap;
    self
  }

  pub fn with_growth(
    mut self,
    growth: GrowthPolicy,
  ) -> Self {
    self.growth = growth;
    self
  }

  pub fn with_hardened(
    mut self,
    hardened: bool,
  ) -> Self {
    self.hardened = hardened;
    self
  }
}

impl Default for AllocatorConfig {
  fn default() -> Self {
    Self::new()
  }
}
