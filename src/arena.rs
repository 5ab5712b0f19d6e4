//! The growable region the allocator carves blocks out of.
//!
//! ```text
//!   low()                                   high()      max_heap
//!   ▼                                         ▼            ▼
//!   ┌─────────────────────────────────────────┬────────────┐
//!   │           managed bytes (size)          │  reserved  │
//!   └─────────────────────────────────────────┴────────────┘
//!                                             ▲
//!                                   grow(n) moves this by n
//! ```

use std::{ptr::NonNull, slice};

use libc::{MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE, c_void};
use tracing::debug;

use crate::error::AllocError;

/// A contiguous region that only ever grows at its high end.
///
/// The allocator addresses the region by byte offset from [`Arena::low`], so
/// an implementation is free to move its storage as long as the bytes keep
/// their offsets.
pub trait Arena {
  /// Appends exactly `n` bytes to the region and returns the offset of the
  /// first new byte. On failure nothing changes.
  fn grow(
    &mut self,
    n: usize,
  ) -> Result<usize, AllocError>;

  /// Address of the first managed byte.
  fn low(&self) -> *const u8;

  /// Address of the last managed byte.
  fn high(&self) -> *const u8 {
    self.low().wrapping_add(self.size()).wrapping_sub(1)
  }

  /// Number of managed bytes.
  fn size(&self) -> usize;

  fn bytes(&self) -> &[u8];

  fn bytes_mut(&mut self) -> &mut [u8];

  /// Gives every managed byte back, leaving an empty region.
  fn reset(&mut self);
}

/// An arena backed by one anonymous `mmap` reservation of `max_heap` bytes.
///
/// Growing only moves a break offset inside the reservation, so addresses
/// handed out never move and `low()` is page aligned.
pub struct MemArena {
  base: NonNull<u8>,
  brk: usize,
  max_heap: usize,
}

impl MemArena {
  pub fn new(max_heap: usize) -> Result<Self, AllocError> {
    if max_heap == 0 {
      return Err(AllocError::MapFailed {
        len: 0,
        errno: libc::EINVAL,
      });
    }

    let addr = unsafe {
      libc::mmap(
        std::ptr::null_mut(),
        max_heap,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANONYMOUS,
        -1,
        0,
      )
    };

    if addr == MAP_FAILED {
      return Err(AllocError::MapFailed {
        len: max_heap,
        errno: std::io::Error::last_os_error().raw_os_error().unwrap_or(0),
      });
    }

    let base = NonNull::new(addr.cast::<u8>()).ok_or(AllocError::MapFailed {
      len: max_heap,
      errno: 0,
    })?;

    debug!(max_heap, base = ?base, "reserved arena");

    Ok(Self {
      base,
      brk: 0,
      max_heap,
    })
  }

  pub fn max_heap(&self) -> usize {
    self.max_heap
  }

  /// Bytes that can still be handed out by [`Arena::grow`].
  pub fn available(&self) -> usize {
    self.max_heap - self.brk
  }
}

impl Arena for MemArena {
  fn grow(
    &mut self,
    n: usize,
  ) -> Result<usize, AllocError> {
    if n > self.available() {
      return Err(AllocError::OutOfMemory {
        requested: n,
        available: self.available(),
      });
    }

    let old_brk = self.brk;
    self.brk += n;

    debug!(grow = n, brk = self.brk, "arena grown");

    Ok(old_brk)
  }

  fn low(&self) -> *const u8 {
    self.base.as_ptr()
  }

  fn size(&self) -> usize {
    self.brk
  }

  fn bytes(&self) -> &[u8] {
    unsafe { slice::from_raw_parts(self.base.as_ptr(), self.brk) }
  }

  fn bytes_mut(&mut self) -> &mut [u8] {
    unsafe { slice::from_raw_parts_mut(self.base.as_ptr(), self.brk) }
  }

  fn reset(&mut self) {
    self.brk = 0;
  }
}

impl Drop for MemArena {
  fn drop(&mut self) {
    unsafe {
      libc::munmap(self.base.as_ptr().cast::<c_void>(), self.max_heap);
    }
  }
}
