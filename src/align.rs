use std::mem;

/// Size in bytes of one boundary-tag word. Tags and free-list links are
/// stored as `u64` on every target, so the layout does not depend on the
/// width of `usize`.
pub const WORD_SIZE: usize = mem::size_of::<u64>();

/// Every block size and every payload handle is a multiple of this.
pub const ALIGNMENT: usize = 8;

// payloads sit one word past an aligned header
const _: () = assert!(WORD_SIZE % ALIGNMENT == 0);

/// Rounds the given size up to the next multiple of [`ALIGNMENT`].
///
/// # Examples
///
/// ```rust
/// use tagalloc::align;
///
/// assert_eq!(align!(13), 16);
/// assert_eq!(align!(16), 16);
/// assert_eq!(align!(0), 0);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + $crate::align::ALIGNMENT - 1) & !($crate::align::ALIGNMENT - 1)
  };
}

/// Overflow-checked [`align!`], for sizes that come from callers.
pub fn align_up(value: usize) -> Option<usize> {
  value
    .checked_add(ALIGNMENT - 1)
    .map(|v| v & !(ALIGNMENT - 1))
}
