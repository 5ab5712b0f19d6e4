use std::cell::Cell;
use std::collections::BTreeSet;
use std::rc::Rc;

use proptest::prelude::*;
use tagalloc::{
  AllocError, AllocatorConfig, Arena, BlockInfo, ExplicitAllocator, GrowthPolicy, MemArena, Ptr,
  align::{ALIGNMENT, WORD_SIZE},
};

fn allocator(growth: GrowthPolicy) -> ExplicitAllocator {
  ExplicitAllocator::with_config(
    AllocatorConfig::new()
      .with_max_heap(1 << 20)
      .with_growth(growth),
  )
  .unwrap()
}

/// An arena whose growth can be switched off, to exercise the failure path
/// through the `Arena` seam.
struct FlakyArena {
  inner: MemArena,
  fail: Rc<Cell<bool>>,
}

impl Arena for FlakyArena {
  fn grow(
    &mut self,
    n: usize,
  ) -> Result<usize, AllocError> {
    if self.fail.get() {
      return Err(AllocError::OutOfMemory {
        requested: n,
        available: 0,
      });
    }
    self.inner.grow(n)
  }

  fn low(&self) -> *const u8 {
    self.inner.low()
  }

  fn size(&self) -> usize {
    self.inner.size()
  }

  fn bytes(&self) -> &[u8] {
    self.inner.bytes()
  }

  fn bytes_mut(&mut self) -> &mut [u8] {
    self.inner.bytes_mut()
  }

  fn reset(&mut self) {
    self.inner.reset()
  }
}

#[test]
fn first_fit_reuses_freed_block_then_coalesces_everything() {
  for growth in [GrowthPolicy::Exact, GrowthPolicy::Padded] {
    let mut allocator = allocator(growth);

    let a = allocator.allocate(100).unwrap();
    let b = allocator.allocate(200).unwrap();
    allocator.release(a);

    let grown = allocator.heap_size();
    let c = allocator.allocate(50).unwrap();

    assert_eq!(c, a);
    assert_eq!(allocator.heap_size(), grown);

    allocator.release(b);
    allocator.release(c);

    let first_block = a.offset() - WORD_SIZE;
    assert_eq!(
      allocator.blocks().collect::<Vec<_>>(),
      vec![BlockInfo {
        offset: first_block,
        size: grown - first_block,
        allocated: false,
      }]
    );
    assert_eq!(allocator.free_blocks(), vec![first_block]);
    assert_eq!(allocator.check_heap(), Ok(()));
  }
}

#[test]
fn zero_sized_allocations_are_always_none() {
  let mut allocator = allocator(GrowthPolicy::Padded);

  for _ in 0..10 {
    assert_eq!(allocator.allocate(0), None);
  }

  let _live = allocator.allocate(32).unwrap();
  assert_eq!(allocator.allocate(0), None);
  assert_eq!(allocator.stats().allocated_blocks, 1);
}

#[test]
fn freed_middle_block_is_reused() {
  let mut allocator = allocator(GrowthPolicy::Exact);

  let first = allocator.allocate(24).unwrap();
  let middle = allocator.allocate(24).unwrap();
  let last = allocator.allocate(24).unwrap();
  allocator.release(middle);

  let grown = allocator.heap_size();
  let again = allocator.allocate(24).unwrap();

  assert_eq!(again, middle);
  assert_eq!(allocator.heap_size(), grown);
  assert!(first < again && again < last);
  assert_eq!(allocator.check_heap(), Ok(()));
}

#[test]
fn reallocate_none_matches_allocate() {
  let mut left = allocator(GrowthPolicy::Padded);
  let mut right = allocator(GrowthPolicy::Padded);

  for size in [1, 17, 100, 4000] {
    assert_eq!(left.reallocate(None, size), right.allocate(size));
  }

  assert_eq!(
    left.blocks().collect::<Vec<_>>(),
    right.blocks().collect::<Vec<_>>()
  );
}

#[test]
fn reallocate_to_zero_matches_release() {
  let mut left = allocator(GrowthPolicy::Exact);
  let mut right = allocator(GrowthPolicy::Exact);

  let a = left.allocate(64).unwrap();
  let _ = left.allocate(64).unwrap();
  let b = right.allocate(64).unwrap();
  let _ = right.allocate(64).unwrap();

  assert_eq!(left.reallocate(Some(a), 0), None);
  right.release(b);

  assert_eq!(
    left.blocks().collect::<Vec<_>>(),
    right.blocks().collect::<Vec<_>>()
  );
  assert_eq!(left.free_blocks(), right.free_blocks());
}

#[test]
fn payloads_are_aligned() {
  let mut allocator = allocator(GrowthPolicy::Padded);

  for size in 1..200 {
    let ptr = allocator.allocate(size).unwrap();
    assert_eq!(allocator.as_ptr(ptr) as usize % ALIGNMENT, 0);
    assert!(allocator.usable_size(ptr) >= size);
    if size % 3 == 0 {
      allocator.release(ptr);
    }
  }

  assert_eq!(allocator.check_heap(), Ok(()));
}

#[test]
fn failed_growth_changes_nothing() {
  let fail = Rc::new(Cell::new(false));
  let arena = FlakyArena {
    inner: MemArena::new(1 << 16).unwrap(),
    fail: Rc::clone(&fail),
  };
  let mut allocator = ExplicitAllocator::init(arena, AllocatorConfig::default()).unwrap();

  let a = allocator.allocate(40).unwrap();
  allocator.payload_mut(a)[..5].copy_from_slice(b"hello");
  let b = allocator.allocate(40).unwrap();
  allocator.release(b);

  let before = allocator.arena().bytes().to_vec();
  let free_before = allocator.free_blocks();

  fail.set(true);

  assert_eq!(allocator.allocate(4096), None);
  assert_eq!(allocator.reallocate(Some(a), 4096), None);
  assert_eq!(allocator.arena().bytes(), &before[..]);
  assert_eq!(allocator.free_blocks(), free_before);
  assert_eq!(&allocator.payload(a)[..5], b"hello");

  // a request that fits the free list still succeeds
  assert_eq!(allocator.allocate(8), Some(b));
  assert_eq!(allocator.check_heap(), Ok(()));
}

#[test]
fn exhausting_the_arena_returns_none() {
  let mut allocator = ExplicitAllocator::with_config(
    AllocatorConfig::new()
      .with_max_heap(1024)
      .with_growth(GrowthPolicy::Exact),
  )
  .unwrap();

  let mut live = Vec::new();
  while let Some(ptr) = allocator.allocate(48) {
    live.push(ptr);
  }

  assert_eq!(live.len(), (1024 - 24) / 64);
  assert_eq!(allocator.check_heap(), Ok(()));

  for ptr in live {
    allocator.release(ptr);
  }
  assert_eq!(allocator.stats().free_blocks, 1);
  assert!(allocator.allocate(48).is_some());
}

#[test]
fn try_release_reports_invalid_handles() {
  let mut allocator = allocator(GrowthPolicy::Exact);
  let a = allocator.allocate(16).unwrap();
  let b = allocator.allocate(16).unwrap();

  allocator.try_release(b).unwrap();

  assert!(matches!(
    allocator.try_release(b),
    Err(AllocError::InvalidRelease { .. })
  ));
  assert!(matches!(
    allocator.try_release(Ptr::from_offset(a.offset() + 8).unwrap()),
    Err(AllocError::InvalidRelease { .. })
  ));
  assert_eq!(allocator.check_heap(), Ok(()));
}

#[derive(Clone, Debug)]
enum Op {
  Allocate(usize),
  Release(usize),
  Reallocate(usize, usize),
}

fn op() -> impl Strategy<Value = Op> {
  prop_oneof![
    3 => (1usize..600).prop_map(Op::Allocate),
    2 => any::<usize>().prop_map(Op::Release),
    1 => (any::<usize>(), 0usize..900).prop_map(|(i, size)| Op::Reallocate(i, size)),
  ]
}

struct Live {
  ptr: Ptr,
  len: usize,
  pattern: u8,
}

fn fill(
  allocator: &mut ExplicitAllocator,
  live: &Live,
) {
  allocator.payload_mut(live.ptr)[..live.len].fill(live.pattern);
}

fn assert_consistent(
  allocator: &ExplicitAllocator,
  live: &[Live],
) -> Result<(), TestCaseError> {
  prop_assert_eq!(allocator.check_heap(), Ok(()));

  for entry in live {
    prop_assert!(
      allocator.payload(entry.ptr)[..entry.len]
        .iter()
        .all(|&byte| byte == entry.pattern)
    );
  }

  let mut ranges: Vec<(usize, usize)> = live
    .iter()
    .map(|entry| {
      let start = entry.ptr.offset();
      (start, start + allocator.usable_size(entry.ptr))
    })
    .collect();
  ranges.sort();
  for pair in ranges.windows(2) {
    prop_assert!(pair[0].1 <= pair[1].0, "overlapping payloads {:?}", pair);
  }

  let free_in_heap: BTreeSet<usize> = allocator
    .blocks()
    .filter(|block| !block.allocated)
    .map(|block| block.offset)
    .collect();
  let free_in_list: Vec<usize> = allocator.free_blocks();
  prop_assert_eq!(free_in_list.len(), free_in_heap.len());
  prop_assert_eq!(free_in_list.into_iter().collect::<BTreeSet<_>>(), free_in_heap);

  let allocated = allocator.blocks().filter(|block| block.allocated).count();
  prop_assert_eq!(allocated, live.len());

  Ok(())
}

proptest! {
  #[test]
  fn random_traffic_keeps_the_heap_consistent(
    ops in proptest::collection::vec(op(), 1..120),
    padded in any::<bool>(),
  ) {
    let growth = if padded { GrowthPolicy::Padded } else { GrowthPolicy::Exact };
    let mut allocator = allocator(growth);
    let mut live: Vec<Live> = Vec::new();
    let mut next_pattern = 1u8;

    for op in ops {
      match op {
        Op::Allocate(size) => {
          let ptr = allocator.allocate(size).unwrap();
          let entry = Live { ptr, len: size, pattern: next_pattern };
          next_pattern = next_pattern.wrapping_add(1).max(1);
          fill(&mut allocator, &entry);
          live.push(entry);
        }
        Op::Release(i) => {
          if live.is_empty() {
            continue;
          }
          let entry = live.swap_remove(i % live.len());
          allocator.release(entry.ptr);
        }
        Op::Reallocate(i, size) => {
          if live.is_empty() {
            continue;
          }
          let index = i % live.len();
          let old = live.swap_remove(index);

          match allocator.reallocate(Some(old.ptr), size) {
            None => prop_assert_eq!(size, 0),
            Some(ptr) => {
              let kept = old.len.min(size);
              prop_assert!(allocator.payload(ptr)[..kept].iter().all(|&b| b == old.pattern));

              let entry = Live { ptr, len: size, pattern: next_pattern };
              next_pattern = next_pattern.wrapping_add(1).max(1);
              fill(&mut allocator, &entry);
              live.push(entry);
            }
          }
        }
      }

      assert_consistent(&allocator, &live)?;
    }

    for entry in live.drain(..) {
      allocator.release(entry.ptr);
    }
    prop_assert_eq!(allocator.check_heap(), Ok(()));
    prop_assert!(allocator.stats().free_blocks <= 1);
  }
}
