//! # tagalloc - An Explicit Free-List Allocator
//!
//! This crate provides a **first-fit allocator** with an explicit,
//! doubly-linked free list and boundary-tagged blocks, managing a single
//! contiguous region that only grows at its high end.
//!
//! ## Overview
//!
//! ```text
//!   Heap Layout:
//!
//!   ┌──────────┬────────────┬──────────────┬────────────┬──────────────────┐
//!   │ sentinel │ allocated  │     free     │ allocated  │       free       │
//!   │ (24 B)   │            │              │            │                  │
//!   └──────────┴────────────┴──────────────┴────────────┴──────────────────┘
//!   ▲          ▲                                                           ▲
//!   low()      first block                                            high()
//!
//!   Free blocks are chained through their payloads, newest first:
//!
//!        ┌──────────────────────────────────────────────┐
//!        ▼                                              │
//!   [sentinel] ⇄ [free @ +312] ⇄ [free @ +88] ⇄ ... ⇄ ───┘
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   tagalloc
//!   ├── align      - Alignment unit, word size, align! macro
//!   ├── tag        - Boundary tag codec (header / footer words)
//!   ├── arena      - Arena trait and the mmap-backed MemArena
//!   ├── free_list  - Circular sentinel-headed free list
//!   ├── explicit   - ExplicitAllocator: allocate / release / reallocate
//!   ├── check      - Heap walk, consistency checker, stats, dump
//!   ├── config     - AllocatorConfig and GrowthPolicy
//!   └── error      - AllocError and HeapViolation
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use tagalloc::ExplicitAllocator;
//!
//! let mut allocator = ExplicitAllocator::new().unwrap();
//!
//! let ptr = allocator.allocate(8).unwrap();
//! allocator.payload_mut(ptr)[..8].copy_from_slice(&42u64.to_ne_bytes());
//!
//! let ptr = allocator.reallocate(Some(ptr), 64).unwrap();
//! assert_eq!(&allocator.payload(ptr)[..8], &42u64.to_ne_bytes());
//!
//! allocator.release(ptr);
//! assert!(allocator.check_heap().is_ok());
//! ```
//!
//! ## How It Works
//!
//! Every block carries its size and allocated bit twice:
//!
//! ```text
//!   Allocated block:
//!   ┌────────┬─────────────────────────────────────────┬────────┐
//!   │ size|1 │               payload                   │ size|1 │
//!   └────────┴─────────────────────────────────────────┴────────┘
//!            ▲
//!            └── Ptr handed to the caller
//!
//!   Free block:
//!   ┌────────┬────────┬────────┬───────────────────────┬────────┐
//!   │ size|0 │  next  │  prev  │        unused         │ size|0 │
//!   └────────┴────────┴────────┴───────────────────────┴────────┘
//! ```
//!
//! The footer lets `release` read the left neighbor's tag one word before
//! its own header, and the right neighbor's header sits right after its own
//! footer. Freed blocks are merged with whichever neighbors are free:
//!
//! ```text
//!   [alloc][FREED][alloc]  ->  [alloc][ free ][alloc]        (no merge)
//!   [free ][FREED][alloc]  ->  [    free     ][alloc]        (left)
//!   [alloc][FREED][free ]  ->  [alloc][    free     ]        (right)
//!   [free ][FREED][free ]  ->  [        free        ]        (both)
//! ```
//!
//! Allocation scans the free list from the front and takes the first block
//! that is large enough, splitting off the tail when it can stand as a block
//! of its own (32 bytes). When nothing fits, the arena grows.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: every operation takes `&mut self`
//! - **First fit**: no size classes, no best-fit search
//! - **Naive reallocate**: always moves to a fresh block
//! - **Never shrinks**: freed memory stays in the arena
//! - **Unix-only**: `MemArena` reserves its region with `mmap(2)`
//!
//! ## Safety
//!
//! Blocks are addressed by offset and every tag access is bounds checked
//! against the arena's byte slice, so a bad handle passed to `release` can
//! corrupt the heap's bookkeeping or panic, but cannot touch memory outside
//! the arena. Use [`ExplicitAllocator::try_release`] or
//! [`AllocatorConfig::hardened`] to reject such handles instead.

pub mod align;
pub mod arena;
mod check;
pub mod config;
pub mod error;
mod explicit;
mod free_list;
mod tag;

pub use arena::{Arena, MemArena};
pub use check::{BlockInfo, Blocks, HeapDump, HeapStats};
pub use config::{AllocatorConfig, GrowthPolicy};
pub use error::{AllocError, HeapViolation};
pub use explicit::{ExplicitAllocator, Ptr};
pub use free_list::MIN_BLOCK_SIZE;
