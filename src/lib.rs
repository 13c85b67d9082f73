//! # rmalloc - An Explicit Free List Memory Allocator
//!
//! This crate provides a general-purpose **dynamic memory allocator** built
//! on boundary tags and an explicit free list, serviced from a single
//! contiguous heap region that only ever grows.
//!
//! ## Overview
//!
//! Every block carries a header word and a mirroring footer word, so both
//! neighbours of any block can be inspected in constant time. Freed blocks
//! double as nodes of a doubly-linked free list threaded through their own
//! payload bytes:
//!
//! ```text
//!   ┌────────────────────────────────────────────────────────────────┐
//!   │                          HEAP MEMORY                           │
//!   │                                                                │
//!   │  ┌────┬────────────┬──────────────┬────────────┬─────────┬───┐ │
//!   │  │plg │ alloc (48) │  free (96)   │ alloc (32) │ free .. │epg│ │
//!   │  └────┴────────────┴──────┬───────┴────────────┴────┬────┴───┘ │
//!   │                           │        ▲                │          │
//!   │   free list head ─────────┘        └─── links ──────┘          │
//!   │                                                                │
//!   └────────────────────────────────────────────────────────────────┘
//!
//!   Allocation: first fit over the free list, splitting the residue.
//!   Release:    immediate coalescing with both neighbours, O(1).
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   rmalloc
//!   ├── align      - Rounding macro (round_up!)
//!   ├── tag        - Header/footer word encoding (internal)
//!   ├── block      - Block navigation layer (internal)
//!   ├── heap       - Heap providers (SbrkHeap, ArenaHeap)
//!   └── free_list  - FreeListAllocator implementation
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use rmalloc::{ArenaHeap, FreeListAllocator};
//!
//! let mut allocator =
//!   FreeListAllocator::new(ArenaHeap::new(64 * 1024)).expect("bootstrap");
//!
//! unsafe {
//!   let ptr = allocator.allocate(24) as *mut u64;
//!   assert!(!ptr.is_null());
//!
//!   ptr.write(42);
//!   assert_eq!(ptr.read(), 42);
//!
//!   allocator.release(ptr as *mut u8);
//! }
//!
//! assert!(allocator.check());
//! ```
//!
//! To manage the program's own data segment instead, bootstrap the
//! allocator on [`SbrkHeap`], which grows the heap with `sbrk(2)` the way
//! the example above grows an arena.
//!
//! ## How It Works
//!
//! - `allocate(n)` normalises the request to the 16-byte granule, scans
//!   the free list first-fit, extends the heap by at least one 4 KiB chunk
//!   when no block fits, splits off any residue worth keeping, and returns
//!   a 16-byte-aligned payload pointer.
//! - `release(p)` recovers the block from the payload pointer, flips its
//!   boundary tags to free, merges it with any free neighbour in constant
//!   time, and pushes the survivor onto the free list, so no two free
//!   blocks are ever adjacent.
//! - `check()` walks the heap and the free list and verifies their
//!   structural invariants; it is meant for tests and debugging sessions.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no synchronization primitives.
//! - **No heap shrinkage**: released memory is recycled, never returned to
//!   the provider.
//! - **Misuse is undetected**: releasing a foreign pointer or releasing
//!   twice is undefined behaviour, like `free(3)`.
//!
//! ## Safety
//!
//! This crate is inherently unsafe as it deals with raw memory management.
//! `allocate` and `release` require `unsafe` blocks; the safety contract
//! is the usual malloc contract and is spelled out on each method.

pub mod align;
mod block;
mod free_list;
mod heap;
mod tag;

pub use free_list::{FreeListAllocator, InitError};
pub use heap::{ArenaHeap, HeapSource, SbrkHeap};
