//! Heap providers.
//!
//! The allocator manages blocks; it does not own the mechanism that makes
//! raw bytes appear. That job belongs to a [`HeapSource`]: a monotonically
//! growable, contiguous region with a movable top. Two providers ship with
//! the crate:
//!
//! - [`SbrkHeap`] grows the program's data segment with `sbrk(2)`, the way
//!   a hosted malloc does:
//!
//!   ```text
//!     High addresses ┌─────────────────────┐
//!                    │       Stack         │ ↓ grows down
//!                    │                     │
//!                    │       Heap          │ ↑ grows up (via sbrk)
//!                    ├─────────────────────┤ ← program break
//!                    │   BSS / Data / Text │
//!     Low addresses  └─────────────────────┘
//!   ```
//!
//! - [`ArenaHeap`] portions out a fixed, pre-allocated buffer and refuses
//!   to grow past its capacity. It gives tests and bounded-heap callers a
//!   provider whose refusals are deterministic.
//!
//! Neither provider ever shrinks its region.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use libc::{c_void, intptr_t, sbrk};

use crate::tag::DSIZE;

/// A contiguous, monotonically growable region of raw bytes.
pub trait HeapSource {
  /// Grows the region by `n` bytes and returns the address of the previous
  /// top, or `None` when the provider refuses to grow. `n` is always a
  /// multiple of 16.
  fn extend(&mut self, n: usize) -> Option<NonNull<u8>>;

  /// The lowest addressable byte of the region.
  fn lo(&self) -> *mut u8;

  /// The highest addressable byte of the region (inclusive).
  fn hi(&self) -> *mut u8;
}

/// A [`HeapSource`] backed by the process data segment.
///
/// `sbrk(n)` moves the program break up by `n` bytes and returns its old
/// position; `sbrk(0)` queries it. The break is process-global state, so at
/// most one `SbrkHeap` should be live at a time, and nothing else in the
/// process may move the break while it is: successive grants must stay
/// contiguous.
pub struct SbrkHeap {
  /// Lowest byte this provider has handed out, recorded at construction.
  base: *mut u8,
}

impl SbrkHeap {
  /// Captures the current program break as the base of a new heap region.
  ///
  /// The break is padded up to a 16-byte boundary first, so every block
  /// carved from this region keeps its payload alignment.
  pub fn new() -> Self {
    // SAFETY: sbrk(0) only queries the current program break.
    let mut base = unsafe { sbrk(0) } as *mut u8;

    let misalign = (base as usize) % DSIZE;
    if misalign != 0 {
      let pad = DSIZE - misalign;
      // SAFETY: grows the break by less than one alignment granule.
      let prev = unsafe { sbrk(pad as intptr_t) };
      if prev != usize::MAX as *mut c_void {
        base = base.wrapping_add(pad);
      }
    }

    Self { base }
  }
}

impl Default for SbrkHeap {
  fn default() -> Self {
    Self::new()
  }
}

impl HeapSource for SbrkHeap {
  fn extend(&mut self, n: usize) -> Option<NonNull<u8>> {
    // SAFETY: sbrk either grows the data segment and returns the old break,
    // or leaves it untouched and returns (void*)-1. The new bytes belong to
    // this process until it exits.
    let prev = unsafe { sbrk(n as intptr_t) };

    if prev == usize::MAX as *mut c_void {
      // sbrk returns (void*)-1 on failure
      return None;
    }

    NonNull::new(prev as *mut u8)
  }

  fn lo(&self) -> *mut u8 {
    self.base
  }

  fn hi(&self) -> *mut u8 {
    // SAFETY: sbrk(0) only queries the current program break.
    (unsafe { sbrk(0) } as *mut u8).wrapping_sub(1)
  }
}

/// A [`HeapSource`] backed by one fixed, 16-aligned buffer.
///
/// The buffer is allocated up front; `extend` hands out successive slices
/// of it and fails once the capacity is spent. Dropping the arena releases
/// the buffer, so the arena must outlive every pointer carved from it.
pub struct ArenaHeap {
  base: NonNull<u8>,
  layout: Layout,
  /// Bytes handed out so far; the region top is `base + brk`.
  brk: usize,
}

impl ArenaHeap {
  /// Allocates an arena of (at least) the given capacity, rounded up to
  /// the 16-byte granule.
  pub fn new(capacity: usize) -> Self {
    let capacity = crate::round_up!(capacity.max(DSIZE), DSIZE);
    let layout = Layout::from_size_align(capacity, DSIZE).unwrap();

    // SAFETY: the layout has non-zero size.
    let ptr = unsafe { alloc::alloc(layout) };
    let base = match NonNull::new(ptr) {
      Some(base) => base,
      None => alloc::handle_alloc_error(layout),
    };

    Self {
      base,
      layout,
      brk: 0,
    }
  }

  /// The fixed capacity of the arena in bytes.
  pub fn capacity(&self) -> usize {
    self.layout.size()
  }
}

impl HeapSource for ArenaHeap {
  fn extend(&mut self, n: usize) -> Option<NonNull<u8>> {
    if n > self.layout.size() - self.brk {
      return None;
    }

    // SAFETY: brk + n is within the allocated buffer, checked above.
    let prev = unsafe { self.base.as_ptr().add(self.brk) };
    self.brk += n;

    NonNull::new(prev)
  }

  fn lo(&self) -> *mut u8 {
    self.base.as_ptr()
  }

  fn hi(&self) -> *mut u8 {
    self.base.as_ptr().wrapping_add(self.brk).wrapping_sub(1)
  }
}

impl Drop for ArenaHeap {
  fn drop(&mut self) {
    // SAFETY: base was allocated with this layout and is released once.
    unsafe { alloc::dealloc(self.base.as_ptr(), self.layout) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn arena_base_is_aligned() {
    let arena = ArenaHeap::new(256);
    assert_eq!(arena.lo() as usize % DSIZE, 0);
  }

  #[test]
  fn arena_rounds_capacity_to_the_granule() {
    assert_eq!(ArenaHeap::new(1).capacity(), DSIZE);
    assert_eq!(ArenaHeap::new(100).capacity(), 112);
    assert_eq!(ArenaHeap::new(4096).capacity(), 4096);
  }

  #[test]
  fn arena_extend_returns_the_previous_top() {
    let mut arena = ArenaHeap::new(256);

    let first = arena.extend(64).expect("within capacity");
    assert_eq!(first.as_ptr(), arena.lo());

    let second = arena.extend(64).expect("within capacity");
    assert_eq!(second.as_ptr(), arena.lo().wrapping_add(64));

    assert_eq!(arena.hi(), arena.lo().wrapping_add(128 - 1));
  }

  #[test]
  fn arena_refuses_past_capacity() {
    let mut arena = ArenaHeap::new(128);

    assert!(arena.extend(128).is_some());
    assert!(arena.extend(16).is_none());

    // A refusal leaves the region untouched.
    assert_eq!(arena.hi(), arena.lo().wrapping_add(128 - 1));
  }
}
