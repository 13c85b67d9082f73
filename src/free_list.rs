//! # Explicit free list allocator
//!
//! The allocator manages a single heap region as a sequence of blocks
//! bracketed by two permanent sentinels:
//!
//! ```text
//!   begin                                                      end
//!   heap                                                       heap
//!   ┌──────────┬──────────────────────────────────┬──────────┐
//!   │ ftr(0:a) │      zero or more user blocks    │ hdr(0:a) │
//!   └──────────┴──────────────────────────────────┴──────────┘
//!   │ prologue │                                  │ epilogue │
//!   │ footer   │                                  │ header   │
//! ```
//!
//! Both sentinels read as zero-size allocated blocks, so neighbour
//! inspection during coalescing never needs a bounds check: the "block"
//! before the first real block and the one after the last always look
//! allocated.
//!
//! ## Free list
//!
//! Free blocks double as list nodes. Their first two payload words hold
//! the predecessor and successor links of a doubly-linked list with a
//! single head pointer:
//!
//! ```text
//!   free_head ──► ┌──────────┐     ┌──────────┐     ┌──────────┐
//!                 │ prev: ∅  │◄────┤ prev ────┤◄────┤ prev ────┤
//!                 │ next ────┼────►│ next ────┼────►│ next: ∅  │
//!                 └──────────┘     └──────────┘     └──────────┘
//! ```
//!
//! Insertion is LIFO: a newly freed block becomes the new head.
//!
//! ## Allocation
//!
//! `allocate` rounds the request up to the 16-byte granule (plus two words
//! of overhead), takes the first fit from the free list, and splits off
//! the tail when the residue is big enough to be a block of its own. When
//! no fit exists, the heap is extended by at least one chunk and the scan
//! runs once more.
//!
//! ## Release
//!
//! `release` flips the block's boundary tags to free and immediately
//! coalesces with both neighbours, so no two free blocks are ever
//! adjacent. The merged survivor is pushed onto the free list.

use std::cmp;
use std::fmt;
use std::ptr;

use crate::block::BlockPtr;
use crate::heap::HeapSource;
use crate::tag::{self, CHUNKSIZE, DSIZE, MIN_BLOCK_SIZE, WSIZE};

/// Bootstrapping the allocator failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
  /// The heap provider refused to supply the bootstrap memory.
  HeapExhausted,
}

impl fmt::Display for InitError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::HeapExhausted => {
        write!(f, "heap provider refused to supply the bootstrap memory")
      }
    }
  }
}

impl std::error::Error for InitError {}

/// An explicit free list allocator with boundary tags.
///
/// The allocator owns its [`HeapSource`] and all process-visible state:
/// the region bounds live in the provider, the block metadata lives in the
/// region itself, and the only out-of-band state is the free-list head and
/// the address of the first block.
///
/// # Thread Safety
///
/// The allocator is **not** thread-safe and never blocks; every operation
/// completes synchronously. Wrap it in external synchronization if it must
/// be shared.
pub struct FreeListAllocator<H: HeapSource> {
  /// The provider the region is carved from.
  heap: H,

  /// The first real block, fixed just past the prologue footer.
  first_block: BlockPtr,

  /// Head of the doubly-linked free list, threaded through free payloads.
  free_head: Option<BlockPtr>,
}

impl<H: HeapSource> FreeListAllocator<H> {
  /// Bootstraps an allocator on the given heap provider.
  ///
  /// Installs the prologue footer and epilogue header, then seeds the
  /// region with one chunk-sized free block. Fails with
  /// [`InitError::HeapExhausted`] if the provider refuses either request.
  pub fn new(mut heap: H) -> Result<Self, InitError> {
    let start = match heap.extend(DSIZE) {
      Some(start) => start.as_ptr(),
      None => return Err(InitError::HeapExhausted),
    };

    let prologue_footer = BlockPtr::from_header(start);
    let epilogue_header = BlockPtr::from_header(start.wrapping_add(WSIZE));

    // SAFETY: the provider just granted these two words.
    unsafe {
      prologue_footer.write_header(0, true);
      epilogue_header.write_header(0, true);
    }

    let mut allocator = Self {
      heap,
      // The epilogue slot becomes the first block's header on extension.
      first_block: epilogue_header,
      free_head: None,
    };

    if allocator.extend_heap(CHUNKSIZE).is_none() {
      return Err(InitError::HeapExhausted);
    }

    Ok(allocator)
  }

  /// Allocates a block with at least `size` bytes of payload.
  ///
  /// Returns a 16-byte-aligned payload pointer, or null when `size` is
  /// zero or the heap provider refuses to grow any further.
  ///
  /// # Safety
  ///
  /// The returned memory is valid for exactly `size` bytes until passed to
  /// [`release`](Self::release). The caller must not write past it and
  /// must keep the allocator alive while the pointer is in use.
  pub unsafe fn allocate(
    &mut self,
    size: usize,
  ) -> *mut u8 {
    if size == 0 {
      return ptr::null_mut();
    }

    // Two extra words pay for the header and footer; tiny requests are
    // padded up to the smallest block that can hold the free-list links.
    let asize = if size <= DSIZE {
      MIN_BLOCK_SIZE
    } else {
      crate::round_up!(size + DSIZE, DSIZE)
    };

    // SAFETY: every block reached below is either linked into the free
    // list or freshly carved from provider memory.
    unsafe {
      let mut fit = self.find_fit(asize);

      if fit.is_none() {
        let extension = cmp::max(CHUNKSIZE, asize);
        if self.extend_heap(extension).is_none() {
          log::trace!("allocate({size}): provider refused {extension} more bytes");
          return ptr::null_mut();
        }
        fit = self.find_fit(asize);
      }

      let Some(block) = fit else {
        return ptr::null_mut();
      };

      let bsize = block.size();

      self.remove(block);

      block.write_header(bsize, true);
      block.write_footer(bsize, true);

      self.split(block, asize);

      log::trace!("allocate({size}) -> {:p}", block.payload());
      block.payload()
    }
  }

  /// Releases a payload previously returned by [`allocate`](Self::allocate).
  ///
  /// Releasing null is a no-op. The block is marked free and immediately
  /// coalesced with whichever neighbours are free.
  ///
  /// # Safety
  ///
  /// `payload` must have come from `allocate` on this allocator and must
  /// not have been released before. The memory must no longer be in use.
  pub unsafe fn release(
    &mut self,
    payload: *mut u8,
  ) {
    if payload.is_null() {
      return;
    }

    log::trace!("release({payload:p})");

    let block = BlockPtr::from_payload(payload);

    // SAFETY: the caller promises `payload` designates a live allocation,
    // so its boundary tags and both sentinel-guarded neighbours are intact.
    unsafe {
      let size = block.size();

      block.write_header(size, false);
      block.write_footer(size, false);

      self.coalesce(block);
    }
  }

  /// Verifies the structural invariants of the heap and the free list.
  ///
  /// Walks the implicit block list once and the free list once, checking
  /// header/footer symmetry, region bounds, sentinel integrity, that no
  /// two free blocks are adjacent, that the free list holds exactly the
  /// free blocks, and that its links are mutually consistent. Violations
  /// are reported through `log::error!`.
  pub fn check(&self) -> bool {
    let lo = self.heap.lo();
    let hi = self.heap.hi();

    // SAFETY: the traversal is read-only and stops at the epilogue
    // sentinel, which bounds every reachable heap state.
    unsafe {
      let prologue = self.first_block.prev_footer();
      if tag::extract_size(prologue) != 0 || !tag::extract_alloc(prologue) {
        log::error!("consistency: prologue footer damaged ({prologue:#x})");
        return false;
      }

      let mut implicit_free = Vec::new();
      let mut prev_was_free = false;
      let mut block = self.first_block;

      while block.size() > 0 {
        let first = block.addr();
        if first < lo || first > hi {
          log::error!("consistency: block at {first:p} outside the heap");
          return false;
        }

        // Validate the size before trusting it for the footer and
        // next-block lookups; every block must leave room for the epilogue
        // word above it.
        let size = block.size();
        let remaining = (hi as usize) - (first as usize) + 1;
        if size < MIN_BLOCK_SIZE
          || size % DSIZE != 0
          || size > remaining.saturating_sub(WSIZE)
        {
          log::error!("consistency: implausible block size {size} at {first:p}");
          return false;
        }

        if block.header_word() != block.footer_word() {
          log::error!(
            "consistency: header {:#x} != footer {:#x} at {:p}",
            block.header_word(),
            block.footer_word(),
            block.addr()
          );
          return false;
        }

        if block.is_alloc() {
          prev_was_free = false;
        } else {
          if prev_was_free {
            log::error!("consistency: adjacent free blocks at {:p}", block.addr());
            return false;
          }
          prev_was_free = true;
          implicit_free.push(block);
        }

        block = block.next();
      }

      if !block.is_alloc() {
        log::error!("consistency: epilogue header damaged");
        return false;
      }

      let mut listed = Vec::new();
      let mut expected_prev = None;
      let mut node = self.free_head;

      while let Some(current) = node {
        if current.is_alloc() {
          log::error!(
            "consistency: allocated block {:p} on the free list",
            current.addr()
          );
          return false;
        }
        if current.link_prev() != expected_prev {
          log::error!("consistency: broken prev link at {:p}", current.addr());
          return false;
        }
        if listed.contains(&current) {
          log::error!("consistency: free list cycles at {:p}", current.addr());
          return false;
        }

        listed.push(current);
        expected_prev = Some(current);
        node = current.link_next();
      }

      if listed.len() != implicit_free.len()
        || implicit_free.iter().any(|block| !listed.contains(block))
      {
        log::error!(
          "consistency: free list holds {} blocks, the heap holds {} free blocks",
          listed.len(),
          implicit_free.len()
        );
        return false;
      }

      true
    }
  }

  /// Logs every block on the heap, one `log::debug!` line per block.
  pub fn dump(&self) {
    // SAFETY: same read-only traversal as `check`.
    unsafe {
      log::debug!(
        "heap {:p}..={:p}, free list head {:?}",
        self.heap.lo(),
        self.heap.hi(),
        self.free_head.map(|block| block.addr())
      );

      let mut block = self.first_block;
      while block.size() > 0 {
        if block.is_alloc() {
          log::debug!("  {:p}: {:>6} allocated", block.addr(), block.size());
        } else {
          log::debug!(
            "  {:p}: {:>6} free, prev {:?}, next {:?}",
            block.addr(),
            block.size(),
            block.link_prev().map(|b| b.addr()),
            block.link_next().map(|b| b.addr())
          );
        }
        block = block.next();
      }

      log::debug!("  {:p}: epilogue", block.addr());
    }
  }

  /// Grows the region by at least `n` bytes and carves one free block
  /// from the new memory.
  ///
  /// The grant overlaps the old epilogue header, which becomes the new
  /// block's header; a fresh epilogue is written at the new top. Returns
  /// the block after coalescing with a free predecessor, or `None` when
  /// the provider refuses.
  fn extend_heap(&mut self, n: usize) -> Option<BlockPtr> {
    let size = crate::round_up!(n, DSIZE);

    let prev_top = self.heap.extend(size)?.as_ptr();
    log::trace!("extended the heap by {size} bytes");

    // The old epilogue header sits one word below the previous top.
    let block = BlockPtr::from_payload(prev_top);

    // SAFETY: the provider granted `size` bytes starting at `prev_top`,
    // and the word below it held the old epilogue header.
    unsafe {
      block.write_header(size, false);
      block.write_footer(size, false);
      block.next().write_header(0, true);

      Some(self.coalesce(block))
    }
  }

  /// First-fit scan: the first free-list block of at least `asize` bytes.
  ///
  /// # Safety
  /// The free list must be intact.
  unsafe fn find_fit(
    &self,
    asize: usize,
  ) -> Option<BlockPtr> {
    unsafe {
      let mut node = self.free_head;

      while let Some(block) = node {
        if block.size() >= asize {
          return Some(block);
        }
        node = block.link_next();
      }

      None
    }
  }

  /// Carves `block` into an allocated prefix of `asize` bytes and a free
  /// residue, when the residue is big enough to stand on its own.
  ///
  /// # Safety
  /// `block` must be marked allocated at its full size and must not be on
  /// the free list.
  unsafe fn split(
    &mut self,
    block: BlockPtr,
    asize: usize,
  ) {
    unsafe {
      let bsize = block.size();

      if bsize - asize >= MIN_BLOCK_SIZE {
        block.write_header(asize, true);
        block.write_footer(asize, true);

        let residue = block.next();
        residue.write_header(bsize - asize, false);
        residue.write_footer(bsize - asize, false);

        // The residue's neighbours cannot be free here: its predecessor
        // is the block just allocated and its successor bordered a block
        // that was, until a moment ago, one undivided free block. The
        // coalesce degenerates to inserting the residue at the head.
        self.coalesce(residue);
      }
    }
  }

  /// Merges `block` with whichever of its neighbours are free and pushes
  /// the survivor onto the free list.
  ///
  /// # Safety
  /// `block` must carry free boundary tags and must not be on the free
  /// list; its neighbours' tags must be intact.
  unsafe fn coalesce(
    &mut self,
    block: BlockPtr,
  ) -> BlockPtr {
    unsafe {
      let mut survivor = block;
      let mut size = block.size();

      let prev_alloc = tag::extract_alloc(block.prev_footer());
      let next = block.next();
      let next_alloc = next.is_alloc();

      match (prev_alloc, next_alloc) {
        // Both neighbours allocated: nothing to merge.
        (true, true) => {}

        // Absorb the free successor.
        (true, false) => {
          self.remove(next);
          size += next.size();

          survivor.write_header(size, false);
          survivor.write_footer(size, false);
        }

        // Merge into the free predecessor.
        (false, true) => {
          let prev = block.prev();
          self.remove(prev);
          size += prev.size();

          prev.write_header(size, false);
          prev.write_footer(size, false);

          survivor = prev;
        }

        // Merge all three into the predecessor.
        (false, false) => {
          let prev = block.prev();
          self.remove(prev);
          self.remove(next);
          size += prev.size() + next.size();

          prev.write_header(size, false);
          prev.write_footer(size, false);

          survivor = prev;
        }
      }

      self.insert(survivor);

      survivor
    }
  }

  /// Prepends `block` to the free list (LIFO).
  ///
  /// # Safety
  /// `block` must be free, off the list, and large enough for link words.
  unsafe fn insert(
    &mut self,
    block: BlockPtr,
  ) {
    unsafe {
      block.set_link_prev(None);
      block.set_link_next(self.free_head);

      if let Some(head) = self.free_head {
        head.set_link_prev(Some(block));
      }

      self.free_head = Some(block);
    }
  }

  /// Splices `block` out of the free list.
  ///
  /// The block's own link words are left untouched; they become payload
  /// bytes on the next allocation.
  ///
  /// # Safety
  /// `block` must currently be linked into the free list.
  unsafe fn remove(
    &mut self,
    block: BlockPtr,
  ) {
    unsafe {
      let prev = block.link_prev();
      let next = block.link_next();

      match prev {
        Some(prev) => prev.set_link_next(next),
        None => self.free_head = next,
      }

      if let Some(next) = next {
        next.set_link_prev(prev);
      }
    }
  }
}
