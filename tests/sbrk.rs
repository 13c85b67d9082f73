//! Exercises the allocator against the real program break.
//!
//! The break is process-global, so every sbrk-touching assertion lives in
//! a single test function; the harness gives this file its own process,
//! keeping the break away from the other test binaries.

use rmalloc::{FreeListAllocator, SbrkHeap};

#[test]
fn allocates_from_the_program_break() {
  let _ = env_logger::try_init();

  let mut allocator =
    FreeListAllocator::new(SbrkHeap::new()).expect("the data segment should be growable");
  assert!(allocator.check());

  unsafe {
    let a = allocator.allocate(24) as *mut u64;
    assert!(!a.is_null());
    assert_eq!(a as usize % 16, 0);
    a.write(0xDEAD_BEEF_DEAD_BEEF);

    // Larger than the seed chunk, forcing a break extension.
    let big = 8 * 1024;
    let b = allocator.allocate(big);
    assert!(!b.is_null());
    std::ptr::write_bytes(b, 0xAB, big);

    assert_eq!(a.read(), 0xDEAD_BEEF_DEAD_BEEF);
    assert_eq!(b.read(), 0xAB);
    assert_eq!(b.add(big - 1).read(), 0xAB);
    assert!(allocator.check());

    allocator.release(a as *mut u8);
    allocator.release(b);
    assert!(allocator.check());

    // Released memory is recycled for the next request.
    let c = allocator.allocate(24);
    assert!(!c.is_null());
    assert!(allocator.check());

    allocator.release(c);
    assert!(allocator.check());
  }
}
