use std::{io::Read, ptr};

use libc::sbrk;
use rmalloc::{FreeListAllocator, SbrkHeap};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`,
/// `htop`, `gdb`, or just visually track how allocations change the
/// program break.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break using `sbrk(0)`.
/// The program break is the upper boundary of the heap managed via brk/sbrk.
unsafe fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn main() {
  // RUST_LOG=trace surfaces one line per allocator operation,
  // RUST_LOG=debug adds the block-by-block heap dumps below.
  env_logger::init();

  // The allocator seeds the heap with one 4 KiB free block up front and
  // grows the program break only when that space runs out.
  let mut allocator =
    FreeListAllocator::new(SbrkHeap::new()).expect("the data segment should be growable");

  unsafe {
    // Initial heap state
    print_program_break("start");
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 1) Allocate space for a u32. The request is padded to the minimum
    //    32-byte block, carved from the seed chunk.
    // --------------------------------------------------------------------
    let first_block = allocator.allocate(4);
    println!("\n[1] Allocate 4 bytes -> {first_block:?}");

    let first_ptr = first_block as *mut u32;
    first_ptr.write(0xDEADBEEF);
    println!("[1] Value written to first_block = 0x{:X}", first_ptr.read());

    allocator.dump();
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 2) Allocate 12 bytes. Note that the program break does not move:
    //    both blocks come out of the seed chunk.
    // --------------------------------------------------------------------
    let second_block = allocator.allocate(12);
    println!("\n[2] Allocate 12 bytes -> {second_block:?}");

    ptr::write_bytes(second_block, 0xAB, 12);
    println!("[2] Initialized second block with 0xAB");

    print_program_break("after two small allocations");
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 3) Check payload alignment: every payload sits on a 16-byte
    //    boundary regardless of the requested size.
    // --------------------------------------------------------------------
    let third_block = allocator.allocate(8);
    let addr = third_block as usize;
    println!("\n[3] Allocate 8 bytes -> {third_block:?}");
    println!("[3] Address = {:#X}, addr % 16 = {}", addr, addr % 16);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 4) Release the first block. It is coalesced with any free
    //    neighbour and goes to the head of the free list.
    // --------------------------------------------------------------------
    allocator.release(first_block);
    println!("\n[4] Released first_block at {first_block:?}");
    println!("[4] Heap consistent: {}", allocator.check());

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 5) Allocate 2 bytes. First fit finds the freed block at the list
    //    head, so the address comes back.
    // --------------------------------------------------------------------
    let fourth_block = allocator.allocate(2);
    println!("\n[5] Allocate 2 bytes (check reuse of freed block)");

    println!(
      "[5] fourth_block == first_block? {}",
      if fourth_block == first_block {
        "Yes, it reused the freed block"
      } else {
        "No, it allocated somewhere else"
      }
    );

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 6) Allocate a large block to observe heap growth. 64 KiB cannot
    //    come out of the 4 KiB seed chunk, so the break moves.
    // --------------------------------------------------------------------
    print_program_break("before large alloc");

    let big_block = allocator.allocate(64 * 1024);
    println!("\n[6] Allocate large 64 KiB block -> {big_block:?}");

    print_program_break("after large alloc");
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 7) Release everything. Coalescing folds the heap back into large
    //    free blocks that future allocations will reuse; the break never
    //    moves back down.
    // --------------------------------------------------------------------
    allocator.release(second_block);
    allocator.release(third_block);
    allocator.release(fourth_block);
    allocator.release(big_block);

    println!("\n[7] Released all blocks. Heap consistent: {}", allocator.check());
    allocator.dump();
    print_program_break("end");

    println!("\n[8] End of walkthrough. The OS reclaims the heap on exit.");
  }
}
