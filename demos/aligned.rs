use std::{panic::Location, sync::Arc, thread};

use rbase::{
  AlignedAllocator, AlignedReallocator, CrtAllocator, INFINITE, Semaphore, TrackingAllocator,
  align::is_ptr_aligned,
};

/// Prints where an aligned block landed and how far it is from the boundary.
fn print_alloc(
  label: &str,
  ptr: *mut u8,
  align: usize,
) {
  println!(
    "[{}] address = {:?}, align = {}, aligned = {}",
    label,
    ptr,
    align,
    is_ptr_aligned(ptr, align)
  );
}

fn main() {
  let allocator = TrackingAllocator::new(CrtAllocator::new());
  let site = Location::caller();

  unsafe {
    // --------------------------------------------------------------------
    // 1) Allocate 100 bytes on a cache line boundary.
    // --------------------------------------------------------------------
    let first = allocator.aligned_alloc(100, 64, site);
    print_alloc("1", first, 64);

    for i in 0..100 {
      first.add(i).write(i as u8);
    }

    // --------------------------------------------------------------------
    // 2) Grow it. The base allocator may move the block; the layer keeps
    //    both the alignment and the contents.
    // --------------------------------------------------------------------
    let grown = allocator.aligned_realloc(first, 64 * 1024, 64, site);
    print_alloc("2", grown, 64);
    println!(
      "[2] first 100 bytes intact? {}",
      (0..100).all(|i| *grown.add(i) == i as u8)
    );

    // --------------------------------------------------------------------
    // 3) A page-aligned block next to it.
    // --------------------------------------------------------------------
    let page = allocator.aligned_alloc(4096, 4096, site);
    print_alloc("3", page, 4096);
    println!(
      "[3] live blocks = {}, live bytes = {}",
      allocator.live_blocks(),
      allocator.live_bytes()
    );

    allocator.aligned_free(grown, site);
    allocator.aligned_free(page, site);
    println!("[4] after free: live blocks = {}", allocator.live_blocks());
  }

  // ----------------------------------------------------------------------
  // 5) Hand three jobs to a worker through a semaphore.
  // ----------------------------------------------------------------------
  let sem = Arc::new(Semaphore::new());
  let worker = {
    let sem = sem.clone();
    thread::spawn(move || {
      for job in 0..3 {
        sem.wait(INFINITE);
        println!("[5] worker picked up job {job}");
      }
    })
  };

  sem.post(3);
  if worker.join().is_err() {
    eprintln!("[5] worker panicked");
  }
  println!("[6] End of example.");
}
