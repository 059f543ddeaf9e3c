use std::{
  collections::HashMap,
  sync::{Mutex, PoisonError},
};

use log::trace;

use crate::{
  aligned::{aligned_alloc, aligned_free, aligned_realloc},
  allocator::{AlignedAllocator, AlignedReallocator, Allocator, Reallocator, Site},
};

/// Debug wrapper that accounts for every live block of the inner allocator
/// and logs each call together with its call site.
///
/// Freeing a pointer it never handed out panics.
#[derive(Debug, Default)]
pub struct TrackingAllocator<A> {
  inner: A,
  live: Mutex<HashMap<usize, usize>>,
}

impl<A> TrackingAllocator<A> {
  pub fn new(inner: A) -> Self {
    Self {
      inner,
      live: Mutex::new(HashMap::new()),
    }
  }

  pub fn inner(&self) -> &A {
    &self.inner
  }

  /// Number of blocks allocated and not yet freed.
  pub fn live_blocks(&self) -> usize {
    self.live.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  /// Sum of the sizes of all live blocks.
  pub fn live_bytes(&self) -> usize {
    self
      .live
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .values()
      .sum()
  }

  fn record(
    &self,
    ptr: *mut u8,
    size: usize,
  ) {
    if !ptr.is_null() {
      self
        .live
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(ptr as usize, size);
    }
  }

  #[track_caller]
  fn forget(
    &self,
    ptr: *mut u8,
    site: Site,
  ) -> usize {
    let size = self
      .live
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(&(ptr as usize));

    match size {
      Some(size) => size,
      None => panic!("{ptr:?} freed at {site} was not allocated by this allocator"),
    }
  }
}

impl<A: Allocator> Allocator for TrackingAllocator<A> {
  fn alloc(
    &self,
    size: usize,
    site: Site,
  ) -> *mut u8 {
    let ptr = self.inner.alloc(size, site);
    trace!("alloc {size} bytes -> {ptr:?} at {site}");
    self.record(ptr, size);
    ptr
  }

  unsafe fn free(
    &self,
    ptr: *mut u8,
    site: Site,
  ) {
    if ptr.is_null() {
      return;
    }

    let size = self.forget(ptr, site);
    trace!("free {ptr:?} ({size} bytes) at {site}");
    unsafe { self.inner.free(ptr, site) }
  }
}

impl<A: Reallocator> Reallocator for TrackingAllocator<A> {
  unsafe fn realloc(
    &self,
    ptr: *mut u8,
    size: usize,
    site: Site,
  ) -> *mut u8 {
    let old_size = if ptr.is_null() { 0 } else { self.forget(ptr, site) };

    let new_ptr = unsafe { self.inner.realloc(ptr, size, site) };
    trace!("realloc {ptr:?} ({old_size} bytes) -> {new_ptr:?} ({size} bytes) at {site}");

    if new_ptr.is_null() {
      // a zero-size realloc may free the block and return null
      if size != 0 {
        self.record(ptr, old_size);
      }
    } else {
      self.record(new_ptr, size);
    }
    new_ptr
  }
}

impl<A: Allocator> AlignedAllocator for TrackingAllocator<A> {
  fn aligned_alloc(
    &self,
    size: usize,
    align: usize,
    site: Site,
  ) -> *mut u8 {
    aligned_alloc(self, size, align, site)
  }

  unsafe fn aligned_free(
    &self,
    ptr: *mut u8,
    site: Site,
  ) {
    unsafe { aligned_free(self, ptr, site) }
  }
}

impl<A: Reallocator> AlignedReallocator for TrackingAllocator<A> {
  unsafe fn aligned_realloc(
    &self,
    ptr: *mut u8,
    size: usize,
    align: usize,
    site: Site,
  ) -> *mut u8 {
    unsafe { aligned_realloc(self, ptr, size, align, site) }
  }
}

#[cfg(test)]
mod tests {
  use std::{panic::Location, sync::Arc, thread};

  use super::*;
  use crate::{AlignedBuffer, CrtAllocator};

  #[test]
  fn test_aligned_free_leaks_nothing() {
    let tracking = TrackingAllocator::new(CrtAllocator::new());
    let site = Location::caller();

    let ptrs: Vec<_> = (0..=12)
      .map(|shift| tracking.aligned_alloc(100, 1 << shift, site))
      .collect();

    assert_eq!(tracking.live_blocks(), 13);
    assert!(tracking.live_bytes() >= 13 * 100);

    for ptr in ptrs {
      unsafe { tracking.aligned_free(ptr, site) };
    }

    assert_eq!(tracking.live_blocks(), 0);
    assert_eq!(tracking.live_bytes(), 0);
  }

  #[test]
  fn test_realloc_keeps_one_block() {
    let tracking = TrackingAllocator::new(CrtAllocator::new());
    let site = Location::caller();

    let mut ptr = tracking.aligned_alloc(10, 32, site);
    for size in [100usize, 1000, 10] {
      ptr = unsafe { tracking.aligned_realloc(ptr, size, 32, site) };
      assert_eq!(tracking.live_blocks(), 1);
      assert_eq!(tracking.live_bytes(), size + 32 + crate::aligned::HEADER_SIZE);
    }

    unsafe { tracking.aligned_free(ptr, site) };
    assert_eq!(tracking.live_bytes(), 0);
  }

  /// Frees the block on a zero-size realloc and returns null, as glibc does.
  struct FreeOnZero(CrtAllocator);

  impl Allocator for FreeOnZero {
    fn alloc(
      &self,
      size: usize,
      site: Site,
    ) -> *mut u8 {
      self.0.alloc(size, site)
    }

    unsafe fn free(
      &self,
      ptr: *mut u8,
      site: Site,
    ) {
      unsafe { self.0.free(ptr, site) }
    }
  }

  impl Reallocator for FreeOnZero {
    unsafe fn realloc(
      &self,
      ptr: *mut u8,
      size: usize,
      site: Site,
    ) -> *mut u8 {
      if size == 0 {
        unsafe { self.0.free(ptr, site) };
        return std::ptr::null_mut();
      }
      unsafe { self.0.realloc(ptr, size, site) }
    }
  }

  #[test]
  fn test_zero_size_realloc_that_frees() {
    let tracking = TrackingAllocator::new(FreeOnZero(CrtAllocator::new()));
    let site = Location::caller();

    let ptr = tracking.alloc(64, site);
    assert_eq!(tracking.live_blocks(), 1);

    let resized = unsafe { tracking.realloc(ptr, 0, site) };
    assert!(resized.is_null());
    assert_eq!(tracking.live_blocks(), 0);
    assert_eq!(tracking.live_bytes(), 0);
  }

  #[test]
  fn test_buffer_returns_memory_on_drop() {
    let tracking = TrackingAllocator::new(CrtAllocator::new());

    {
      let mut buffer = AlignedBuffer::new(&tracking, 64, 16).unwrap();
      buffer.resize(4096).unwrap();
      assert_eq!(tracking.live_blocks(), 1);
    }

    assert_eq!(tracking.live_blocks(), 0);
  }

  #[test]
  fn test_concurrent_tracking() {
    let tracking = Arc::new(TrackingAllocator::new(CrtAllocator::new()));

    let handles: Vec<_> = (0..4)
      .map(|_| {
        let tracking = tracking.clone();
        thread::spawn(move || {
          for i in 0..100 {
            let ptr = tracking.aligned_alloc(i, 64, Location::caller());
            unsafe { tracking.aligned_free(ptr, Location::caller()) };
          }
        })
      })
      .collect();

    for handle in handles {
      handle.join().unwrap();
    }

    assert_eq!(tracking.live_blocks(), 0);
  }

  #[test]
  #[should_panic(expected = "was not allocated by this allocator")]
  fn test_foreign_free_panics() {
    let tracking = TrackingAllocator::new(CrtAllocator::new());
    let mut local = 0u8;
    unsafe { tracking.free(&mut local, Location::caller()) };
  }
}
