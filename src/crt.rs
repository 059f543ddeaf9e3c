use libc::{c_void, free, malloc, realloc};

use crate::{
  aligned::{aligned_alloc, aligned_free, aligned_realloc},
  allocator::{AlignedAllocator, AlignedReallocator, Allocator, Reallocator, Site},
};

/// Allocator backed by the C runtime heap.
///
/// Stateless and thread-safe, since `malloc`/`free`/`realloc` are.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrtAllocator;

impl CrtAllocator {
  pub const fn new() -> Self {
    Self
  }
}

impl Allocator for CrtAllocator {
  fn alloc(
    &self,
    size: usize,
    _site: Site,
  ) -> *mut u8 {
    unsafe { malloc(size) as *mut u8 }
  }

  unsafe fn free(
    &self,
    ptr: *mut u8,
    _site: Site,
  ) {
    unsafe { free(ptr as *mut c_void) }
  }
}

impl Reallocator for CrtAllocator {
  unsafe fn realloc(
    &self,
    ptr: *mut u8,
    size: usize,
    _site: Site,
  ) -> *mut u8 {
    unsafe { realloc(ptr as *mut c_void, size) as *mut u8 }
  }
}

impl AlignedAllocator for CrtAllocator {
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

impl AlignedReallocator for CrtAllocator {
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
