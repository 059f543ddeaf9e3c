use std::panic::Location;

/// Call-site provenance threaded through every allocator call.
///
/// Backends are free to ignore it; [`TrackingAllocator`](crate::TrackingAllocator)
/// logs it.
pub type Site = &'static Location<'static>;

/// Minimal allocation capability every backend must provide.
///
/// Pointers returned by [`alloc`](Allocator::alloc) stay valid until they are
/// handed back to [`free`](Allocator::free) on the same allocator. A null
/// return signals exhaustion.
pub trait Allocator {
  fn alloc(
    &self,
    size: usize,
    site: Site,
  ) -> *mut u8;

  /// # Safety
  ///
  /// `ptr` must be null or a live pointer returned by this allocator.
  unsafe fn free(
    &self,
    ptr: *mut u8,
    site: Site,
  );
}

/// Optional extension: resize a block in place or by moving it.
pub trait Reallocator: Allocator {
  /// Returns null on exhaustion, in which case `ptr` is still live.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a live pointer returned by this allocator.
  unsafe fn realloc(
    &self,
    ptr: *mut u8,
    size: usize,
    site: Site,
  ) -> *mut u8;
}

/// Allocation with an explicit power-of-two alignment.
pub trait AlignedAllocator {
  fn aligned_alloc(
    &self,
    size: usize,
    align: usize,
    site: Site,
  ) -> *mut u8;

  /// # Safety
  ///
  /// `ptr` must be null or a live pointer returned by
  /// [`aligned_alloc`](AlignedAllocator::aligned_alloc) on this allocator.
  unsafe fn aligned_free(
    &self,
    ptr: *mut u8,
    site: Site,
  );
}

pub trait AlignedReallocator: AlignedAllocator {
  /// # Safety
  ///
  /// `ptr` must be null or a live aligned pointer from this allocator, and
  /// `align` must equal the alignment it was allocated with.
  unsafe fn aligned_realloc(
    &self,
    ptr: *mut u8,
    size: usize,
    align: usize,
    site: Site,
  ) -> *mut u8;
}

impl<A: Allocator + ?Sized> Allocator for &A {
  fn alloc(
    &self,
    size: usize,
    site: Site,
  ) -> *mut u8 {
    (**self).alloc(size, site)
  }

  unsafe fn free(
    &self,
    ptr: *mut u8,
    site: Site,
  ) {
    unsafe { (**self).free(ptr, site) }
  }
}

impl<A: Reallocator + ?Sized> Reallocator for &A {
  unsafe fn realloc(
    &self,
    ptr: *mut u8,
    size: usize,
    site: Site,
  ) -> *mut u8 {
    unsafe { (**self).realloc(ptr, size, site) }
  }
}

/// Allocates `size` bytes, recording the caller as provenance.
#[track_caller]
pub fn alloc<A: Allocator + ?Sized>(
  allocator: &A,
  size: usize,
) -> *mut u8 {
  allocator.alloc(size, Location::caller())
}

/// # Safety
///
/// See [`Allocator::free`].
#[track_caller]
pub unsafe fn free<A: Allocator + ?Sized>(
  allocator: &A,
  ptr: *mut u8,
) {
  unsafe { allocator.free(ptr, Location::caller()) }
}

/// # Safety
///
/// See [`Reallocator::realloc`].
#[track_caller]
pub unsafe fn realloc<A: Reallocator + ?Sized>(
  allocator: &A,
  ptr: *mut u8,
  size: usize,
) -> *mut u8 {
  unsafe { allocator.realloc(ptr, size, Location::caller()) }
}
