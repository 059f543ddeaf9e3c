//! Alignment layer on top of any [`Allocator`].
//!
//! Each block is over-allocated by `align + HEADER_SIZE` bytes. The returned
//! pointer is the first `align`-multiple that leaves room for a 4-byte header
//! in front of it, and the header stores the distance back to the raw block:
//!
//! ```text
//!   raw                         aligned
//!    │                             │
//!    ▼                             ▼
//!    ┌────────────────┬──────────┬──────────────────────────┬─────────┐
//!    │    padding     │  offset  │      size user bytes     │  slack  │
//!    └────────────────┴──────────┴──────────────────────────┴─────────┘
//!    ◄──────── offset bytes ─────►
//! ```
//!
//! Nothing else is remembered, so the same `align` must be passed to every
//! call that touches a given block.

use std::{
  mem,
  ops::{Deref, DerefMut},
  panic::Location,
  ptr::{self, NonNull},
  slice,
};

use log::warn;

use crate::{
  align::align_ptr,
  allocator::{Allocator, Reallocator, Site},
  error::AllocError,
};

/// Size of the offset header stored right before every aligned pointer.
pub const HEADER_SIZE: usize = mem::size_of::<u32>();

/// Largest alignment whose offset still fits in the header.
pub const MAX_ALIGNMENT: usize = 1 << 31;

#[track_caller]
fn check_align(align: usize) {
  assert!(align.is_power_of_two(), "alignment {align} is not a power of two");
  assert!(
    align <= MAX_ALIGNMENT,
    "alignment {align} exceeds the maximum of {MAX_ALIGNMENT}"
  );
}

/// Bytes requested from the base allocator for `size` usable bytes.
fn reserved_size(
  size: usize,
  align: usize,
) -> Option<usize> {
  size.checked_add(align + HEADER_SIZE)
}

unsafe fn read_header(aligned: *const u8) -> usize {
  unsafe { aligned.sub(HEADER_SIZE).cast::<u32>().read_unaligned() as usize }
}

unsafe fn write_header(
  aligned: *mut u8,
  offset: usize,
) {
  debug_assert!(offset >= HEADER_SIZE && offset <= u32::MAX as usize);
  unsafe { aligned.sub(HEADER_SIZE).cast::<u32>().write_unaligned(offset as u32) }
}

/// Places the aligned pointer and its header inside a fresh raw block.
unsafe fn place(
  raw: *mut u8,
  align: usize,
) -> *mut u8 {
  let aligned = align_ptr(raw, HEADER_SIZE, align);
  unsafe { write_header(aligned, aligned as usize - raw as usize) };
  aligned
}

/// Allocates `size` bytes aligned to `align` from `allocator`.
///
/// Returns null when the base allocator does. `size` may be zero.
///
/// # Panics
///
/// Panics if `align` is not a power of two or exceeds [`MAX_ALIGNMENT`].
pub fn aligned_alloc<A: Allocator + ?Sized>(
  allocator: &A,
  size: usize,
  align: usize,
  site: Site,
) -> *mut u8 {
  check_align(align);

  let Some(total) = reserved_size(size, align) else {
    warn!("aligned alloc of {size} bytes (align {align}) overflows, at {site}");
    return ptr::null_mut();
  };

  let raw = allocator.alloc(total, site);
  if raw.is_null() {
    warn!("base allocator returned null for {total} bytes, at {site}");
    return ptr::null_mut();
  }

  unsafe { place(raw, align) }
}

/// Returns a block obtained from [`aligned_alloc`] or [`aligned_realloc`] to
/// `allocator`. Null is a no-op.
///
/// # Safety
///
/// `ptr` must be null or a live pointer returned by this layer on the same
/// allocator.
pub unsafe fn aligned_free<A: Allocator + ?Sized>(
  allocator: &A,
  ptr: *mut u8,
  site: Site,
) {
  if ptr.is_null() {
    return;
  }

  unsafe {
    let offset = read_header(ptr);
    allocator.free(ptr.sub(offset), site);
  }
}

/// Resizes an aligned block to `size` usable bytes, keeping its alignment.
///
/// A null `ptr` behaves as [`aligned_alloc`]. The first `min(old, size)` bytes
/// are preserved. On failure null is returned and `ptr` remains valid.
///
/// # Safety
///
/// `ptr` must be null or a live pointer returned by this layer on the same
/// allocator, and `align` must equal the alignment it was allocated with.
pub unsafe fn aligned_realloc<A: Reallocator + ?Sized>(
  allocator: &A,
  ptr: *mut u8,
  size: usize,
  align: usize,
  site: Site,
) -> *mut u8 {
  if ptr.is_null() {
    return aligned_alloc(allocator, size, align, site);
  }

  check_align(align);

  let Some(total) = reserved_size(size, align) else {
    warn!("aligned realloc to {size} bytes (align {align}) overflows, at {site}");
    return ptr::null_mut();
  };

  unsafe {
    let offset = read_header(ptr);
    let raw = ptr.sub(offset);

    let new_raw = allocator.realloc(raw, total, site);
    if new_raw.is_null() {
      warn!("base allocator failed to resize to {total} bytes, at {site}");
      return ptr::null_mut();
    }

    let new_aligned = align_ptr(new_raw, HEADER_SIZE, align);
    let moved = new_raw.add(offset);

    // The header lies below `align + HEADER_SIZE`, so the base realloc kept it.
    if new_aligned == moved {
      return new_aligned;
    }

    ptr::copy(moved, new_aligned, size);
    write_header(new_aligned, new_aligned as usize - new_raw as usize);
    new_aligned
  }
}

/// Moves `value` into memory from the layer, aligned for `T`.
///
/// Returns null (dropping `value`) when allocation fails.
#[track_caller]
pub fn new_object<T, A: Allocator + ?Sized>(
  allocator: &A,
  value: T,
) -> *mut T {
  let ptr = aligned_alloc(
    allocator,
    mem::size_of::<T>(),
    mem::align_of::<T>(),
    Location::caller(),
  )
  .cast::<T>();

  if !ptr.is_null() {
    unsafe { ptr.write(value) };
  }
  ptr
}

/// Drops the object and frees its memory. Null is a no-op.
///
/// # Safety
///
/// `object` must be null or come from [`new_object`] on the same allocator,
/// and must not be used afterwards.
#[track_caller]
pub unsafe fn delete_object<T, A: Allocator + ?Sized>(
  allocator: &A,
  object: *mut T,
) {
  if object.is_null() {
    return;
  }

  unsafe {
    ptr::drop_in_place(object);
    aligned_free(allocator, object.cast::<u8>(), Location::caller());
  }
}

/// Owned, zero-initialized byte buffer with a guaranteed alignment.
///
/// Only the user-visible range is reachable; the header and padding stay
/// behind the pointer. The block goes back to the allocator on drop.
pub struct AlignedBuffer<A: Allocator> {
  allocator: A,
  ptr: NonNull<u8>,
  len: usize,
  align: usize,
}

impl<A: Allocator> AlignedBuffer<A> {
  #[track_caller]
  pub fn new(
    allocator: A,
    len: usize,
    align: usize,
  ) -> Result<Self, AllocError> {
    check_align(align);
    if reserved_size(len, align).is_none() {
      return Err(AllocError::SizeOverflow { size: len, align });
    }

    let raw = aligned_alloc(&allocator, len, align, Location::caller());
    let ptr = NonNull::new(raw).ok_or(AllocError::OutOfMemory { size: len, align })?;
    unsafe { ptr::write_bytes(ptr.as_ptr(), 0, len) };

    Ok(Self {
      allocator,
      ptr,
      len,
      align,
    })
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  pub fn align(&self) -> usize {
    self.align
  }

  pub fn as_ptr(&self) -> *const u8 {
    self.ptr.as_ptr()
  }

  pub fn as_mut_ptr(&mut self) -> *mut u8 {
    self.ptr.as_ptr()
  }
}

impl<A: Reallocator> AlignedBuffer<A> {
  /// Changes the length, keeping the prefix and zero-filling any growth.
  ///
  /// On error the buffer is left untouched.
  #[track_caller]
  pub fn resize(
    &mut self,
    len: usize,
  ) -> Result<(), AllocError> {
    if reserved_size(len, self.align).is_none() {
      return Err(AllocError::SizeOverflow {
        size: len,
        align: self.align,
      });
    }

    let raw = unsafe {
      aligned_realloc(
        &self.allocator,
        self.ptr.as_ptr(),
        len,
        self.align,
        Location::caller(),
      )
    };
    self.ptr = NonNull::new(raw).ok_or(AllocError::OutOfMemory {
      size: len,
      align: self.align,
    })?;

    if len > self.len {
      unsafe { ptr::write_bytes(self.ptr.as_ptr().add(self.len), 0, len - self.len) };
    }
    self.len = len;
    Ok(())
  }
}

impl<A: Allocator> Deref for AlignedBuffer<A> {
  type Target = [u8];

  fn deref(&self) -> &[u8] {
    unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
  }
}

impl<A: Allocator> DerefMut for AlignedBuffer<A> {
  fn deref_mut(&mut self) -> &mut [u8] {
    unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
  }
}

impl<A: Allocator> Drop for AlignedBuffer<A> {
  fn drop(&mut self) {
    unsafe { aligned_free(&self.allocator, self.ptr.as_ptr(), Location::caller()) };
  }
}

unsafe impl<A: Allocator + Send> Send for AlignedBuffer<A> {}
unsafe impl<A: Allocator + Sync> Sync for AlignedBuffer<A> {}
