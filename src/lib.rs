//! # rbase - Aligned Allocation and Counting Semaphores
//!
//! This crate provides two small building blocks for native code:
//!
//! - an **alignment layer** that turns any plain allocator (`alloc`/`free`,
//!   optionally `realloc`) into one that serves arbitrary power-of-two
//!   alignments, and
//! - a cross-platform **counting semaphore** for handing work between threads.
//!
//! ## Crate Structure
//!
//! ```text
//!   rbase
//!   ├── align      - Alignment macros (align!, align_to!) and pointer helpers
//!   ├── allocator  - Allocator capability traits and call-site provenance
//!   ├── aligned    - Offset-header alignment layer, AlignedBuffer
//!   ├── crt        - CrtAllocator (malloc/free/realloc)
//!   ├── tracking   - TrackingAllocator (live block accounting + logging)
//!   ├── sem        - Semaphore, one OS backend per target
//!   └── error      - AllocError, SemaphoreError
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::panic::Location;
//! use rbase::{AlignedAllocator, CrtAllocator, align::is_ptr_aligned};
//!
//! let crt = CrtAllocator::new();
//!
//! let ptr = crt.aligned_alloc(100, 64, Location::caller());
//! assert!(is_ptr_aligned(ptr, 64));
//!
//! unsafe { crt.aligned_free(ptr, Location::caller()) };
//! ```
//!
//! The safe wrapper owns the block and frees it on drop:
//!
//! ```rust
//! use rbase::{AlignedBuffer, CrtAllocator};
//!
//! let mut buffer = AlignedBuffer::new(CrtAllocator::new(), 1024, 4096).unwrap();
//! buffer[0] = 1;
//! buffer.resize(8192).unwrap();
//! assert_eq!(buffer[0], 1);
//! ```
//!
//! ## How It Works
//!
//! Every aligned block is carved out of a larger raw block. The 4-byte word in
//! front of the returned pointer records how far back the raw block starts:
//!
//! ```text
//!   Single Aligned Allocation (align = 64):
//!   ┌──────────────────┬────────┬────────────────────────────┬───────┐
//!   │     padding      │ offset │       User Data            │ slack │
//!   └──────────────────┴────────┴────────────────────────────┴───────┘
//!   ▲                            ▲
//!   raw (from base allocator)    └── Pointer returned to user (64-aligned)
//! ```
//!
//! Free and realloc read the header to find the raw block again, so they must
//! be given the same alignment as the original allocation.
//!
//! ## Limitations
//!
//! - **No locking in the alignment layer**: it is exactly as thread-safe as
//!   the allocator underneath it
//! - **Alignment is not recorded**: callers must pass the same value to every
//!   call on a block
//! - **Apple targets**: the default semaphore backend only supports infinite
//!   waits; enable `condvar-semaphore` for timeouts
//!
//! ## Testing
//!
//! `cargo test` exercises the native semaphore backend of the host. Run
//! `cargo test --features condvar-semaphore` as well to cover the
//! mutex/condvar backend.
//!
//! ## Safety
//!
//! The raw pointer API mirrors `malloc`/`free` and is `unsafe` where pointers
//! are consumed. [`AlignedBuffer`] and [`Semaphore`] are safe.

pub mod align;
pub mod aligned;
pub mod allocator;
mod crt;
pub mod error;
mod sem;
mod tracking;

pub use aligned::{
  AlignedBuffer, aligned_alloc, aligned_free, aligned_realloc, delete_object, new_object,
};
pub use allocator::{AlignedAllocator, AlignedReallocator, Allocator, Reallocator, Site};
pub use crt::CrtAllocator;
pub use error::{AllocError, SemaphoreError};
pub use sem::{INFINITE, Semaphore};
pub use tracking::TrackingAllocator;
