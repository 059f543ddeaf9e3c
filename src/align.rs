/// Default alignment used by the pointer helpers when the caller has no
/// stronger requirement.
pub const NATURAL_ALIGNMENT: usize = 8;

/// Calculates the machine word alignment for the given size.
///
/// # Examples
///
/// ```rust
/// use std::mem;
/// use rbase::align;
///
/// match mem::size_of::<usize>() {
///     8 => assert_eq!(align!(13), 16), // 64 bit machine.
///     4 => assert_eq!(align!(11), 12), // 32 bit machine.
///     _ => {},
/// };
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align_to!($value, ::core::mem::size_of::<usize>())
  };
}

/// Rounds `value` up to the next multiple of `align`, which must be a power
/// of two.
///
/// ```rust
/// use rbase::align_to;
///
/// assert_eq!(align_to!(0, 16), 0);
/// assert_eq!(align_to!(17, 16), 32);
/// assert_eq!(align_to!(4096, 4096), 4096);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $align:expr) => {
    ($value + $align - 1) & !($align - 1)
  };
}

/// Aligns `ptr + extra` up to the nearest multiple of `align`.
///
/// `extra` reserves room in front of the result, e.g. for a header.
/// `align` must be a power of two.
#[inline]
pub fn align_ptr(
  ptr: *mut u8,
  extra: usize,
  align: usize,
) -> *mut u8 {
  debug_assert!(align.is_power_of_two());
  let unaligned = ptr as usize + extra;
  let aligned = align_to!(unaligned, align);
  ptr.wrapping_add(aligned - ptr as usize)
}

/// Checks whether `ptr` is a multiple of `align`. `align` must be a power of two.
#[inline]
pub fn is_ptr_aligned(
  ptr: *const u8,
  align: usize,
) -> bool {
  debug_assert!(align.is_power_of_two());
  (ptr as usize) & (align - 1) == 0
}
