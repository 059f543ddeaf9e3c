use std::{cell::UnsafeCell, io, mem::MaybeUninit};

use libc::{CLOCK_REALTIME, EAGAIN, EINTR, ETIMEDOUT, clock_gettime, sem_t, timespec};

pub(super) const TIMED_WAIT: bool = true;

const NSEC_PER_SEC: libc::c_long = 1_000_000_000;

/// Unnamed POSIX semaphore. Boxed because a `sem_t` must not move once
/// initialized.
pub(super) struct RawSemaphore {
  handle: Box<UnsafeCell<sem_t>>,
}

unsafe impl Send for RawSemaphore {}
unsafe impl Sync for RawSemaphore {}

fn errno() -> i32 {
  io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

/// Absolute `CLOCK_REALTIME` deadline `msecs` from now, as `sem_timedwait`
/// expects it.
fn deadline(msecs: u32) -> timespec {
  let mut ts = MaybeUninit::<timespec>::zeroed();
  unsafe { clock_gettime(CLOCK_REALTIME, ts.as_mut_ptr()) };
  let mut ts = unsafe { ts.assume_init() };

  ts.tv_sec += (msecs / 1000) as libc::time_t;
  ts.tv_nsec += (msecs % 1000) as libc::c_long * 1_000_000;
  if ts.tv_nsec >= NSEC_PER_SEC {
    ts.tv_sec += 1;
    ts.tv_nsec -= NSEC_PER_SEC;
  }
  ts
}

impl RawSemaphore {
  pub(super) fn new() -> io::Result<Self> {
    let handle = Box::new(UnsafeCell::new(unsafe { MaybeUninit::<sem_t>::zeroed().assume_init() }));
    if unsafe { libc::sem_init(handle.get(), 0, 0) } != 0 {
      return Err(io::Error::last_os_error());
    }
    Ok(Self { handle })
  }

  pub(super) fn post(
    &self,
    count: u32,
  ) {
    for _ in 0..count {
      let result = unsafe { libc::sem_post(self.handle.get()) };
      assert_eq!(result, 0, "sem_post failed. errno {}", errno());
    }
  }

  pub(super) fn wait(&self) -> bool {
    loop {
      if unsafe { libc::sem_wait(self.handle.get()) } == 0 {
        return true;
      }
      // interrupted by a signal handler, keep waiting
      let err = errno();
      assert_eq!(err, EINTR, "sem_wait failed. errno {err}");
    }
  }

  pub(super) fn try_wait(&self) -> bool {
    loop {
      if unsafe { libc::sem_trywait(self.handle.get()) } == 0 {
        return true;
      }
      match errno() {
        EINTR => continue,
        EAGAIN => return false,
        err => panic!("sem_trywait failed. errno {err}"),
      }
    }
  }

  /// The deadline is absolute, so retrying after EINTR keeps the original
  /// bound instead of restarting the clock.
  pub(super) fn wait_timeout(
    &self,
    msecs: u32,
  ) -> bool {
    let ts = deadline(msecs);
    loop {
      if unsafe { libc::sem_timedwait(self.handle.get(), &ts) } == 0 {
        return true;
      }
      match errno() {
        EINTR => continue,
        ETIMEDOUT => return false,
        err => panic!("sem_timedwait failed. errno {err}"),
      }
    }
  }
}

impl Drop for RawSemaphore {
  fn drop(&mut self) {
    let result = unsafe { libc::sem_destroy(self.handle.get()) };
    debug_assert_eq!(result, 0, "sem_destroy failed. errno {}", errno());
  }
}
