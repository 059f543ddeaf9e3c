use std::{
  io,
  sync::{Condvar, Mutex, MutexGuard, PoisonError},
  time::{Duration, Instant},
};

pub(super) const TIMED_WAIT: bool = true;

/// Counter guarded by a mutex, with a condition variable to park waiters.
pub(super) struct RawSemaphore {
  count: Mutex<u32>,
  cond: Condvar,
}

impl RawSemaphore {
  pub(super) fn new() -> io::Result<Self> {
    Ok(Self {
      count: Mutex::new(0),
      cond: Condvar::new(),
    })
  }

  // The counter is always consistent, so a poisoned lock is still usable.
  fn lock(&self) -> MutexGuard<'_, u32> {
    self.count.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub(super) fn post(
    &self,
    count: u32,
  ) {
    let mut guard = self.lock();
    let Some(next) = guard.checked_add(count) else {
      panic!("semaphore count overflow: {} + {count}", *guard);
    };
    *guard = next;
    // woken threads recheck the count, so at most `count` of them get through
    if count == 1 {
      self.cond.notify_one();
    } else {
      self.cond.notify_all();
    }
  }

  pub(super) fn wait(&self) -> bool {
    let mut guard = self.lock();
    while *guard == 0 {
      guard = self.cond.wait(guard).unwrap_or_else(PoisonError::into_inner);
    }
    *guard -= 1;
    true
  }

  pub(super) fn try_wait(&self) -> bool {
    let mut guard = self.lock();
    if *guard == 0 {
      return false;
    }
    *guard -= 1;
    true
  }

  /// Spurious wakeups go back to sleep for whatever is left until the
  /// deadline fixed on entry.
  pub(super) fn wait_timeout(
    &self,
    msecs: u32,
  ) -> bool {
    let deadline = Instant::now() + Duration::from_millis(msecs as u64);
    let mut guard = self.lock();

    while *guard == 0 {
      let remaining = deadline.saturating_duration_since(Instant::now());
      if remaining.is_zero() {
        return false;
      }
      guard = self
        .cond
        .wait_timeout(guard, remaining)
        .unwrap_or_else(PoisonError::into_inner)
        .0;
    }

    *guard -= 1;
    true
  }
}
