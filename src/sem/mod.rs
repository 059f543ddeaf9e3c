//! Counting semaphore.
//!
//! Exactly one backend is compiled in, picked by target (and the
//! `condvar-semaphore` feature):
//!
//! ```text
//!   target                        backend
//!   ─────────────────────────     ──────────────────────────────────
//!   windows                       sem_win.rs      CreateSemaphoreW
//!   unix, not apple               sem_posix.rs    unnamed sem_t
//!   apple                         sem_named.rs    sem_open (no timeouts)
//!   anything else / feature on    sem_condvar.rs  Mutex + Condvar
//! ```

use log::error;

use crate::error::SemaphoreError;

#[cfg_attr(feature = "condvar-semaphore", path = "sem_condvar.rs")]
#[cfg_attr(
  all(not(feature = "condvar-semaphore"), windows),
  path = "sem_win.rs"
)]
#[cfg_attr(
  all(
    not(feature = "condvar-semaphore"),
    unix,
    not(target_vendor = "apple")
  ),
  path = "sem_posix.rs"
)]
#[cfg_attr(
  all(not(feature = "condvar-semaphore"), target_vendor = "apple"),
  path = "sem_named.rs"
)]
#[cfg_attr(
  all(not(feature = "condvar-semaphore"), not(any(windows, unix))),
  path = "sem_condvar.rs"
)]
mod imp;

/// Timeout value that waits until the semaphore is posted.
pub const INFINITE: i32 = -1;

#[track_caller]
fn check_timeout(
  msecs: i32,
  timed_wait: bool,
) {
  assert!(
    msecs <= 0 || timed_wait,
    "this platform's semaphore only supports infinite waits (got {msecs} ms)"
  );
}

/// A counting semaphore for coordinating threads.
///
/// `post` never blocks. `wait` blocks the calling thread until the count is
/// positive, then takes one unit. Waiters are not woken in any particular
/// order.
///
/// ```rust
/// use rbase::{INFINITE, Semaphore};
///
/// let sem = Semaphore::new();
/// sem.post(2);
/// assert!(sem.wait(INFINITE));
/// assert!(sem.try_wait());
/// assert!(!sem.try_wait());
/// ```
pub struct Semaphore {
  raw: imp::RawSemaphore,
}

impl Semaphore {
  /// Whether the compiled backend honours finite timeouts.
  pub const TIMED_WAIT: bool = imp::TIMED_WAIT;

  /// Creates a semaphore with a count of zero.
  ///
  /// # Panics
  ///
  /// Panics if the OS refuses to create the primitive.
  pub fn new() -> Self {
    match Self::try_new() {
      Ok(sem) => sem,
      Err(err) => {
        error!("{err}");
        panic!("{err}");
      }
    }
  }

  pub fn try_new() -> Result<Self, SemaphoreError> {
    let raw = imp::RawSemaphore::new().map_err(SemaphoreError::Create)?;
    Ok(Self { raw })
  }

  /// Adds `count` to the semaphore, releasing up to `count` waiters.
  pub fn post(
    &self,
    count: u32,
  ) {
    if count > 0 {
      self.raw.post(count);
    }
  }

  /// Takes one unit, waiting at most `msecs` milliseconds for it.
  ///
  /// A negative `msecs` waits forever and zero only polls. Returns `false`
  /// on timeout, leaving the count untouched.
  ///
  /// # Panics
  ///
  /// Panics on a positive timeout when [`Semaphore::TIMED_WAIT`] is `false`.
  #[track_caller]
  pub fn wait(
    &self,
    msecs: i32,
  ) -> bool {
    check_timeout(msecs, Self::TIMED_WAIT);

    match msecs {
      ..0 => self.raw.wait(),
      0 => self.raw.try_wait(),
      _ => self.raw.wait_timeout(msecs as u32),
    }
  }

  /// Takes one unit if one is available right now.
  pub fn try_wait(&self) -> bool {
    self.raw.try_wait()
  }
}

impl Default for Semaphore {
  fn default() -> Self {
    Self::new()
  }
}

impl std::fmt::Debug for Semaphore {
  fn fmt(
    &self,
    f: &mut std::fmt::Formatter<'_>,
  ) -> std::fmt::Result {
    f.debug_struct("Semaphore").finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use std::{
    sync::{
      Arc,
      atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::{Duration, Instant},
  };

  use super::*;

  fn assert_send_sync<T: Send + Sync>() {}

  #[test]
  fn test_is_send_sync() {
    assert_send_sync::<Semaphore>();
  }

  #[test]
  fn test_post_then_wait_same_thread() {
    let sem = Semaphore::new();
    sem.post(3);

    assert!(sem.wait(INFINITE));
    assert!(sem.wait(INFINITE));
    assert!(sem.wait(INFINITE));

    if Semaphore::TIMED_WAIT {
      let start = Instant::now();
      assert!(!sem.wait(50));
      assert!(start.elapsed() >= Duration::from_millis(50));
    }
  }

  #[test]
  fn test_post_zero_is_noop() {
    let sem = Semaphore::new();
    sem.post(0);
    assert!(!sem.try_wait());
  }

  #[test]
  fn test_timeout_leaves_count_unchanged() {
    if !Semaphore::TIMED_WAIT {
      return;
    }

    let sem = Semaphore::new();
    assert!(!sem.wait(10));
    sem.post(1);
    assert!(sem.wait(10));
    assert!(!sem.try_wait());
  }

  #[test]
  fn test_timeouts_past_one_second() {
    if !Semaphore::TIMED_WAIT {
      return;
    }

    let sem = Arc::new(Semaphore::new());
    let poster = {
      let sem = sem.clone();
      thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        sem.post(1);
      })
    };

    assert!(sem.wait(1500));
    poster.join().unwrap();
  }

  #[test]
  fn test_cross_thread_handoff() {
    let sem = Arc::new(Semaphore::new());

    let waiter = {
      let sem = sem.clone();
      thread::spawn(move || sem.wait(INFINITE))
    };

    thread::sleep(Duration::from_millis(20));
    sem.post(1);

    assert!(waiter.join().unwrap());
    assert!(!sem.try_wait());
  }

  #[test]
  fn test_concurrent_fan_out() {
    const POSTERS: usize = 8;
    const WAITERS: usize = 5;

    let sem = Arc::new(Semaphore::new());
    let woken = Arc::new(AtomicUsize::new(0));

    let waiters: Vec<_> = (0..WAITERS)
      .map(|_| {
        let sem = sem.clone();
        let woken = woken.clone();
        thread::spawn(move || {
          assert!(sem.wait(INFINITE));
          woken.fetch_add(1, Ordering::SeqCst);
        })
      })
      .collect();

    let posters: Vec<_> = (0..POSTERS)
      .map(|_| {
        let sem = sem.clone();
        thread::spawn(move || sem.post(1))
      })
      .collect();

    for handle in posters.into_iter().chain(waiters) {
      handle.join().unwrap();
    }

    assert_eq!(woken.load(Ordering::SeqCst), WAITERS);

    // whatever was not consumed is still there
    for _ in 0..(POSTERS - WAITERS) {
      assert!(sem.wait(INFINITE));
    }
    assert!(!sem.try_wait());
  }

  #[test]
  fn test_batch_post_wakes_many() {
    let sem = Arc::new(Semaphore::new());

    let waiters: Vec<_> = (0..4)
      .map(|_| {
        let sem = sem.clone();
        thread::spawn(move || sem.wait(INFINITE))
      })
      .collect();

    thread::sleep(Duration::from_millis(20));
    sem.post(4);

    for handle in waiters {
      assert!(handle.join().unwrap());
    }
  }

  #[test]
  #[cfg(all(target_vendor = "apple", not(feature = "condvar-semaphore")))]
  #[should_panic(expected = "only supports infinite waits")]
  fn test_timed_wait_unsupported_panics() {
    let sem = Semaphore::new();
    sem.wait(10);
  }

  #[test]
  #[should_panic(expected = "only supports infinite waits")]
  fn test_positive_timeout_rejected_without_timed_wait() {
    check_timeout(10, false);
  }

  #[test]
  fn test_infinite_and_poll_allowed_without_timed_wait() {
    check_timeout(INFINITE, false);
    check_timeout(i32::MIN, false);
    check_timeout(0, false);
    check_timeout(i32::MAX, true);
  }

  #[cfg(unix)]
  mod interrupted {
    use std::{os::unix::thread::JoinHandleExt, ptr};

    use super::*;

    const SIGNALS: usize = 20;

    extern "C" fn ignore_signal(_: libc::c_int) {}

    /// No SA_RESTART, so blocked waits see EINTR.
    fn install_sigusr1_handler() {
      unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = ignore_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        action.sa_flags = 0;
        libc::sigemptyset(&mut action.sa_mask);
        assert_eq!(libc::sigaction(libc::SIGUSR1, &action, ptr::null_mut()), 0);
      }
    }

    fn pester<T>(handle: &thread::JoinHandle<T>) {
      for _ in 0..SIGNALS {
        thread::sleep(Duration::from_millis(10));
        unsafe { libc::pthread_kill(handle.as_pthread_t() as libc::pthread_t, libc::SIGUSR1) };
      }
    }

    #[test]
    fn test_timed_wait_survives_signals() {
      if !Semaphore::TIMED_WAIT {
        return;
      }
      install_sigusr1_handler();

      let sem = Arc::new(Semaphore::new());
      let waiter = {
        let sem = sem.clone();
        thread::spawn(move || {
          let start = Instant::now();
          (sem.wait(300), start.elapsed())
        })
      };

      pester(&waiter);

      let (taken, elapsed) = waiter.join().unwrap();
      assert!(!taken);
      assert!(elapsed >= Duration::from_millis(300), "returned after {elapsed:?}");
    }

    #[test]
    fn test_infinite_wait_survives_signals() {
      install_sigusr1_handler();

      let sem = Arc::new(Semaphore::new());
      let waiter = {
        let sem = sem.clone();
        thread::spawn(move || sem.wait(INFINITE))
      };

      pester(&waiter);
      sem.post(1);

      assert!(waiter.join().unwrap());
      assert!(!sem.try_wait());
    }
  }
}
