use std::{
  ffi::CString,
  io,
  sync::atomic::{AtomicU32, Ordering},
};

use libc::{EAGAIN, EINTR, O_CREAT, O_EXCL, sem_t};

/// No `sem_timedwait` here; only infinite waits and polling.
pub(super) const TIMED_WAIT: bool = false;

/// Named POSIX semaphore. The name is unlinked right after creation, so
/// the object lives only as long as this handle.
pub(super) struct RawSemaphore {
  handle: *mut sem_t,
}

unsafe impl Send for RawSemaphore {}
unsafe impl Sync for RawSemaphore {}

fn errno() -> i32 {
  io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

fn unique_name() -> CString {
  static NEXT: AtomicU32 = AtomicU32::new(0);
  let id = NEXT.fetch_add(1, Ordering::Relaxed);
  // sem_open names are capped at 31 bytes on darwin
  CString::new(format!("/rbase.{}.{id}", std::process::id()))
    .unwrap_or_else(|_| c"/rbase".to_owned())
}

impl RawSemaphore {
  pub(super) fn new() -> io::Result<Self> {
    let name = unique_name();
    let handle = unsafe {
      libc::sem_open(
        name.as_ptr(),
        O_CREAT | O_EXCL,
        0o600 as libc::c_uint,
        0 as libc::c_uint,
      )
    };
    if handle == libc::SEM_FAILED {
      return Err(io::Error::last_os_error());
    }

    unsafe { libc::sem_unlink(name.as_ptr()) };
    Ok(Self { handle })
  }

  pub(super) fn post(
    &self,
    count: u32,
  ) {
    for _ in 0..count {
      let result = unsafe { libc::sem_post(self.handle) };
      assert_eq!(result, 0, "sem_post failed. errno {}", errno());
    }
  }

  pub(super) fn wait(&self) -> bool {
    loop {
      if unsafe { libc::sem_wait(self.handle) } == 0 {
        return true;
      }
      let err = errno();
      assert_eq!(err, EINTR, "sem_wait failed. errno {err}");
    }
  }

  pub(super) fn try_wait(&self) -> bool {
    loop {
      if unsafe { libc::sem_trywait(self.handle) } == 0 {
        return true;
      }
      match errno() {
        EINTR => continue,
        EAGAIN => return false,
        err => panic!("sem_trywait failed. errno {err}"),
      }
    }
  }

  pub(super) fn wait_timeout(
    &self,
    _msecs: u32,
  ) -> bool {
    unreachable!("timed waits are rejected before reaching this backend")
  }
}

impl Drop for RawSemaphore {
  fn drop(&mut self) {
    unsafe { libc::sem_close(self.handle) };
  }
}
