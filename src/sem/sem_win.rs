use std::{io, ptr};

use windows_sys::Win32::{
  Foundation::{CloseHandle, HANDLE, WAIT_FAILED, WAIT_OBJECT_0},
  System::Threading::{CreateSemaphoreW, INFINITE, ReleaseSemaphore, WaitForSingleObject},
};

pub(super) const TIMED_WAIT: bool = true;

pub(super) struct RawSemaphore {
  handle: HANDLE,
}

unsafe impl Send for RawSemaphore {}
unsafe impl Sync for RawSemaphore {}

impl RawSemaphore {
  pub(super) fn new() -> io::Result<Self> {
    let handle = unsafe { CreateSemaphoreW(ptr::null(), 0, i32::MAX, ptr::null()) };
    if handle.is_null() {
      return Err(io::Error::last_os_error());
    }
    Ok(Self { handle })
  }

  pub(super) fn post(
    &self,
    count: u32,
  ) {
    let count = count.min(i32::MAX as u32) as i32;
    let result = unsafe { ReleaseSemaphore(self.handle, count, ptr::null_mut()) };
    assert_ne!(result, 0, "ReleaseSemaphore failed: {}", io::Error::last_os_error());
  }

  pub(super) fn wait(&self) -> bool {
    self.wait_millis(INFINITE)
  }

  pub(super) fn try_wait(&self) -> bool {
    self.wait_millis(0)
  }

  pub(super) fn wait_timeout(
    &self,
    msecs: u32,
  ) -> bool {
    self.wait_millis(msecs)
  }

  fn wait_millis(
    &self,
    msecs: u32,
  ) -> bool {
    let result = unsafe { WaitForSingleObject(self.handle, msecs) };
    assert_ne!(
      result,
      WAIT_FAILED,
      "WaitForSingleObject failed: {}",
      io::Error::last_os_error()
    );
    result == WAIT_OBJECT_0
  }
}

impl Drop for RawSemaphore {
  fn drop(&mut self) {
    unsafe { CloseHandle(self.handle) };
  }
}
