use thiserror::Error;

#[derive(Debug, Error)]
pub enum AllocError {
  #[error("base allocator returned null for {size} bytes (align {align})")]
  OutOfMemory { size: usize, align: usize },

  #[error("allocation of {size} bytes with align {align} overflows usize")]
  SizeOverflow { size: usize, align: usize },
}

#[derive(Debug, Error)]
pub enum SemaphoreError {
  #[error("failed to create semaphore: {0}")]
  Create(#[source] std::io::Error),
}
