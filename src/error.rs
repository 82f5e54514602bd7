use thiserror::Error;

/// Everything a heap operation can report.
///
/// Zero-size requests, shrinking reallocations and releasing `None` are
/// ordinary paths and never produce an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeapError {
  /// The backing refused to grow, or the request cannot be represented.
  #[error("out of memory: cannot provide {requested} bytes")]
  OutOfMemory { requested: usize },

  /// `count * size` overflows in a zeroed allocation.
  #[error("invalid argument: {count} * {size} overflows")]
  InvalidArgument { count: usize, size: usize },

  /// A released pointer does not carry the allocated tag: double release,
  /// foreign pointer, or an overflow that clobbered the header.
  #[error("heap corruption detected at {addr:#x}")]
  CorruptionDetected { addr: usize },
}

impl HeapError {
  /// Corruption means the heap's own bookkeeping can no longer be trusted.
  pub fn is_fatal(&self) -> bool {
    matches!(self, Self::CorruptionDetected { .. })
  }
}
