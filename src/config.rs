/// How the free list is searched for a block that fits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FitPolicy {
  /// Always scan from the list head and take the first block that fits.
  #[default]
  FirstFit,
  /// Resume scanning where the previous allocation stopped, wrapping to
  /// the head once.
  NextFit,
}

/// Per-heap settings. Fixed for the lifetime of the heap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeapConfig {
  pub fit: FitPolicy,
  /// Emit `log` records for growth, splits, merges and corruption. Leave
  /// this off for a heap installed as the global allocator: a logger that
  /// allocates would re-enter the heap.
  pub debug_output: bool,
}

impl HeapConfig {
  pub const fn new() -> Self {
    Self {
      fit: FitPolicy::FirstFit,
      debug_output: false,
    }
  }

  pub const fn with_fit(
    mut self,
    fit: FitPolicy,
  ) -> Self {
    self.fit = fit;
    self
  }

  pub const fn with_debug_output(
    mut self,
    enabled: bool,
  ) -> Self {
    self.debug_output = enabled;
    self
  }
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self::new()
  }
}
