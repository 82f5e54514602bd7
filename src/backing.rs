//! Heap-growth adapters.
//!
//! A [`Backing`] is the only thing a [`Heap`](crate::Heap) knows about memory:
//! it can push its break upwards and read or write words and bytes below it.
//! Addresses are plain `usize` values whose meaning belongs to the backing.

use crate::error::HeapError;

const WORD: usize = size_of::<usize>();

/// Default ceiling for an [`Arena`], in bytes.
pub const DEFAULT_ARENA_LIMIT: usize = 64 * 1024 * 1024;

/// Contiguous memory that grows on demand and never shrinks.
pub trait Backing {
  /// Extends the break by `increment` bytes and returns the address of the
  /// first new byte. Either the whole increment is committed or nothing is.
  fn extend(
    &mut self,
    increment: usize,
  ) -> Result<usize, HeapError>;

  /// Returns whether `[addr, addr + len)` lies in memory this backing has
  /// handed out.
  fn contains(
    &self,
    addr: usize,
    len: usize,
  ) -> bool;

  fn read_word(
    &self,
    addr: usize,
  ) -> usize;

  fn write_word(
    &mut self,
    addr: usize,
    value: usize,
  );

  fn bytes(
    &self,
    addr: usize,
    len: usize,
  ) -> &[u8];

  fn bytes_mut(
    &mut self,
    addr: usize,
    len: usize,
  ) -> &mut [u8];

  /// Copies `len` bytes from `src` to `dst`. The ranges may overlap.
  fn copy_within(
    &mut self,
    src: usize,
    dst: usize,
    len: usize,
  );
}

/// A heap image held in a single growable byte buffer.
///
/// Addresses are offsets into the buffer, so the buffer may move when it
/// grows without invalidating anything the heap has handed out. Growth past
/// `limit` fails the same way a refused `sbrk` does.
#[derive(Debug, Clone)]
pub struct Arena {
  bytes: Vec<u8>,
  limit: usize,
}

impl Arena {
  pub fn new() -> Self {
    Self::with_limit(DEFAULT_ARENA_LIMIT)
  }

  pub fn with_limit(limit: usize) -> Self {
    Self {
      bytes: Vec::new(),
      limit,
    }
  }

  /// Current break, i.e. the number of bytes handed out so far.
  pub fn len(&self) -> usize {
    self.bytes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bytes.is_empty()
  }

  pub fn limit(&self) -> usize {
    self.limit
  }
}

impl Default for Arena {
  fn default() -> Self {
    Self::new()
  }
}

impl Backing for Arena {
  fn extend(
    &mut self,
    increment: usize,
  ) -> Result<usize, HeapError> {
    let previous = self.bytes.len();
    let new_len = previous
      .checked_add(increment)
      .filter(|len| *len <= self.limit)
      .ok_or(HeapError::OutOfMemory { requested: increment })?;

    self.bytes.resize(new_len, 0);
    Ok(previous)
  }

  fn contains(
    &self,
    addr: usize,
    len: usize,
  ) -> bool {
    addr
      .checked_add(len)
      .is_some_and(|end| end <= self.bytes.len())
  }

  fn read_word(
    &self,
    addr: usize,
  ) -> usize {
    let mut word = [0u8; WORD];
    word.copy_from_slice(&self.bytes[addr..addr + WORD]);
    usize::from_ne_bytes(word)
  }

  fn write_word(
    &mut self,
    addr: usize,
    value: usize,
  ) {
    self.bytes[addr..addr + WORD].copy_from_slice(&value.to_ne_bytes());
  }

  fn bytes(
    &self,
    addr: usize,
    len: usize,
  ) -> &[u8] {
    &self.bytes[addr..addr + len]
  }

  fn bytes_mut(
    &mut self,
    addr: usize,
    len: usize,
  ) -> &mut [u8] {
    &mut self.bytes[addr..addr + len]
  }

  fn copy_within(
    &mut self,
    src: usize,
    dst: usize,
    len: usize,
  ) {
    self.bytes.copy_within(src..src + len, dst);
  }
}
