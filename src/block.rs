use std::{mem, num::NonZeroUsize};

use crate::{align, backing::Backing};

/// Size of the in-band header preceding every payload, rounded to the
/// heap alignment so payloads stay 16 byte aligned.
pub const HEADER_SIZE: usize = align!(3 * mem::size_of::<usize>());

/// Written into the header of every block handed out to a caller.
pub const ALLOCATED_TAG: usize = 0x0123_4567;

/// Written into the header of a block when it becomes free.
pub const FREE_TAG: usize = 0;

const WORD: usize = mem::size_of::<usize>();
const SIZE_OFFSET: usize = 0;
const LINK_OFFSET: usize = WORD;
const TAG_OFFSET: usize = 2 * WORD;

/// Encoded `link` value meaning "end of the free list".
const NIL: usize = usize::MAX;

/// Handle to a block header living at `addr` inside a [`Backing`].
///
/// ```text
///   ┌─────────────────────────────┬──────────────────────────────┐
///   │ size │ link │ tag │ padding │        payload (size)        │
///   └─────────────────────────────┴──────────────────────────────┘
///   ▲ addr                        ▲ addr + HEADER_SIZE
/// ```
///
/// The handle is a plain address; every field access goes through the
/// backing that owns the memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Block(usize);

impl Block {
  pub const fn at(addr: usize) -> Self {
    Self(addr)
  }

  pub const fn addr(self) -> usize {
    self.0
  }

  pub const fn payload_addr(self) -> usize {
    self.0 + HEADER_SIZE
  }

  /// Payload capacity in bytes, excluding the header.
  pub fn size<B: Backing + ?Sized>(
    self,
    mem: &B,
  ) -> usize {
    mem.read_word(self.0 + SIZE_OFFSET)
  }

  pub fn set_size<B: Backing + ?Sized>(
    self,
    mem: &mut B,
    size: usize,
  ) {
    mem.write_word(self.0 + SIZE_OFFSET, size);
  }

  /// Next block in the free list. Meaningless while the block is allocated.
  pub fn link<B: Backing + ?Sized>(
    self,
    mem: &B,
  ) -> Option<Block> {
    match mem.read_word(self.0 + LINK_OFFSET) {
      NIL => None,
      addr => Some(Block(addr)),
    }
  }

  pub fn set_link<B: Backing + ?Sized>(
    self,
    mem: &mut B,
    link: Option<Block>,
  ) {
    mem.write_word(self.0 + LINK_OFFSET, link.map_or(NIL, Block::addr));
  }

  pub fn tag<B: Backing + ?Sized>(
    self,
    mem: &B,
  ) -> usize {
    mem.read_word(self.0 + TAG_OFFSET)
  }

  pub fn set_tag<B: Backing + ?Sized>(
    self,
    mem: &mut B,
    tag: usize,
  ) {
    mem.write_word(self.0 + TAG_OFFSET, tag);
  }

  /// First address past the block's span `[addr, addr + HEADER_SIZE + size)`.
  pub fn end<B: Backing + ?Sized>(
    self,
    mem: &B,
  ) -> usize {
    self.payload_addr() + self.size(mem)
  }

  /// Writes a complete header for a block that is not (yet) allocated.
  pub fn init<B: Backing + ?Sized>(
    self,
    mem: &mut B,
    size: usize,
    link: Option<Block>,
  ) {
    self.set_size(mem, size);
    self.set_link(mem, link);
    self.set_tag(mem, FREE_TAG);
  }
}

/// Address of a payload handed out by a heap. Never null: "no pointer"
/// is spelled `Option::<Ptr>::None`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ptr(NonZeroUsize);

impl Ptr {
  pub const fn new(addr: usize) -> Option<Self> {
    match NonZeroUsize::new(addr) {
      Some(addr) => Some(Self(addr)),
      None => None,
    }
  }

  pub fn from_raw(ptr: *mut u8) -> Option<Self> {
    Self::new(ptr as usize)
  }

  pub const fn addr(self) -> usize {
    self.0.get()
  }

  /// Only meaningful for heaps whose backing hands out real addresses.
  pub fn as_mut_ptr(self) -> *mut u8 {
    self.0.get() as *mut u8
  }

  pub(crate) const fn header(self) -> Option<Block> {
    match self.addr().checked_sub(HEADER_SIZE) {
      Some(addr) => Some(Block(addr)),
      None => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backing::Arena;

  #[test]
  fn test_header_layout() {
    assert_eq!(HEADER_SIZE % crate::align::ALIGNMENT, 0);
    assert!(HEADER_SIZE >= 3 * WORD);
  }

  #[test]
  fn test_header_fields() {
    let mut arena = Arena::new();
    let addr = arena.extend(HEADER_SIZE + 64).unwrap();

    let block = Block::at(addr);
    block.init(&mut arena, 64, None);

    assert_eq!(block.size(&arena), 64);
    assert_eq!(block.link(&arena), None);
    assert_eq!(block.tag(&arena), FREE_TAG);
    assert_eq!(block.end(&arena), addr + HEADER_SIZE + 64);

    block.set_link(&mut arena, Some(Block::at(4096)));
    block.set_tag(&mut arena, ALLOCATED_TAG);

    assert_eq!(block.link(&arena), Some(Block::at(4096)));
    assert_eq!(block.tag(&arena), ALLOCATED_TAG);
    assert_eq!(block.size(&arena), 64);
  }

  #[test]
  fn test_ptr_header_roundtrip() {
    let block = Block::at(64);
    let ptr = Ptr::new(block.payload_addr()).unwrap();

    assert_eq!(ptr.header(), Some(block));
    assert_eq!(Ptr::new(0), None);
    assert_eq!(Ptr::new(8).unwrap().header(), None);
  }
}
