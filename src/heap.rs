use std::{cmp, process};

use log::{debug, error, trace, warn};

use crate::{
  align::{self, ALIGNMENT},
  backing::{Arena, Backing},
  block::{ALLOCATED_TAG, Block, FREE_TAG, HEADER_SIZE, Ptr},
  config::{FitPolicy, HeapConfig},
  error::HeapError,
  free_list::{FreeBlock, FreeList},
};

/// Smallest payload worth carving off a free block as its own block.
pub const MIN_REMAINDER: usize = ALIGNMENT;

macro_rules! heap_log {
  ($heap:expr, $level:ident, $($arg:tt)+) => {
    if $heap.config.debug_output {
      $level!(target: "brkalloc::heap", $($arg)+);
    }
  };
}

/// Snapshot of a heap's bookkeeping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
  /// Bytes obtained from the backing, headers included.
  pub heap_bytes: usize,
  pub free_blocks: usize,
  /// Payload bytes sitting in the free list.
  pub free_bytes: usize,
}

/// A free-list allocator over a single growable [`Backing`].
///
/// ```text
///   free list:  head ──► C ──► A ──► ∅        (newest first)
///
///   memory:     ┌────┬──────┬────┬─────┬────┬──────┐
///               │ A  │  x   │ B' │  y  │ C  │  z   │ ◄─ break
///               └────┴──────┴────┴─────┴────┴──────┘
///                free  used  used  used  free  used
/// ```
///
/// Allocation scans the free list (first-fit unless configured otherwise),
/// splits off any useful remainder, and falls back to growing the backing.
/// Release pushes the block onto the head of the list and merges it with
/// every free block that touches it in memory.
///
/// The heap is single threaded; wrap it in a
/// [`LockedHeap`](crate::LockedHeap) to share it.
pub struct Heap<B: Backing> {
  backing: B,
  free: FreeList,
  config: HeapConfig,
  /// Where the next next-fit search starts. Only trusted while the block
  /// is still in the free list.
  cursor: Option<Block>,
  heap_bytes: usize,
}

impl Heap<Arena> {
  /// A heap over a fresh [`Arena`] with default settings.
  pub fn in_arena() -> Self {
    Self::new(Arena::new())
  }
}

impl<B: Backing> Heap<B> {
  pub const fn new(backing: B) -> Self {
    Self::with_config(backing, HeapConfig::new())
  }

  pub const fn with_config(
    backing: B,
    config: HeapConfig,
  ) -> Self {
    Self {
      backing,
      free: FreeList::new(),
      config,
      cursor: None,
      heap_bytes: 0,
    }
  }

  pub fn config(&self) -> &HeapConfig {
    &self.config
  }

  pub fn backing(&self) -> &B {
    &self.backing
  }

  /// Raw access to the heap's memory, headers included. Writes through this
  /// bypass every check the heap makes.
  pub fn backing_mut(&mut self) -> &mut B {
    &mut self.backing
  }

  /// Allocates at least `size` bytes. Zero-size requests yield `None`;
  /// exhaustion yields `None` as well.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Option<Ptr> {
    let result = self.try_allocate(size);
    self.settle(result)
  }

  /// Allocates `count * size` zeroed bytes. Overflow yields `None`.
  pub fn zero_allocate(
    &mut self,
    count: usize,
    size: usize,
  ) -> Option<Ptr> {
    let result = self.try_zero_allocate(count, size);
    self.settle(result)
  }

  /// Resizes an allocation, moving it if it has to grow.
  ///
  /// Aborts the process if `ptr` turns out not to be a live allocation.
  pub fn reallocate(
    &mut self,
    ptr: Option<Ptr>,
    new_size: usize,
  ) -> Option<Ptr> {
    let result = self.try_reallocate(ptr, new_size);
    self.settle(result)
  }

  /// Returns an allocation to the heap.
  ///
  /// Aborts the process if the header does not carry the allocated tag.
  pub fn release(
    &mut self,
    ptr: Option<Ptr>,
  ) {
    if self.try_release(ptr).is_err() {
      abort_on_corruption();
    }
  }

  pub fn try_allocate(
    &mut self,
    size: usize,
  ) -> Result<Option<Ptr>, HeapError> {
    if size == 0 {
      return Ok(None);
    }

    let size = align::checked_align(size).ok_or(HeapError::OutOfMemory { requested: size })?;

    let block = match self.find_fit(size) {
      Some(block) => {
        self.claim(block, size);
        block
      }
      None => self.grow(size)?,
    };

    block.set_tag(&mut self.backing, ALLOCATED_TAG);

    Ok(Ptr::new(block.payload_addr()))
  }

  pub fn try_zero_allocate(
    &mut self,
    count: usize,
    size: usize,
  ) -> Result<Option<Ptr>, HeapError> {
    let total = count
      .checked_mul(size)
      .ok_or(HeapError::InvalidArgument { count, size })?;

    let ptr = self.try_allocate(total)?;

    if let Some(ptr) = ptr {
      self.backing.bytes_mut(ptr.addr(), total).fill(0);
    }

    Ok(ptr)
  }

  /// `None` behaves as allocate, a zero size as release. A block that is
  /// already large enough is returned as is, without shrinking it. If the
  /// move fails the original allocation is left untouched. A pointer that is
  /// not a live allocation is rejected before anything changes.
  pub fn try_reallocate(
    &mut self,
    ptr: Option<Ptr>,
    new_size: usize,
  ) -> Result<Option<Ptr>, HeapError> {
    let Some(ptr) = ptr else {
      return self.try_allocate(new_size);
    };

    if new_size == 0 {
      self.try_release(Some(ptr))?;
      return Ok(None);
    }

    let old_size = self.allocated_block(ptr)?.size(&self.backing);
    if old_size >= new_size {
      return Ok(Some(ptr));
    }

    let Some(moved) = self.try_allocate(new_size)? else {
      return Ok(None);
    };

    self
      .backing
      .copy_within(ptr.addr(), moved.addr(), cmp::min(old_size, new_size));
    self.try_release(Some(ptr))?;

    Ok(Some(moved))
  }

  /// Checks the tag before touching the free list, so a rejected release
  /// leaves the heap exactly as it was.
  pub fn try_release(
    &mut self,
    ptr: Option<Ptr>,
  ) -> Result<(), HeapError> {
    let Some(ptr) = ptr else {
      return Ok(());
    };

    let block = match self.allocated_block(ptr) {
      Ok(block) => block,
      Err(err) => {
        heap_log!(self, error, "release of {:#x} rejected: {}", ptr.addr(), err);
        return Err(err);
      }
    };

    block.set_tag(&mut self.backing, FREE_TAG);
    self.free.insert(&mut self.backing, block);
    self.coalesce(block);

    Ok(())
  }

  /// Payload capacity of a live allocation, which may exceed what was asked.
  pub fn usable_size(
    &self,
    ptr: Ptr,
  ) -> Result<usize, HeapError> {
    Ok(self.allocated_block(ptr)?.size(&self.backing))
  }

  pub fn bytes(
    &self,
    ptr: Ptr,
  ) -> Result<&[u8], HeapError> {
    let size = self.usable_size(ptr)?;
    Ok(self.backing.bytes(ptr.addr(), size))
  }

  pub fn bytes_mut(
    &mut self,
    ptr: Ptr,
  ) -> Result<&mut [u8], HeapError> {
    let size = self.usable_size(ptr)?;
    Ok(self.backing.bytes_mut(ptr.addr(), size))
  }

  /// Free blocks in list order.
  pub fn free_blocks(&self) -> impl Iterator<Item = FreeBlock> + '_ {
    self.free.iter(&self.backing).map(|block| FreeBlock {
      addr: block.addr(),
      size: block.size(&self.backing),
    })
  }

  pub fn stats(&self) -> HeapStats {
    self.free_blocks().fold(
      HeapStats {
        heap_bytes: self.heap_bytes,
        ..HeapStats::default()
      },
      |stats, block| HeapStats {
        free_blocks: stats.free_blocks + 1,
        free_bytes: stats.free_bytes + block.size,
        ..stats
      },
    )
  }

  fn settle(
    &self,
    result: Result<Option<Ptr>, HeapError>,
  ) -> Option<Ptr> {
    match result {
      Ok(ptr) => ptr,
      Err(err) if err.is_fatal() => abort_on_corruption(),
      Err(err) => {
        heap_log!(self, debug, "returning null: {}", err);
        None
      }
    }
  }

  fn find_fit(
    &self,
    size: usize,
  ) -> Option<Block> {
    let fits = |block: &Block| block.size(&self.backing) >= size;

    let start = match self.config.fit {
      FitPolicy::FirstFit => None,
      FitPolicy::NextFit => self
        .cursor
        .filter(|cursor| self.free.contains(&self.backing, *cursor)),
    };

    match start {
      None => self.free.iter(&self.backing).find(fits),
      Some(start) => self
        .free
        .iter_from(&self.backing, start)
        .find(fits)
        .or_else(|| {
          self
            .free
            .iter(&self.backing)
            .take_while(|block| *block != start)
            .find(fits)
        }),
    }
  }

  /// Takes a listed block out of the free list for an allocation of `size`.
  fn claim(
    &mut self,
    block: Block,
    size: usize,
  ) {
    let following = block.link(&self.backing);

    match self.split(block, size) {
      Some(rest) => {
        self.free.replace(&mut self.backing, block, rest);
        self.cursor = Some(rest);
      }
      None => {
        self.free.remove(&mut self.backing, block);
        self.cursor = following;
      }
    }
  }

  /// Shrinks `block` to `size` and returns the free remainder, unless the
  /// remainder could not hold a header plus [`MIN_REMAINDER`] bytes. The
  /// remainder inherits `block`'s link; the caller lists it.
  fn split(
    &mut self,
    block: Block,
    size: usize,
  ) -> Option<Block> {
    let available = block.size(&self.backing);

    if available < size.saturating_add(HEADER_SIZE + MIN_REMAINDER) {
      return None;
    }

    let rest = Block::at(block.payload_addr() + size);
    let link = block.link(&self.backing);
    rest.init(&mut self.backing, available - size - HEADER_SIZE, link);
    block.set_size(&mut self.backing, size);

    heap_log!(
      self,
      trace,
      "split {:#x}: {} bytes kept, remainder {:#x} of {} bytes",
      block.addr(),
      size,
      rest.addr(),
      available - size - HEADER_SIZE
    );

    Some(rest)
  }

  /// Merges a listed `block` with its free neighbours in memory until no
  /// neighbour is left, and returns the surviving block.
  fn coalesce(
    &mut self,
    mut block: Block,
  ) -> Block {
    loop {
      let mut merged = false;

      if let Some(previous) = self.free.find_previous_contiguous(&self.backing, block) {
        self.free.remove(&mut self.backing, block);
        let size = previous.size(&self.backing) + HEADER_SIZE + block.size(&self.backing);
        previous.set_size(&mut self.backing, size);

        heap_log!(self, trace, "merged {:#x} into {:#x}", block.addr(), previous.addr());

        block = previous;
        merged = true;
      }

      if let Some(next) = self.free.find_next_contiguous(&self.backing, block) {
        self.free.remove(&mut self.backing, next);
        let size = block.size(&self.backing) + HEADER_SIZE + next.size(&self.backing);
        block.set_size(&mut self.backing, size);

        heap_log!(self, trace, "merged {:#x} into {:#x}", next.addr(), block.addr());

        merged = true;
      }

      if !merged {
        return block;
      }
    }
  }

  /// Extends the backing by one block of `size` payload bytes.
  fn grow(
    &mut self,
    size: usize,
  ) -> Result<Block, HeapError> {
    let total = size
      .checked_add(HEADER_SIZE)
      .ok_or(HeapError::OutOfMemory { requested: size })?;

    let addr = match self.backing.extend(total) {
      Ok(addr) => addr,
      Err(err) => {
        heap_log!(self, warn, "growth by {} bytes refused", total);
        return Err(err);
      }
    };

    let block = Block::at(addr);
    block.init(&mut self.backing, size, None);
    self.heap_bytes += total;

    heap_log!(self, debug, "grew heap by {} bytes at {:#x}", total, addr);

    Ok(block)
  }

  /// Header of `ptr`, provided the whole block lies in the backing.
  fn block_of(
    &self,
    ptr: Ptr,
  ) -> Result<Block, HeapError> {
    let corrupt = HeapError::CorruptionDetected { addr: ptr.addr() };

    let block = ptr
      .header()
      .filter(|_| ptr.addr() % ALIGNMENT == 0)
      .filter(|block| self.backing.contains(block.addr(), HEADER_SIZE))
      .ok_or(corrupt)?;

    if !self
      .backing
      .contains(block.payload_addr(), block.size(&self.backing))
    {
      return Err(corrupt);
    }

    Ok(block)
  }

  fn allocated_block(
    &self,
    ptr: Ptr,
  ) -> Result<Block, HeapError> {
    let block = self.block_of(ptr)?;

    if block.tag(&self.backing) != ALLOCATED_TAG {
      return Err(HeapError::CorruptionDetected { addr: ptr.addr() });
    }

    Ok(block)
  }
}

/// The heap cannot trust its own bookkeeping any more. Report without
/// allocating and stop.
fn abort_on_corruption() -> ! {
  const MESSAGE: &[u8] = b"brkalloc: heap corruption detected, aborting\n";

  // SAFETY: MESSAGE is a valid byte slice, stderr is always open
  unsafe {
    libc::write(libc::STDERR_FILENO, MESSAGE.as_ptr().cast(), MESSAGE.len());
  }

  process::abort()
}
