use std::{
  alloc::{GlobalAlloc, Layout, System},
  ptr,
};

use spin::{Mutex, MutexGuard};

use crate::{align::ALIGNMENT, backing::Backing, block::Ptr, heap::Heap, sbrk::ProgramBreak};

/// A [`Heap`] behind one mutex, held for the whole of every operation.
///
/// The lock spins rather than parks: parking can allocate, and this lock
/// sits inside the allocator. The abort on corruption happens with the lock
/// held; nothing runs after it.
pub struct LockedHeap<B: Backing> {
  heap: Mutex<Heap<B>>,
}

/// The drop-in allocator: a locked heap over the process break.
///
/// ```rust,ignore
/// use brkalloc::SbrkAllocator;
///
/// #[global_allocator]
/// static GLOBAL: SbrkAllocator = SbrkAllocator::sbrk();
/// ```
pub type SbrkAllocator = LockedHeap<ProgramBreak>;

impl<B: Backing> LockedHeap<B> {
  pub const fn new(heap: Heap<B>) -> Self {
    Self {
      heap: Mutex::new(heap),
    }
  }

  /// Exclusive access for a sequence of operations.
  pub fn lock(&self) -> MutexGuard<'_, Heap<B>> {
    self.heap.lock()
  }

  pub fn allocate(
    &self,
    size: usize,
  ) -> Option<Ptr> {
    self.lock().allocate(size)
  }

  pub fn zero_allocate(
    &self,
    count: usize,
    size: usize,
  ) -> Option<Ptr> {
    self.lock().zero_allocate(count, size)
  }

  pub fn reallocate(
    &self,
    ptr: Option<Ptr>,
    new_size: usize,
  ) -> Option<Ptr> {
    self.lock().reallocate(ptr, new_size)
  }

  pub fn release(
    &self,
    ptr: Option<Ptr>,
  ) {
    self.lock().release(ptr)
  }
}

impl LockedHeap<ProgramBreak> {
  pub const fn sbrk() -> Self {
    Self::new(Heap::new(ProgramBreak::new()))
  }
}

fn into_raw(ptr: Option<Ptr>) -> *mut u8 {
  ptr.map_or(ptr::null_mut(), Ptr::as_mut_ptr)
}

/// The heap only guarantees 16 byte alignment; anything stricter goes to
/// the platform allocator. The layout passed back on dealloc/realloc routes
/// the pointer to whichever side produced it.
fn over_aligned(layout: &Layout) -> bool {
  layout.align() > ALIGNMENT
}

// SAFETY: every heap operation runs under the mutex and hands out 16 byte
// aligned, non-overlapping payloads. Stricter layouts are served by `System`
// and only ever returned to `System`.
unsafe impl GlobalAlloc for LockedHeap<ProgramBreak> {
  unsafe fn alloc(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    if over_aligned(&layout) {
      return unsafe { System.alloc(layout) };
    }

    into_raw(self.allocate(layout.size()))
  }

  unsafe fn dealloc(
    &self,
    ptr: *mut u8,
    layout: Layout,
  ) {
    if over_aligned(&layout) {
      return unsafe { System.dealloc(ptr, layout) };
    }

    self.release(Ptr::from_raw(ptr));
  }

  unsafe fn realloc(
    &self,
    ptr: *mut u8,
    layout: Layout,
    new_size: usize,
  ) -> *mut u8 {
    if over_aligned(&layout) {
      return unsafe { System.realloc(ptr, layout, new_size) };
    }

    into_raw(self.reallocate(Ptr::from_raw(ptr), new_size))
  }

  unsafe fn alloc_zeroed(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    if over_aligned(&layout) {
      return unsafe { System.alloc_zeroed(layout) };
    }

    into_raw(self.zero_allocate(1, layout.size()))
  }
}
