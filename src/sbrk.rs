use std::{ptr, slice};

use libc::{c_void, intptr_t, sbrk};
use spin::Mutex;

use crate::{align, backing::Backing, error::HeapError};

/// Serialises every `sbrk` issued by this crate. Other users of the break
/// (the platform allocator, for one) are not covered and may interleave
/// their own growth between ours.
static BREAK_LOCK: Mutex<()> = Mutex::new(());

/// Returns the current program break.
pub fn current_break() -> usize {
  let _guard = BREAK_LOCK.lock();
  unsafe { sbrk(0) as usize }
}

/// [`Backing`] over the process break, grown with `sbrk(2)`.
///
/// ```text
///   ┌──────────┬─────┬───────────────┬─────────────────┬─────────┐
///   │ foreign  │ pad │ block         │ block           │ (break) │
///   └──────────┴─────┴───────────────┴─────────────────┴─────────┘
///                    ▲ start                           ▲ end
/// ```
///
/// Every extension starts on a 16 byte boundary. The break is never
/// lowered; memory is returned to the OS when the process exits.
#[derive(Debug)]
pub struct ProgramBreak {
  start: usize,
  end: usize,
}

impl ProgramBreak {
  pub const fn new() -> Self {
    Self { start: 0, end: 0 }
  }

  /// Lowest address handed out so far, or zero before the first extension.
  pub fn start(&self) -> usize {
    self.start
  }

  /// End of the most recent extension.
  pub fn end(&self) -> usize {
    self.end
  }
}

impl Default for ProgramBreak {
  fn default() -> Self {
    Self::new()
  }
}

/// Grows the break by `total` bytes and returns the old break.
/// Caller holds `BREAK_LOCK`.
fn move_break(total: usize) -> Option<usize> {
  if total > intptr_t::MAX as usize {
    return None;
  }

  let previous = unsafe { sbrk(total as intptr_t) };

  if previous == usize::MAX as *mut c_void {
    return None;
  }

  Some(previous as usize)
}

/// First 16 byte aligned address in `[previous, previous + total)` that
/// still leaves room for `increment` bytes.
fn place(
  previous: usize,
  total: usize,
  increment: usize,
) -> Option<usize> {
  let addr = align::checked_align(previous)?;
  let end = previous.checked_add(total)?;

  (addr.checked_add(increment)? <= end).then_some(addr)
}

impl Backing for ProgramBreak {
  fn extend(
    &mut self,
    increment: usize,
  ) -> Result<usize, HeapError> {
    let out_of_memory = HeapError::OutOfMemory { requested: increment };
    let _guard = BREAK_LOCK.lock();

    let current = unsafe { sbrk(0) } as usize;
    let aligned = align::checked_align(current).ok_or(out_of_memory)?;
    let total = (aligned - current)
      .checked_add(increment)
      .ok_or(out_of_memory)?;

    let previous = move_break(total).ok_or(out_of_memory)?;

    // someone else moved the break after `sbrk(0)`; take a fresh range with
    // enough slack to align anywhere and leave the first one behind
    let addr = match place(previous, total, increment) {
      Some(addr) => addr,
      None => {
        let slack = increment
          .checked_add(align::ALIGNMENT - 1)
          .ok_or(out_of_memory)?;
        let previous = move_break(slack).ok_or(out_of_memory)?;
        place(previous, slack, increment).ok_or(out_of_memory)?
      }
    };

    if self.start == 0 {
      self.start = addr;
    }
    self.end = addr + increment;

    Ok(addr)
  }

  fn contains(
    &self,
    addr: usize,
    len: usize,
  ) -> bool {
    self.start != 0
      && addr >= self.start
      && addr
        .checked_add(len)
        .is_some_and(|end| end <= self.end)
  }

  fn read_word(
    &self,
    addr: usize,
  ) -> usize {
    // SAFETY: the heap only reads header words of blocks it carved out of
    // `[start, end)`, which is mapped and 16 byte aligned.
    unsafe { (addr as *const usize).read() }
  }

  fn write_word(
    &mut self,
    addr: usize,
    value: usize,
  ) {
    // SAFETY: see `read_word`.
    unsafe { (addr as *mut usize).write(value) }
  }

  fn bytes(
    &self,
    addr: usize,
    len: usize,
  ) -> &[u8] {
    // SAFETY: callers pass payload ranges that lie inside a live block.
    unsafe { slice::from_raw_parts(addr as *const u8, len) }
  }

  fn bytes_mut(
    &mut self,
    addr: usize,
    len: usize,
  ) -> &mut [u8] {
    // SAFETY: see `bytes`; `&mut self` keeps the view exclusive.
    unsafe { slice::from_raw_parts_mut(addr as *mut u8, len) }
  }

  fn copy_within(
    &mut self,
    src: usize,
    dst: usize,
    len: usize,
  ) {
    // SAFETY: both ranges are payloads inside `[start, end)`.
    unsafe { ptr::copy(src as *const u8, dst as *mut u8, len) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_extend_moves_break_and_aligns() {
    let mut program_break = ProgramBreak::new();

    let first = program_break.extend(64).unwrap();
    assert_eq!(first % align::ALIGNMENT, 0);
    assert!(current_break() >= first + 64);
    assert!(program_break.contains(first, 64));
    assert!(!program_break.contains(first, 65));
    assert_eq!(program_break.start(), first);

    program_break.write_word(first, 42);
    assert_eq!(program_break.read_word(first), 42);
  }

  #[test]
  fn test_place_aligns_within_the_obtained_range() {
    assert_eq!(place(0x1000, 64, 64), Some(0x1000));
    assert_eq!(place(0x1008, 72, 64), Some(0x1010));
    // the break moved by 8 between sizing and growing: no room to align
    assert_eq!(place(0x1008, 64, 64), None);
    assert_eq!(place(0x1008, 64 + align::ALIGNMENT - 1, 64), Some(0x1010));
    assert_eq!(place(usize::MAX - 7, 8, 8), None);
  }

  #[test]
  fn test_refused_growth_is_out_of_memory() {
    let mut program_break = ProgramBreak::new();

    assert_eq!(
      program_break.extend(usize::MAX),
      Err(HeapError::OutOfMemory { requested: usize::MAX })
    );
    assert!(!program_break.contains(0, 1));
  }
}
