/*
 * program_break.rs
 *
 * the heap on the real process break. one test so nothing in this binary
 * races our sbrk calls.
 */

use brkalloc::{HEADER_SIZE, Heap, ProgramBreak, current_break};

#[test]
fn heap_on_program_break() {
  let mut heap = Heap::new(ProgramBreak::new());
  let before = current_break();

  // growth moves the break and hands out aligned payloads
  let a = heap.allocate(100).unwrap();
  let b = heap.allocate(100).unwrap();
  assert_eq!(a.addr() % 16, 0);
  assert_eq!(b.addr() % 16, 0);
  assert!(current_break() >= before + 2 * (HEADER_SIZE + 112));
  assert!(heap.backing().start() <= a.addr() - HEADER_SIZE);
  assert!(heap.backing().end() >= b.addr() + 112);

  // payloads are real memory
  unsafe {
    a.as_mut_ptr().write_bytes(0x11, 100);
    b.as_mut_ptr().write_bytes(0x22, 100);
  }
  assert!(heap.bytes(a).unwrap()[..100].iter().all(|byte| *byte == 0x11));

  // growing keeps the prefix
  let grown = heap.reallocate(Some(a), 1000).unwrap();
  assert!(heap.bytes(grown).unwrap()[..100].iter().all(|byte| *byte == 0x11));

  // contiguous growth merges back on release
  heap.release(Some(b));
  heap.release(Some(grown));
  let stats = heap.stats();
  assert_eq!(stats.free_blocks, 1);
  assert_eq!(stats.free_bytes, stats.heap_bytes - HEADER_SIZE);

  // reuse without moving the break
  let break_after = current_break();
  let c = heap.zero_allocate(3, 8).unwrap();
  assert_eq!(c, a);
  assert_eq!(&heap.bytes(c).unwrap()[..24], &[0u8; 24]);
  assert_eq!(current_break(), break_after);

  heap.release(Some(c));
}
