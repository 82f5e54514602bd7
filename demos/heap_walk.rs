use std::io::Read;

use brkalloc::{FitPolicy, Heap, HeapConfig, ProgramBreak, Ptr, current_break};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`,
/// `gdb`, or just visually track how allocations move the program break.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break.
fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break = {:#x}",
    label,
    std::process::id(),
    current_break(),
  );
}

fn print_alloc(
  heap: &Heap<ProgramBreak>,
  requested: usize,
  ptr: Ptr,
) {
  println!(
    "Allocated {} bytes (usable {}), address = {:#x}, program break = {:#x}",
    requested,
    heap.usable_size(ptr).unwrap_or(0),
    ptr.addr(),
    current_break(),
  );
}

fn print_free_list(heap: &Heap<ProgramBreak>) {
  let stats = heap.stats();
  println!(
    "free list: {} blocks, {} free bytes, {} heap bytes",
    stats.free_blocks, stats.free_bytes, stats.heap_bytes
  );
  for block in heap.free_blocks() {
    println!("  {:#x}: {} bytes", block.addr, block.size);
  }
}

fn main() {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("brkalloc=trace")).init();

  let config = HeapConfig::new()
    .with_fit(FitPolicy::FirstFit)
    .with_debug_output(true);
  let mut heap = Heap::with_config(ProgramBreak::new(), config);

  print_program_break("start");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) Two 100 byte allocations, carved from fresh break growth.
  // --------------------------------------------------------------------
  let Some(first) = heap.allocate(100) else {
    eprintln!("out of memory");
    return;
  };
  println!("\n[1] Allocate 100 bytes");
  print_alloc(&heap, 100, first);

  let Some(second) = heap.allocate(100) else {
    eprintln!("out of memory");
    return;
  };
  print_alloc(&heap, 100, second);

  if let Ok(bytes) = heap.bytes_mut(first) {
    bytes.fill(0xAB);
  }

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Grow the first allocation; its bytes move to a new block.
  // --------------------------------------------------------------------
  let Some(grown) = heap.reallocate(Some(first), 300) else {
    eprintln!("out of memory");
    return;
  };
  println!("\n[2] Reallocate first block to 300 bytes");
  print_alloc(&heap, 300, grown);
  if let Ok(bytes) = heap.bytes(grown) {
    println!("[2] First byte after move = {:#X}", bytes[0]);
  }
  print_free_list(&heap);

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) Release everything. Neighbours merge back into one block.
  // --------------------------------------------------------------------
  heap.release(Some(second));
  heap.release(Some(grown));
  println!("\n[3] Released all blocks");
  print_free_list(&heap);

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) A small request now reuses (and splits) the merged block.
  // --------------------------------------------------------------------
  let Some(small) = heap.zero_allocate(3, 8) else {
    eprintln!("out of memory");
    return;
  };
  println!("\n[4] Zero-allocate 3 x 8 bytes");
  print_alloc(&heap, 24, small);
  print_free_list(&heap);

  print_program_break("end");
  println!("\n[5] End of example. Process will exit and the OS will reclaim all memory.");
}
