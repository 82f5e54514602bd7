/*
 * corruption.rs
 *
 * the total API aborts on a corrupt release. runs the offending sequence in
 * a child copy of this test binary and checks how the child died.
 */

use std::{env, os::unix::process::ExitStatusExt, process::Command};

use brkalloc::Heap;

const CHILD_ENV: &str = "BRKALLOC_CORRUPTION_CHILD";

fn run_child(test: &str) -> std::process::Output {
  Command::new(env::current_exe().expect("test binary path"))
    .args([test, "--exact", "--nocapture", "--test-threads=1"])
    .env(CHILD_ENV, test)
    .output()
    .expect("failed to spawn child test")
}

fn in_child(test: &str) -> bool {
  env::var(CHILD_ENV).is_ok_and(|value| value == test)
}

#[test]
fn double_release_aborts_process() {
  if in_child("double_release_aborts_process") {
    let mut heap = Heap::in_arena();
    let p = heap.allocate(64);
    heap.release(p);
    heap.release(p);
    unreachable!("second release returned");
  }

  let output = run_child("double_release_aborts_process");

  assert_eq!(output.status.signal(), Some(libc::SIGABRT));
  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.contains("heap corruption detected"), "stderr: {stderr}");
}

#[test]
fn reallocate_after_release_aborts_process() {
  if in_child("reallocate_after_release_aborts_process") {
    let mut heap = Heap::in_arena();
    let p = heap.allocate(16);
    let _guard = heap.allocate(16);
    heap.release(p);
    heap.reallocate(p, 4096);
    unreachable!("reallocate returned");
  }

  let output = run_child("reallocate_after_release_aborts_process");

  assert_eq!(output.status.signal(), Some(libc::SIGABRT));
}

#[test]
fn shrinking_a_released_pointer_aborts_process() {
  if in_child("shrinking_a_released_pointer_aborts_process") {
    let mut heap = Heap::in_arena();
    let p = heap.allocate(64);
    let _guard = heap.allocate(16);
    heap.release(p);
    heap.reallocate(p, 8);
    unreachable!("reallocate returned");
  }

  let output = run_child("shrinking_a_released_pointer_aborts_process");

  assert_eq!(output.status.signal(), Some(libc::SIGABRT));
  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.contains("heap corruption detected"), "stderr: {stderr}");
}

#[test]
fn null_and_valid_releases_exit_cleanly() {
  let mut heap = Heap::in_arena();
  let p = heap.allocate(64);

  heap.release(None);
  heap.release(p);

  assert_eq!(heap.stats().free_blocks, 1);
}
