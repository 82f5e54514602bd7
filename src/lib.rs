//! # brkalloc - A Free-List Memory Allocator
//!
//! This crate provides a user-space dynamic memory allocator: allocate,
//! zero-allocate, reallocate and release, backed by one heap that grows on
//! demand. The heap can live in a plain byte buffer ([`Arena`]) or on the
//! real process break via `sbrk` ([`ProgramBreak`]).
//!
//! ## Overview
//!
//! Every block carries an in-band header. Released blocks are threaded onto
//! a singly linked free list through that header and reused by later
//! allocations:
//!
//! ```text
//!   Free List Allocator Concept:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                         HEAP MEMORY                                  │
//!   │                                                                      │
//!   │   ┌─────┬─────┬─────┬─────┬─────┬─────┐                              │
//!   │   │ A1  │ F1  │ A2  │ F2  │ A3  │ A4  │                              │
//!   │   └─────┴──▲──┴─────┴──▲──┴─────┴─────┘                         ▲    │
//!   │            │           │                                        │    │
//!   │            └─── head ──┘ (link)                            Program   │
//!   │                                                              Break   │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   A request first searches the free list (first-fit by default),
//!   splitting an oversized block. Only a miss moves the break.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   brkalloc
//!   ├── align      - 16 byte rounding (align!, checked_align)
//!   ├── backing    - Backing trait, Arena
//!   ├── block      - Block header accessors, Ptr
//!   ├── config     - HeapConfig, FitPolicy
//!   ├── error      - HeapError
//!   ├── free_list  - FreeList
//!   ├── global     - LockedHeap, GlobalAlloc over sbrk
//!   ├── heap       - Heap: allocate / zero_allocate / reallocate / release
//!   └── sbrk       - ProgramBreak
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use brkalloc::Heap;
//!
//! let mut heap = Heap::in_arena();
//!
//! let ptr = heap.allocate(64).unwrap();
//! heap.bytes_mut(ptr).unwrap()[..5].copy_from_slice(b"hello");
//!
//! let ptr = heap.reallocate(Some(ptr), 256).unwrap();
//! assert_eq!(&heap.bytes(ptr).unwrap()[..5], b"hello");
//!
//! heap.release(Some(ptr));
//! ```
//!
//! ## How It Works
//!
//! Each block is a header followed by its payload:
//!
//! ```text
//!   Single Block:
//!   ┌───────────────────────┬────────────────────────────────┐
//!   │    Block Header       │         Payload                │
//!   │  ┌─────────────────┐  │                                │
//!   │  │ size: N         │  │  ┌──────────────────────────┐  │
//!   │  │ link: next free │  │  │                          │  │
//!   │  │ tag: 0x01234567 │  │  │     N bytes usable       │  │
//!   │  └─────────────────┘  │  │                          │  │
//!   │      32 bytes         │  └──────────────────────────┘  │
//!   └───────────────────────┴────────────────────────────────┘
//!                           ▲
//!                           └── Ptr returned to the caller
//! ```
//!
//! - **Split**: a free block with room for the request plus another header
//!   and 16 bytes is cut in two; the tail stays in the free list.
//! - **Coalesce**: a released block is merged with every free block that
//!   touches it in memory, repeatedly, until none is left.
//! - **Corruption guard**: release checks the tag. A mismatch (double
//!   release, foreign pointer, clobbered header) aborts the process; the
//!   `try_` variants report it as [`HeapError::CorruptionDetected`] instead.
//!
//! ## Limitations
//!
//! - **Single-threaded heap**: share it through [`LockedHeap`]
//! - **Grow only**: memory goes back to the OS when the process exits
//! - **16 byte alignment**: [`SbrkAllocator`] hands larger alignments to the
//!   system allocator
//! - **Unix-only**: [`ProgramBreak`] requires `libc` and `sbrk`

pub mod align;
pub mod backing;
pub mod block;
mod config;
mod error;
pub mod free_list;
mod global;
mod heap;
mod sbrk;

pub use backing::{Arena, Backing};
pub use block::{HEADER_SIZE, Ptr};
pub use config::{FitPolicy, HeapConfig};
pub use error::HeapError;
pub use free_list::FreeBlock;
pub use global::{LockedHeap, SbrkAllocator};
pub use heap::{Heap, HeapStats, MIN_REMAINDER};
pub use sbrk::{ProgramBreak, current_break};
