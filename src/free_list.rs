//! Singly linked registry of free blocks.
//!
//! The links live inside the free blocks' own headers, so the list itself is
//! just a head. List order is insertion order (newest first) and drives the
//! fit policy; it says nothing about where blocks sit in memory. The
//! neighbour lookups below therefore walk the whole list.

use crate::{backing::Backing, block::Block};

/// A free block as reported to callers: header address and payload capacity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreeBlock {
  pub addr: usize,
  pub size: usize,
}

#[derive(Debug, Default)]
pub struct FreeList {
  head: Option<Block>,
}

impl FreeList {
  pub const fn new() -> Self {
    Self { head: None }
  }

  pub fn head(&self) -> Option<Block> {
    self.head
  }

  pub fn is_empty(&self) -> bool {
    self.head.is_none()
  }

  /// Pushes `block` onto the head. O(1).
  pub fn insert<B: Backing + ?Sized>(
    &mut self,
    mem: &mut B,
    block: Block,
  ) {
    block.set_link(mem, self.head);
    self.head = Some(block);
  }

  /// Splices `block` out of the chain. Returns `false` if it was not listed.
  pub fn remove<B: Backing + ?Sized>(
    &mut self,
    mem: &mut B,
    block: Block,
  ) -> bool {
    let Some(head) = self.head else {
      return false;
    };

    if head == block {
      self.head = block.link(mem);
      return true;
    }

    let mut current = head;
    while let Some(next) = current.link(mem) {
      if next == block {
        let following = block.link(mem);
        current.set_link(mem, following);
        return true;
      }
      current = next;
    }

    false
  }

  /// Puts `new` at `old`'s position in the chain; `new` inherits `old`'s link.
  pub fn replace<B: Backing + ?Sized>(
    &mut self,
    mem: &mut B,
    old: Block,
    new: Block,
  ) -> bool {
    let following = old.link(mem);

    if self.head == Some(old) {
      new.set_link(mem, following);
      self.head = Some(new);
      return true;
    }

    let previous = {
      let mem: &B = mem;
      self.iter(mem).find(|block| block.link(mem) == Some(old))
    };
    let Some(previous) = previous else {
      return false;
    };
    new.set_link(mem, following);
    previous.set_link(mem, Some(new));
    true
  }

  pub fn contains<B: Backing + ?Sized>(
    &self,
    mem: &B,
    block: Block,
  ) -> bool {
    self.iter(mem).any(|listed| listed == block)
  }

  /// Free block whose span ends exactly where `block` begins.
  pub fn find_previous_contiguous<B: Backing + ?Sized>(
    &self,
    mem: &B,
    block: Block,
  ) -> Option<Block> {
    self
      .iter(mem)
      .find(|candidate| candidate.end(mem) == block.addr())
  }

  /// Free block that begins exactly where `block`'s span ends.
  pub fn find_next_contiguous<B: Backing + ?Sized>(
    &self,
    mem: &B,
    block: Block,
  ) -> Option<Block> {
    let end = block.end(mem);

    self.iter(mem).find(|candidate| candidate.addr() == end)
  }

  pub fn iter<'a, B: Backing + ?Sized>(
    &self,
    mem: &'a B,
  ) -> Iter<'a, B> {
    Iter { mem, next: self.head }
  }

  /// Walks the chain starting at `start`, which must be listed.
  pub fn iter_from<'a, B: Backing + ?Sized>(
    &self,
    mem: &'a B,
    start: Block,
  ) -> Iter<'a, B> {
    Iter { mem, next: Some(start) }
  }
}

pub struct Iter<'a, B: ?Sized> {
  mem: &'a B,
  next: Option<Block>,
}

impl<B: Backing + ?Sized> Iterator for Iter<'_, B> {
  type Item = Block;

  fn next(&mut self) -> Option<Block> {
    let block = self.next?;
    self.next = block.link(self.mem);
    Some(block)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{backing::Arena, block::HEADER_SIZE};

  /// Lays out contiguous free-able blocks of the given payload sizes.
  fn carve(
    arena: &mut Arena,
    sizes: &[usize],
  ) -> Vec<Block> {
    sizes
      .iter()
      .map(|size| {
        let block = Block::at(arena.extend(HEADER_SIZE + size).unwrap());
        block.init(arena, *size, None);
        block
      })
      .collect()
  }

  fn listed(
    list: &FreeList,
    arena: &Arena,
  ) -> Vec<Block> {
    list.iter(arena).collect()
  }

  #[test]
  fn test_insert_pushes_head() {
    let mut arena = Arena::new();
    let blocks = carve(&mut arena, &[16, 16, 16]);
    let mut list = FreeList::new();

    assert!(list.is_empty());
    for block in &blocks {
      list.insert(&mut arena, *block);
    }

    assert_eq!(list.head(), Some(blocks[2]));
    assert_eq!(listed(&list, &arena), vec![blocks[2], blocks[1], blocks[0]]);
  }

  #[test]
  fn test_remove_head_middle_tail_and_missing() {
    let mut arena = Arena::new();
    let blocks = carve(&mut arena, &[16, 16, 16, 16]);
    let mut list = FreeList::new();
    for block in &blocks[..3] {
      list.insert(&mut arena, *block);
    }

    assert!(!list.remove(&mut arena, blocks[3]));
    assert!(list.remove(&mut arena, blocks[1]));
    assert_eq!(listed(&list, &arena), vec![blocks[2], blocks[0]]);
    assert!(list.remove(&mut arena, blocks[2]));
    assert_eq!(listed(&list, &arena), vec![blocks[0]]);
    assert!(list.remove(&mut arena, blocks[0]));
    assert!(list.is_empty());
    assert!(!list.remove(&mut arena, blocks[0]));
  }

  #[test]
  fn test_replace_keeps_position() {
    let mut arena = Arena::new();
    let blocks = carve(&mut arena, &[16, 16, 16, 16]);
    let mut list = FreeList::new();
    for block in &blocks[..3] {
      list.insert(&mut arena, *block);
    }

    assert!(list.replace(&mut arena, blocks[1], blocks[3]));
    assert_eq!(listed(&list, &arena), vec![blocks[2], blocks[3], blocks[0]]);

    assert!(list.replace(&mut arena, blocks[2], blocks[1]));
    assert_eq!(listed(&list, &arena), vec![blocks[1], blocks[3], blocks[0]]);
  }

  #[test]
  fn test_neighbours_follow_memory_not_list_order() {
    let mut arena = Arena::new();
    let blocks = carve(&mut arena, &[16, 32, 48]);
    let mut list = FreeList::new();

    // list order: [0, 2]; memory order: 0, 1, 2
    list.insert(&mut arena, blocks[2]);
    list.insert(&mut arena, blocks[0]);

    assert_eq!(list.find_previous_contiguous(&arena, blocks[1]), Some(blocks[0]));
    assert_eq!(list.find_next_contiguous(&arena, blocks[1]), Some(blocks[2]));
    assert_eq!(list.find_previous_contiguous(&arena, blocks[0]), None);
    assert_eq!(list.find_next_contiguous(&arena, blocks[2]), None);
    assert!(list.contains(&arena, blocks[2]));
    assert!(!list.contains(&arena, blocks[1]));
  }

  #[test]
  fn test_iter_from_resumes_mid_chain() {
    let mut arena = Arena::new();
    let blocks = carve(&mut arena, &[16, 16, 16]);
    let mut list = FreeList::new();
    for block in &blocks {
      list.insert(&mut arena, *block);
    }

    let tail: Vec<_> = list.iter_from(&arena, blocks[1]).collect();
    assert_eq!(tail, vec![blocks[1], blocks[0]]);
  }
}
