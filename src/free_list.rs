//! The segregated free-list registry: 15 list heads, index 0 holding the
//! singly-linked mini free list and indices 1..=14 holding doubly-linked
//! normal free lists partitioned by size class. Splitting free blocks by
//! size class keeps placement from ever having to scan the whole heap for
//! a fit: each class's list only ever holds blocks in a narrow size band,
//! with O(1) normal insert/delete and a deliberate O(n) mini-delete
//! asymmetry (see `delete_mini` below).

use crate::address::Address;
use crate::block::BlockRef;
use crate::config::{self, NUM_CLASSES};

/// The 15 free-list heads. Index 0: mini list head. Index 1..=14: normal
/// list heads, one per size class.
pub struct FreeListRegistry {
    heads: [Option<Address>; NUM_CLASSES],
}

impl FreeListRegistry {
    pub fn new() -> Self {
        Self {
            heads: [None; NUM_CLASSES],
        }
    }

    pub fn head(&self, class: usize) -> Option<Address> {
        self.heads[class]
    }

    pub fn heads(&self) -> &[Option<Address>; NUM_CLASSES] {
        &self.heads
    }
}

impl Default for FreeListRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Inserts `block` (which must not currently be on any list) at the head
/// of the appropriate list, routing to the mini or normal path by size.
///
/// # Safety
/// `block`'s header must be valid, already written as free, and `block`
/// must not already be linked into any list.
pub unsafe fn insert(registry: &mut FreeListRegistry, block: BlockRef) {
    if unsafe { block.is_mini() } {
        unsafe { insert_mini(registry, block) };
    } else {
        unsafe { insert_normal(registry, block) };
    }
}

/// Removes `block` from whichever list it is on, routing by size.
///
/// # Safety
/// `block` must currently be a member of the list its size class (or the
/// mini list) implies.
pub unsafe fn delete(registry: &mut FreeListRegistry, block: BlockRef) {
    if unsafe { block.is_mini() } {
        unsafe { delete_mini(registry, block) };
    } else {
        unsafe { delete_normal(registry, block) };
    }
}

/// O(1) push at the head of the mini list. Only the next link is written:
/// mini free blocks have no room for a back-link once the header is
/// accounted for, so this list is singly-linked.
///
/// # Safety
/// `block` must be a free mini block not already linked.
unsafe fn insert_mini(registry: &mut FreeListRegistry, block: BlockRef) {
    let old_head = registry.heads[0];
    unsafe { block.set_mini_next(old_head) };
    registry.heads[0] = Some(block.header_addr());
}

/// O(n) in the mini list's length: since mini blocks carry no back-link,
/// finding the predecessor requires walking from the head. Acceptable
/// because mini free lists are short in practice.
///
/// # Safety
/// `block` must currently be a member of the mini list.
unsafe fn delete_mini(registry: &mut FreeListRegistry, block: BlockRef) {
    let target = block.header_addr();
    match registry.heads[0] {
        Some(head) if head == target => {
            registry.heads[0] = unsafe { block.mini_next() };
            return;
        }
        Some(mut addr) => loop {
            let current = BlockRef::at(addr);
            let next = unsafe { current.mini_next() };
            match next {
                Some(next_addr) if next_addr == target => {
                    let after = unsafe { block.mini_next() };
                    unsafe { current.set_mini_next(after) };
                    return;
                }
                Some(next_addr) => addr = next_addr,
                None => return,
            }
        },
        None => {}
    }
}

/// O(1) push at the head of the block's size class. Both prev and next
/// links are written; the old head's prev link, if any, is updated.
///
/// # Safety
/// `block` must be a free normal block not already linked.
unsafe fn insert_normal(registry: &mut FreeListRegistry, block: BlockRef) {
    let size = unsafe { block.size() };
    let class = config::class_index(size);
    let old_head = registry.heads[class];

    unsafe { block.set_normal_prev(None) };
    unsafe { block.set_normal_next(old_head) };
    if let Some(old) = old_head {
        unsafe { BlockRef::at(old).set_normal_prev(Some(block.header_addr())) };
    }
    registry.heads[class] = Some(block.header_addr());
}

/// O(1) unlink using the block's own prev/next links. Advances the class
/// head if `block` was first in its list.
///
/// # Safety
/// `block` must currently be a member of the list implied by its size.
unsafe fn delete_normal(registry: &mut FreeListRegistry, block: BlockRef) {
    let size = unsafe { block.size() };
    let class = config::class_index(size);
    let prev = unsafe { block.normal_prev() };
    let next = unsafe { block.normal_next() };

    match prev {
        Some(p) => unsafe { BlockRef::at(p).set_normal_next(next) },
        None => registry.heads[class] = next,
    }
    if let Some(n) = next {
        unsafe { BlockRef::at(n).set_normal_prev(prev) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WORD_SIZE;
    use std::alloc::{Layout, alloc, dealloc};

    /// A throwaway arena big enough to host a handful of blocks, so these
    /// unit tests can write real headers/links without touching `sbrk`.
    struct Arena {
        buf: *mut u8,
        layout: Layout,
    }

    impl Arena {
        fn new(bytes: usize) -> Self {
            let layout = Layout::from_size_align(bytes, 16).unwrap();
            let buf = unsafe { alloc(layout) };
            Self { buf, layout }
        }

        fn block_at(&self, offset: usize) -> BlockRef {
            BlockRef::at(Address::from_ptr(unsafe { self.buf.add(offset) }).unwrap())
        }
    }

    impl Drop for Arena {
        fn drop(&mut self) {
            unsafe { dealloc(self.buf, self.layout) };
        }
    }

    #[test]
    fn mini_insert_and_delete_head() {
        let arena = Arena::new(256);
        let mut registry = FreeListRegistry::new();
        let a = arena.block_at(0);
        let b = arena.block_at(16);
        unsafe {
            a.write(16, false, true, false);
            b.write(16, false, true, false);
            insert(&mut registry, a);
            insert(&mut registry, b);
        }
        assert_eq!(registry.head(0), Some(b.header_addr()));
        unsafe { delete(&mut registry, b) };
        assert_eq!(registry.head(0), Some(a.header_addr()));
        unsafe { delete(&mut registry, a) };
        assert_eq!(registry.head(0), None);
    }

    #[test]
    fn mini_delete_from_middle_walks_to_predecessor() {
        let arena = Arena::new(256);
        let mut registry = FreeListRegistry::new();
        let a = arena.block_at(0);
        let b = arena.block_at(16);
        let c = arena.block_at(32);
        unsafe {
            for blk in [a, b, c] {
                blk.write(16, false, true, false);
            }
            insert(&mut registry, a);
            insert(&mut registry, b);
            insert(&mut registry, c);
        }
        // list head-first is c -> b -> a
        unsafe { delete(&mut registry, b) };
        unsafe {
            assert_eq!(registry.head(0), Some(c.header_addr()));
            assert_eq!(c.mini_next(), Some(a.header_addr()));
            assert_eq!(a.mini_next(), None);
        }
    }

    #[test]
    fn normal_insert_and_delete_maintains_back_pointers() {
        let arena = Arena::new(512);
        let mut registry = FreeListRegistry::new();
        let a = arena.block_at(0);
        let b = arena.block_at(64);
        unsafe {
            a.write(64, false, true, false);
            b.write(64, false, true, false);
            insert(&mut registry, a);
            insert(&mut registry, b);
        }
        let class = config::class_index(64);
        assert_eq!(registry.head(class), Some(b.header_addr()));
        unsafe {
            assert_eq!(b.normal_next(), Some(a.header_addr()));
            assert_eq!(a.normal_prev(), Some(b.header_addr()));
            assert_eq!(b.normal_prev(), None);
        }
        unsafe { delete(&mut registry, b) };
        assert_eq!(registry.head(class), Some(a.header_addr()));
        unsafe { assert_eq!(a.normal_prev(), None) };
    }

    #[test]
    fn dispatcher_routes_by_size() {
        let arena = Arena::new(256);
        let mut registry = FreeListRegistry::new();
        let mini = arena.block_at(0);
        let normal = arena.block_at(16 + WORD_SIZE * 2);
        unsafe {
            mini.write(16, false, true, false);
            normal.write(64, false, true, false);
            insert(&mut registry, mini);
            insert(&mut registry, normal);
        }
        assert_eq!(registry.head(0), Some(mini.header_addr()));
        assert_eq!(registry.head(config::class_index(64)), Some(normal.header_addr()));
    }
}
