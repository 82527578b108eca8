//! Coalescing: merges a newly-freed block with any free neighbors so a
//! free run never sits split across two or more adjacent blocks. Without
//! this step, freeing blocks in the middle of a long-lived allocation
//! pattern would fragment the heap into unusably small pieces that never
//! get reused.

use crate::block::BlockRef;
use crate::free_list::{self, FreeListRegistry};

/// Merges `block` (already written as free, not yet linked into any
/// list) with any free neighbors, inserts the resulting block into the
/// appropriate free list, and fixes up the successor's `prev_alloc`/
/// `prev_mini` bits. Returns a handle to the (possibly merged) block.
///
/// # Safety
/// `block`'s header must already be written as free; `block` must not
/// be linked into any free list; both of `block`'s neighbors (as found
/// via `BlockRef::prev`/`BlockRef::next`) must have valid headers.
pub unsafe fn coalesce(registry: &mut FreeListRegistry, block: BlockRef) -> BlockRef {
    let pred_alloc = unsafe { block.is_prev_alloc() };
    let succ = unsafe { block.next() };
    let succ_alloc = unsafe { succ.is_alloc() };
    let size = unsafe { block.size() };

    let merged = match (pred_alloc, succ_alloc) {
        (true, true) => {
            log::trace!("coalesce: both neighbors allocated, size={size}");
            unsafe { free_list::insert(registry, block) };
            block
        }
        (false, true) => {
            // Predecessor free, successor allocated: absorb the predecessor.
            let pred = unsafe { block.prev() }.expect("prev_alloc bit says free, but no predecessor found");
            let pred_prev_alloc = unsafe { pred.is_prev_alloc() };
            let pred_prev_mini = unsafe { pred.is_prev_mini() };
            unsafe { free_list::delete(registry, pred) };
            let merged_size = unsafe { pred.size() } + size;
            log::trace!("coalesce: absorbing predecessor into merged size={merged_size}");
            unsafe { pred.write(merged_size, false, pred_prev_alloc, pred_prev_mini) };
            unsafe { free_list::insert(registry, pred) };
            pred
        }
        (true, false) => {
            // Successor free, predecessor allocated: absorb the successor.
            let prev_alloc_bit = pred_alloc;
            let prev_mini_bit = unsafe { block.is_prev_mini() };
            unsafe { free_list::delete(registry, succ) };
            let merged_size = size + unsafe { succ.size() };
            log::trace!("coalesce: absorbing successor into merged size={merged_size}");
            unsafe { block.write(merged_size, false, prev_alloc_bit, prev_mini_bit) };
            unsafe { free_list::insert(registry, block) };
            block
        }
        (false, false) => {
            // Both neighbors free: absorb both into a single block rooted
            // at the predecessor's address.
            let pred = unsafe { block.prev() }.expect("prev_alloc bit says free, but no predecessor found");
            let pred_prev_alloc = unsafe { pred.is_prev_alloc() };
            let pred_prev_mini = unsafe { pred.is_prev_mini() };
            unsafe { free_list::delete(registry, pred) };
            unsafe { free_list::delete(registry, succ) };
            let merged_size = unsafe { pred.size() } + size + unsafe { succ.size() };
            log::trace!("coalesce: absorbing both neighbors into merged size={merged_size}");
            unsafe { pred.write(merged_size, false, pred_prev_alloc, pred_prev_mini) };
            unsafe { free_list::insert(registry, pred) };
            pred
        }
    };

    // The merged block is always >= 32 bytes (a mini block has no room to
    // absorb a neighbor and stay mini), so the block that follows it can
    // never see a `prev_mini` bit of true after this.
    let following = unsafe { merged.next() };
    unsafe { following.update(false, false) };
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use std::alloc::{Layout, alloc, dealloc};

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
    fn both_neighbors_allocated_just_inserts() {
        let arena = Arena::new(256);
        let mut registry = FreeListRegistry::new();
        let block = arena.block_at(0);
        let succ = arena.block_at(64);
        unsafe {
            block.write(64, false, true, false);
            succ.write(16, true, false, false); // successor allocated (epilogue stand-in)
            let merged = coalesce(&mut registry, block);
            assert_eq!(merged, block);
            assert_eq!(merged.size(), 64);
            assert!(succ.is_prev_alloc());
        }
    }

    #[test]
    fn predecessor_free_absorbs_into_predecessor() {
        let arena = Arena::new(256);
        let mut registry = FreeListRegistry::new();
        let pred = arena.block_at(0);
        let block = arena.block_at(64);
        let succ = arena.block_at(64 + 64);
        unsafe {
            pred.write(64, false, true, false);
            free_list::insert(&mut registry, pred);
            block.write(64, false, false, false); // prev_alloc=false: pred is free
            succ.write(16, true, false, false);
            let merged = coalesce(&mut registry, block);
            assert_eq!(merged, pred);
            assert_eq!(merged.size(), 128);
            assert!(!succ.is_prev_alloc());
            assert!(!succ.is_prev_mini());
        }
    }

    #[test]
    fn successor_free_absorbs_into_block() {
        let arena = Arena::new(256);
        let mut registry = FreeListRegistry::new();
        let block = arena.block_at(0);
        let succ = arena.block_at(64);
        let after = arena.block_at(64 + 64);
        unsafe {
            block.write(64, false, true, false);
            succ.write(64, false, true, false);
            free_list::insert(&mut registry, succ);
            after.write(16, true, false, false);
            let merged = coalesce(&mut registry, block);
            assert_eq!(merged, block);
            assert_eq!(merged.size(), 128);
            assert!(!after.is_prev_alloc());
        }
    }

    #[test]
    fn both_neighbors_free_merges_all_three() {
        let arena = Arena::new(256);
        let mut registry = FreeListRegistry::new();
        let pred = arena.block_at(0);
        let block = arena.block_at(64);
        let succ = arena.block_at(128);
        let after = arena.block_at(128 + 64);
        unsafe {
            pred.write(64, false, true, false);
            free_list::insert(&mut registry, pred);
            block.write(64, false, false, false);
            succ.write(64, false, false, false);
            free_list::insert(&mut registry, succ);
            after.write(16, true, false, false);

            let merged = coalesce(&mut registry, block);
            assert_eq!(merged, pred);
            assert_eq!(merged.size(), 192);
            assert!(!after.is_prev_alloc());

            // No two adjacent free blocks should remain registered.
            let class = crate::config::class_index(192);
            assert_eq!(registry.head(class), Some(pred.header_addr()));
        }
    }

    #[test]
    fn mini_predecessor_is_found_via_prev_mini_bit() {
        let arena = Arena::new(256);
        let mut registry = FreeListRegistry::new();
        let pred = arena.block_at(0); // mini, 16 bytes, no footer
        let block = arena.block_at(16);
        let succ = arena.block_at(16 + 64);
        unsafe {
            pred.write(16, false, true, false);
            free_list::insert(&mut registry, pred);
            block.write(64, false, false, true); // prev_mini=true
            succ.write(16, true, false, false);

            let merged = coalesce(&mut registry, block);
            assert_eq!(merged, pred);
            assert_eq!(merged.size(), 16 + 64);
        }
    }
}
