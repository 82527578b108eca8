//! The placement engine: converts a user request into an internal
//! allocation size, performs a bounded best-fit search across the
//! segregated lists, and splits the chosen block.
//!
//! An unbounded best-fit search can walk arbitrarily long free lists, so
//! the search here caps how many blocks it examines per size class and
//! accepts any fit close enough to stop early, trading a little fit
//! quality for a bounded worst-case cost.

use crate::block::BlockRef;
use crate::config::{CLOSE_ENOUGH, MINI_BLOCK_SIZE, NUM_CLASSES, SEARCH_LIMIT, WORD_SIZE, class_index, round_up_align};
use crate::free_list::{self, FreeListRegistry};

/// Converts a user-requested payload size into the internal block size
/// actually allocated: small requests become a mini block, everything
/// else gets a header word's worth of room added and is rounded up to
/// the 16-byte alignment. No footer is ever reserved for an allocated
/// block.
pub const fn adjust_size(requested: usize) -> usize {
    if requested <= 8 {
        MINI_BLOCK_SIZE
    } else {
        round_up_align(requested + WORD_SIZE)
    }
}

/// Searches the segregated lists for a free block of at least `target`
/// bytes.
///
/// If `target` is exactly a mini block and the mini list is non-empty,
/// its head is returned immediately. The mini list is never walked with
/// the normal prev/next accessors (that would be reachable only if this
/// early return were skipped, which it never is).
///
/// Otherwise, each class from the smallest one that could fit `target`
/// up through the largest is scanned; the scan budget resets at the top
/// of every class ([`SEARCH_LIMIT`] blocks examined per class, not across
/// the whole search), and a running best (minimum excess) fit is kept.
/// A fit whose excess is at or below [`CLOSE_ENOUGH`] short-circuits the
/// whole search immediately.
///
/// # Safety
/// Every block reachable from `registry`'s list heads must have a valid
/// header and valid free-list links.
pub unsafe fn find_fit(registry: &FreeListRegistry, target: usize) -> Option<BlockRef> {
    let start = class_index(target);

    if start == 0 {
        if let Some(head) = registry.head(0) {
            return Some(BlockRef::at(head));
        }
    }

    // Class 0 holds only mini blocks and must never be walked with the
    // normal-link accessors, so the generic scan below starts at class 1
    // even when `target` itself mapped to class 0 (mini list was empty).
    let scan_start = start.max(1);

    let mut best: Option<(BlockRef, usize)> = None;
    for class in scan_start..NUM_CLASSES {
        let mut examined: u32 = 0;
        let mut current = registry.head(class);

        while let Some(addr) = current {
            if examined >= SEARCH_LIMIT {
                break;
            }
            examined += 1;

            let candidate = BlockRef::at(addr);
            let size = unsafe { candidate.size() };
            if size >= target {
                let excess = size - target;
                let is_better = best.map_or(true, |(_, best_excess)| excess < best_excess);
                if is_better {
                    best = Some((candidate, excess));
                    if excess <= CLOSE_ENOUGH {
                        return Some(candidate);
                    }
                }
            }

            current = unsafe { candidate.normal_next() };
        }
    }

    best.map(|(block, _)| block)
}

/// Removes `block` from its free list, splits it if the remainder would
/// be at least 16 bytes, and returns the now-allocated low part ready to
/// hand to the caller.
///
/// If `block.size() - target >= 16`, the low `target` bytes become an
/// allocated block (inheriting `block`'s own `prev_alloc`/`prev_mini`
/// bits) and the remaining high part becomes a new free block, inserted
/// into its class list, with the block after it corrected to see a
/// non-allocated, non-mini predecessor. Otherwise the whole block is
/// marked allocated with no split, and the block after it is corrected
/// to see an allocated predecessor.
///
/// # Safety
/// `block` must currently be linked into the free list implied by its
/// size, and have at least `block.size()` valid, writable heap bytes.
pub unsafe fn allocate_from(registry: &mut FreeListRegistry, block: BlockRef, target: usize) -> BlockRef {
    let block_size = unsafe { block.size() };
    let prev_alloc = unsafe { block.is_prev_alloc() };
    let prev_mini = unsafe { block.is_prev_mini() };

    unsafe { free_list::delete(registry, block) };

    if block_size - target >= MINI_BLOCK_SIZE {
        log::trace!("place: splitting block_size={block_size} target={target}");
        unsafe { block.write(target, true, prev_alloc, prev_mini) };

        let remainder_size = block_size - target;
        let remainder = unsafe { block.next() };
        let remainder_is_mini = remainder_size == MINI_BLOCK_SIZE;
        unsafe { remainder.write(remainder_size, false, true, target == MINI_BLOCK_SIZE) };
        unsafe { free_list::insert(registry, remainder) };

        let following = unsafe { remainder.next() };
        unsafe { following.update(false, remainder_is_mini) };
    } else {
        unsafe { block.write(block_size, true, prev_alloc, prev_mini) };

        let following = unsafe { block.next() };
        unsafe { following.update(true, block_size == MINI_BLOCK_SIZE) };
    }

    block
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
    fn adjust_size_rules() {
        assert_eq!(adjust_size(0), 16);
        assert_eq!(adjust_size(8), 16);
        assert_eq!(adjust_size(9), 32); // 9+8=17 -> round to 32
        assert_eq!(adjust_size(24), 32);
        assert_eq!(adjust_size(100), 112); // 100+8=108 -> round to 112
    }

    #[test]
    fn find_fit_returns_mini_head_immediately() {
        let arena = Arena::new(256);
        let mut registry = FreeListRegistry::new();
        let mini = arena.block_at(0);
        unsafe {
            mini.write(16, false, true, false);
            free_list::insert(&mut registry, mini);
        }
        let found = unsafe { find_fit(&registry, 16) };
        assert_eq!(found, Some(mini));
    }

    #[test]
    fn find_fit_picks_best_excess_within_class() {
        let arena = Arena::new(1024);
        let mut registry = FreeListRegistry::new();
        let loose = arena.block_at(0); // 256 bytes: huge excess for a 100-byte ask
        let tight = arena.block_at(256); // 112 bytes: tight fit
        unsafe {
            loose.write(256, false, true, false);
            tight.write(112, false, true, false);
            free_list::insert(&mut registry, loose);
            free_list::insert(&mut registry, tight);
        }
        let found = unsafe { find_fit(&registry, 100) };
        assert_eq!(found, Some(tight));
    }

    #[test]
    fn split_carves_remainder_into_its_own_class() {
        let arena = Arena::new(4096);
        let mut registry = FreeListRegistry::new();
        let block = arena.block_at(0);
        let after = arena.block_at(2048);
        unsafe {
            block.write(2048, false, true, false);
            after.write(16, true, false, false);
            let allocated = allocate_from(&mut registry, block, 112);
            assert_eq!(allocated.size(), 112);
            assert!(allocated.is_alloc());

            let remainder = allocated.next();
            assert_eq!(remainder.size(), 2048 - 112);
            assert!(!remainder.is_alloc());
            assert!(remainder.is_prev_alloc());

            let class = crate::config::class_index(2048 - 112);
            assert_eq!(registry.head(class), Some(remainder.header_addr()));
            assert!(!after.is_prev_alloc());
        }
    }

    #[test]
    fn no_split_when_remainder_too_small() {
        let arena = Arena::new(256);
        let mut registry = FreeListRegistry::new();
        let block = arena.block_at(0);
        let after = arena.block_at(32);
        unsafe {
            block.write(32, false, true, false);
            after.write(16, true, false, false);
            // target=32 leaves 0 remainder, no split.
            let allocated = allocate_from(&mut registry, block, 32);
            assert_eq!(allocated.size(), 32);
            assert!(allocated.is_alloc());
            assert!(after.is_prev_alloc());
        }
    }
}
