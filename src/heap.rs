//! The page broker contract, the heap bootstrapper/extender, the
//! top-level `Allocator`, and the `GlobalAlloc` adapter.
//!
//! Growing the heap is pulled out behind a `HeapBroker` trait instead of
//! calling `libc::sbrk` directly, so tests can supply a fake heap instead
//! of touching the real process break, and the allocator holds a
//! segregated free-list registry rather than one linked list.

use std::alloc::{GlobalAlloc, Layout};
use std::ptr;
use std::sync::Mutex;

use crate::address::Address;
use crate::block::BlockRef;
use crate::coalesce;
use crate::config::{ALIGNMENT, CHUNK_SIZE, MINI_BLOCK_SIZE, WORD_SIZE, round_up_align};
use crate::error::{CheckFailure, Sentinel};
use crate::free_list::FreeListRegistry;
use crate::place;

/// The single downstream collaborator: whatever grants additional heap
/// bytes and reports the heap's current bounds. `libc::sbrk` in
/// production (see [`LibcBroker`]); an in-`Vec` stand-in in tests (see
/// `testing::VecBroker`), so unit and property tests never touch the
/// real process break and can run in parallel.
pub trait HeapBroker {
    /// Grows the heap by `n` bytes and returns the address of the first
    /// new byte, or `None` on failure (out of memory, resource limits,
    /// ...). `n` is always a non-negative, 16-byte-aligned request from
    /// this crate.
    ///
    /// # Safety
    /// Implementors may assume `n >= 0` and that the caller will not rely
    /// on previously-granted addresses remaining valid if this call
    /// fails.
    unsafe fn sbrk(&mut self, n: usize) -> Option<Address>;

    /// The current inclusive lower bound of the heap.
    fn heap_lo(&self) -> Option<Address>;

    /// The current inclusive upper bound of the heap.
    fn heap_hi(&self) -> Option<Address>;
}

/// Production broker: grows the real process heap via `libc::sbrk`, the
/// only platform call this crate depends on.
#[derive(Default)]
pub struct LibcBroker {
    origin: Option<Address>,
}

impl HeapBroker for LibcBroker {
    unsafe fn sbrk(&mut self, n: usize) -> Option<Address> {
        let raw = unsafe { libc::sbrk(n as libc::intptr_t) };
        if raw == usize::MAX as *mut libc::c_void {
            return None;
        }
        let addr = Address::from_ptr(raw)?;
        if self.origin.is_none() {
            self.origin = Some(addr);
        }
        Some(addr)
    }

    fn heap_lo(&self) -> Option<Address> {
        self.origin
    }

    fn heap_hi(&self) -> Option<Address> {
        let raw = unsafe { libc::sbrk(0) };
        Address::from_ptr(raw)
    }
}

/// The segregated free-list allocator core: bootstraps prologue/epilogue
/// sentinels over a `HeapBroker`, then serves allocate/free/reallocate/
/// zero-alloc by delegating to `place`/`coalesce`/`free_list`.
///
/// Not `Sync`: this type carries no internal synchronization of its own.
/// [`LockedAllocator`] is the `Mutex`-wrapped, process-wide instance used
/// behind `GlobalAlloc`.
pub struct Allocator<B: HeapBroker> {
    broker: B,
    registry: FreeListRegistry,
    prologue: Address,
    epilogue: Address,
}

impl<B: HeapBroker> Allocator<B> {
    /// Bootstraps a fresh heap over `broker`: clears the free-list
    /// registry, requests 16 bytes for the prologue/epilogue sentinels,
    /// then extends by the default chunk size. Returns `None` if the
    /// broker cannot grant even the initial bytes.
    pub fn new(mut broker: B) -> Option<Self> {
        let registry = FreeListRegistry::new();
        let base = unsafe { broker.sbrk(2 * WORD_SIZE) }?;

        // Prologue: size 0, allocated, no real predecessor.
        unsafe { crate::header::write_word(base, crate::header::pack(0, true, true, false)) };
        let epilogue_addr = base.add(WORD_SIZE);
        // Epilogue initially inherits the prologue's prev bits: there is
        // no real block between them yet.
        unsafe { crate::header::write_word(epilogue_addr, crate::header::pack(0, true, true, false)) };

        let mut allocator = Self {
            broker,
            registry,
            prologue: base,
            epilogue: epilogue_addr,
        };
        unsafe { allocator.extend(CHUNK_SIZE)? };
        Some(allocator)
    }

    /// Grows the heap by `min_bytes` (rounded up to 16), writes a new
    /// free block where the old epilogue stood, writes a fresh epilogue
    /// after it, and coalesces the new block with a trailing free block
    /// if the heap's previous last block was free.
    ///
    /// # Safety
    /// Must only be called with the allocator's sentinels already
    /// bootstrapped.
    unsafe fn extend(&mut self, min_bytes: usize) -> Option<BlockRef> {
        let bytes = round_up_align(min_bytes);
        let old_epilogue = self.epilogue;
        let old_word = unsafe { crate::header::read_word(old_epilogue) };
        let prev_alloc = crate::header::is_prev_alloc(old_word);
        let prev_mini = crate::header::is_prev_mini(old_word);

        // The broker's returned address is the payload position of the
        // new block, one word past the old epilogue; the new block's
        // header occupies the word the old epilogue used to.
        unsafe { self.broker.sbrk(bytes) }?;

        let new_block = BlockRef::at(old_epilogue);
        unsafe { new_block.write(bytes, false, prev_alloc, prev_mini) };

        let new_epilogue_addr = old_epilogue.add(bytes);
        unsafe {
            crate::header::write_word(
                new_epilogue_addr,
                crate::header::pack(0, true, false, bytes == MINI_BLOCK_SIZE),
            )
        };
        self.epilogue = new_epilogue_addr;

        log::debug!("heap extended by {bytes} bytes, new epilogue at {new_epilogue_addr:?}");

        let merged = unsafe { coalesce::coalesce(&mut self.registry, new_block) };
        Some(merged)
    }

    /// Allocates at least `size` payload bytes. Returns null for a
    /// zero-size request or if the broker cannot supply more heap.
    ///
    /// # Safety
    /// Must only be called on a bootstrapped allocator.
    pub unsafe fn allocate(&mut self, size: usize) -> *mut u8 {
        if size == 0 {
            return ptr::null_mut();
        }
        let target = place::adjust_size(size);
        log::trace!("allocate: requested={size} adjusted={target}");

        let block = match unsafe { place::find_fit(&self.registry, target) } {
            Some(block) => block,
            None => {
                let grow = target.max(CHUNK_SIZE);
                log::debug!("allocate: no fit for {target} bytes, extending by {grow}");
                match unsafe { self.extend(grow) } {
                    Some(block) => block,
                    None => return ptr::null_mut(),
                }
            }
        };

        let allocated = unsafe { place::allocate_from(&mut self.registry, block, target) };
        unsafe { allocated.payload_addr().as_ptr::<u8>() }
    }

    /// Frees a pointer previously returned by `allocate`/`reallocate`.
    /// A null pointer is a no-op; freeing an already-freed pointer is
    /// undefined behavior (not detected outside the debug checker).
    ///
    /// # Safety
    /// `ptr` must be null or have been returned by a prior `allocate`/
    /// `reallocate`/`zero_alloc` call on this allocator, and not already
    /// freed.
    pub unsafe fn free(&mut self, ptr: *mut u8) {
        let Some(payload) = Address::from_ptr(ptr) else {
            return;
        };
        let block = BlockRef::from_payload(payload);
        let size = unsafe { block.size() };
        let prev_alloc = unsafe { block.is_prev_alloc() };
        let prev_mini = unsafe { block.is_prev_mini() };
        unsafe { block.write(size, false, prev_alloc, prev_mini) };
        log::trace!("free: size={size}");
        unsafe { coalesce::coalesce(&mut self.registry, block) };
    }

    /// `reallocate(None, size)` behaves like `allocate`; `size == 0`
    /// behaves like `free` and returns null; otherwise the first
    /// `min(size, old payload size)` bytes are preserved.
    ///
    /// # Safety
    /// `ptr` must be null or a pointer previously returned by this
    /// allocator and not already freed.
    pub unsafe fn reallocate(&mut self, ptr: *mut u8, size: usize) -> *mut u8 {
        if ptr.is_null() {
            return unsafe { self.allocate(size) };
        }
        if size == 0 {
            unsafe { self.free(ptr) };
            return ptr::null_mut();
        }

        let old_block = BlockRef::from_payload(Address::from_ptr(ptr).expect("non-null checked above"));
        let old_usable = unsafe { old_block.size() } - WORD_SIZE;

        let new_ptr = unsafe { self.allocate(size) };
        if new_ptr.is_null() {
            return ptr::null_mut();
        }

        let copy_len = old_usable.min(size);
        unsafe { ptr::copy_nonoverlapping(ptr, new_ptr, copy_len) };
        unsafe { self.free(ptr) };
        new_ptr
    }

    /// `count * elem_size` bytes, zero-filled. Returns null without
    /// mutating the heap if the multiplication overflows.
    ///
    /// # Safety
    /// No additional requirements beyond a bootstrapped allocator.
    pub unsafe fn zero_alloc(&mut self, count: usize, elem_size: usize) -> *mut u8 {
        let Some(total) = count.checked_mul(elem_size) else {
            return ptr::null_mut();
        };
        let ptr = unsafe { self.allocate(total) };
        if !ptr.is_null() {
            unsafe { ptr::write_bytes(ptr, 0, total) };
        }
        ptr
    }

    /// Walks the entire implicit list and every free list, reporting
    /// every independent invariant violation found rather than
    /// collapsing them into a single pass/fail result. Debug-only: a
    /// production build never pays for this.
    #[cfg(debug_assertions)]
    pub fn check_heap(&self) -> Vec<CheckFailure> {
        let mut failures = Vec::new();
        self.check_sentinels(&mut failures);
        self.check_implicit_list(&mut failures);
        self.check_free_lists(&mut failures);
        failures
    }

    #[cfg(debug_assertions)]
    fn check_sentinels(&self, failures: &mut Vec<CheckFailure>) {
        let prologue_word = unsafe { crate::header::read_word(self.prologue) };
        if crate::header::size_of(prologue_word) != 0 || !crate::header::is_alloc(prologue_word) {
            failures.push(CheckFailure::MissingSentinel { which: Sentinel::Prologue });
        }
        let epilogue_word = unsafe { crate::header::read_word(self.epilogue) };
        if crate::header::size_of(epilogue_word) != 0 || !crate::header::is_alloc(epilogue_word) {
            failures.push(CheckFailure::MissingSentinel { which: Sentinel::Epilogue });
        }
    }

    #[cfg(debug_assertions)]
    fn check_implicit_list(&self, failures: &mut Vec<CheckFailure>) {
        let lo = self.broker.heap_lo();
        let hi = self.broker.heap_hi();

        let mut current = BlockRef::at(self.prologue.add(WORD_SIZE));
        let mut prev_free: Option<Address> = None;

        while current.header_addr() != self.epilogue {
            let addr = current.header_addr();
            if let (Some(lo), Some(hi)) = (lo, hi) {
                if !addr.within(lo, hi) {
                    failures.push(CheckFailure::OutOfBounds { at: addr });
                }
            }

            let size = unsafe { current.size() };
            if size < 16 {
                failures.push(CheckFailure::BlockTooSmall { at: addr, size });
            } else if size % 16 != 0 {
                failures.push(CheckFailure::BlockMisaligned { at: addr, size });
            }

            let is_free = unsafe { !current.is_alloc() };
            if is_free {
                if size > MINI_BLOCK_SIZE {
                    let footer_addr = addr.add(size - WORD_SIZE);
                    let header_word = unsafe { crate::header::read_word(addr) };
                    let footer_word = unsafe { crate::header::read_word(footer_addr) };
                    if header_word != footer_word {
                        failures.push(CheckFailure::FooterMismatch { at: addr });
                    }
                }
                if let Some(prev_addr) = prev_free {
                    failures.push(CheckFailure::AdjacentFreeBlocks { first: prev_addr, second: addr });
                }
            }

            if let Some(prev) = unsafe { current.prev() } {
                let expected_alloc = unsafe { prev.is_alloc() };
                let found_alloc = unsafe { current.is_prev_alloc() };
                if expected_alloc != found_alloc {
                    failures.push(CheckFailure::PrevAllocMismatch {
                        at: addr,
                        expected: expected_alloc,
                        found: found_alloc,
                    });
                }
                let expected_mini = unsafe { prev.size() } == MINI_BLOCK_SIZE;
                let found_mini = unsafe { current.is_prev_mini() };
                if expected_mini != found_mini {
                    failures.push(CheckFailure::PrevMiniMismatch {
                        at: addr,
                        expected: expected_mini,
                        found: found_mini,
                    });
                }
            }

            prev_free = if is_free { Some(addr) } else { None };
            current = unsafe { current.next() };
        }
    }

    #[cfg(debug_assertions)]
    fn check_free_lists(&self, failures: &mut Vec<CheckFailure>) {
        let lo = self.broker.heap_lo();
        let hi = self.broker.heap_hi();
        let in_bounds = |addr: Address| matches!((lo, hi), (Some(lo), Some(hi)) if addr.within(lo, hi));

        // Class 0: singly-linked mini list, no back-pointers to check.
        let mut seen = std::collections::HashSet::new();
        let mut current = self.registry.head(0);
        while let Some(addr) = current {
            if !in_bounds(addr) {
                failures.push(CheckFailure::DanglingListLink { at: addr });
                break;
            }
            if !seen.insert(addr) {
                failures.push(CheckFailure::BrokenListLinkage { at: addr });
                break;
            }
            let block = BlockRef::at(addr);
            if unsafe { block.is_alloc() } || unsafe { block.size() } != MINI_BLOCK_SIZE {
                failures.push(CheckFailure::ListMembershipInvalid { at: addr, list: 0 });
            }
            current = unsafe { block.mini_next() };
        }

        for class in 1..crate::config::NUM_CLASSES {
            let mut seen = std::collections::HashSet::new();
            let mut current = self.registry.head(class);
            let mut prev_addr: Option<Address> = None;
            while let Some(addr) = current {
                if !in_bounds(addr) {
                    failures.push(CheckFailure::DanglingListLink { at: addr });
                    break;
                }
                if !seen.insert(addr) {
                    failures.push(CheckFailure::BrokenListLinkage { at: addr });
                    break;
                }
                let block = BlockRef::at(addr);
                let size = unsafe { block.size() };
                if unsafe { block.is_alloc() } || crate::config::class_index(size) != class {
                    failures.push(CheckFailure::ListMembershipInvalid { at: addr, list: class });
                }
                let back = unsafe { block.normal_prev() };
                if back != prev_addr {
                    failures.push(CheckFailure::BrokenListLinkage { at: addr });
                }
                prev_addr = Some(addr);
                current = unsafe { block.normal_next() };
            }
        }
    }
}

/// A `Mutex`-wrapped, lazily-bootstrapped, process-wide `Allocator`,
/// suitable for use as `#[global_allocator]`. Bootstrapping (the first
/// heap request) happens lazily on the first call rather than at
/// construction time, since a `const fn` constructor cannot itself talk
/// to the broker.
///
/// The lock only ever serializes the public entry points; the algorithm
/// itself (everything in `place`/`coalesce`/`free_list`) remains
/// deliberately single-threaded and lock-free. There is no internal
/// concurrency in the allocation algorithm, only mutual exclusion at the
/// API boundary.
pub struct LockedAllocator {
    inner: Mutex<Option<Allocator<LibcBroker>>>,
}

impl LockedAllocator {
    pub const fn new() -> Self {
        Self { inner: Mutex::new(None) }
    }

    /// Runs `f` against the lazily-bootstrapped process-wide allocator.
    /// Returns `None`, without running `f`, if bootstrap has not yet
    /// succeeded and the broker has no bytes to grant: broker exhaustion
    /// on the very first call is a failure mode, not a panic, same as
    /// exhaustion during any later extend.
    fn with_allocator<R>(&self, f: impl FnOnce(&mut Allocator<LibcBroker>) -> R) -> Option<R> {
        let mut guard = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if guard.is_none() {
            *guard = Allocator::new(LibcBroker::default());
        }
        let allocator = guard.as_mut()?;
        Some(f(allocator))
    }

    /// See [`Allocator::allocate`]. Returns null if the heap has never
    /// been bootstrapped and the broker cannot grant the initial bytes.
    ///
    /// # Safety
    /// Same obligations as [`Allocator::allocate`].
    pub unsafe fn allocate(&self, size: usize) -> *mut u8 {
        self.with_allocator(|a| unsafe { a.allocate(size) }).unwrap_or(ptr::null_mut())
    }

    /// See [`Allocator::free`]. A no-op if the heap was never
    /// successfully bootstrapped, same as freeing a null pointer.
    ///
    /// # Safety
    /// Same obligations as [`Allocator::free`].
    pub unsafe fn free(&self, ptr: *mut u8) {
        self.with_allocator(|a| unsafe { a.free(ptr) });
    }

    /// See [`Allocator::reallocate`]. Returns null if the heap has never
    /// been bootstrapped and the broker cannot grant the initial bytes.
    ///
    /// # Safety
    /// Same obligations as [`Allocator::reallocate`].
    pub unsafe fn reallocate(&self, ptr: *mut u8, size: usize) -> *mut u8 {
        self.with_allocator(|a| unsafe { a.reallocate(ptr, size) }).unwrap_or(ptr::null_mut())
    }

    /// See [`Allocator::zero_alloc`]. Returns null if the heap has never
    /// been bootstrapped and the broker cannot grant the initial bytes.
    ///
    /// # Safety
    /// Same obligations as [`Allocator::zero_alloc`].
    pub unsafe fn zero_alloc(&self, count: usize, elem_size: usize) -> *mut u8 {
        self.with_allocator(|a| unsafe { a.zero_alloc(count, elem_size) }).unwrap_or(ptr::null_mut())
    }
}

impl Default for LockedAllocator {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl GlobalAlloc for LockedAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > ALIGNMENT {
            return ptr::null_mut();
        }
        unsafe { self.allocate(layout.size()) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        unsafe { self.free(ptr) };
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if layout.align() > ALIGNMENT {
            return ptr::null_mut();
        }
        unsafe { self.reallocate(ptr, new_size) }
    }
}

/// Test-only broker and helpers, so unit/integration/property tests can
/// exercise the full bootstrap/extend/allocate/free path without ever
/// touching the real process break (which is shared process-wide state
/// and cannot be driven in parallel by `cargo test`).
pub mod testing {
    use super::*;

    /// A `HeapBroker` backed by a fixed-size boxed buffer instead of the
    /// real process break. The buffer is allocated once at its maximum
    /// size and never moves: unlike a growable `Vec<u8>`, whose
    /// reallocation on growth would invalidate every address already
    /// handed out as a free-list link or live pointer. `sbrk` hands out
    /// successive slices of it and fails once the buffer (or an explicit
    /// `fail_after` budget) is exhausted, which lets tests exercise
    /// broker exhaustion deterministically.
    pub struct VecBroker {
        buf: Box<[u8]>,
        used: usize,
        fail_after: Option<usize>,
    }

    /// Large enough for every scenario this crate's own tests drive; a
    /// property test that needs more should build its own broker.
    const DEFAULT_CAPACITY: usize = 16 * 1024 * 1024;

    impl VecBroker {
        pub fn new() -> Self {
            Self::with_capacity(DEFAULT_CAPACITY)
        }

        pub fn with_capacity(capacity: usize) -> Self {
            Self {
                buf: vec![0u8; capacity].into_boxed_slice(),
                used: 0,
                fail_after: None,
            }
        }

        /// Makes every `sbrk` call fail once `limit` total bytes have
        /// already been granted.
        pub fn with_fail_after(limit: usize) -> Self {
            Self {
                buf: vec![0u8; DEFAULT_CAPACITY].into_boxed_slice(),
                used: 0,
                fail_after: Some(limit),
            }
        }
    }

    impl Default for VecBroker {
        fn default() -> Self {
            Self::new()
        }
    }

    impl HeapBroker for VecBroker {
        unsafe fn sbrk(&mut self, n: usize) -> Option<Address> {
            if let Some(limit) = self.fail_after {
                if self.used + n > limit {
                    return None;
                }
            }
            if self.used + n > self.buf.len() {
                return None;
            }
            let start = self.used;
            self.used += n;
            Address::from_ptr(unsafe { self.buf.as_mut_ptr().add(start) })
        }

        fn heap_lo(&self) -> Option<Address> {
            Address::from_ptr(self.buf.as_ptr() as *mut u8)
        }

        fn heap_hi(&self) -> Option<Address> {
            if self.used == 0 {
                return None;
            }
            Address::from_ptr(unsafe { self.buf.as_ptr().add(self.used - 1) as *mut u8 })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::VecBroker;
    use super::*;

    #[test]
    fn bootstrap_installs_prologue_and_epilogue() {
        let allocator = Allocator::new(VecBroker::new()).unwrap();
        let prologue_word = unsafe { crate::header::read_word(allocator.prologue) };
        let epilogue_word = unsafe { crate::header::read_word(allocator.epilogue) };
        assert_eq!(crate::header::size_of(prologue_word), 0);
        assert!(crate::header::is_alloc(prologue_word));
        assert_eq!(crate::header::size_of(epilogue_word), 0);
        assert!(crate::header::is_alloc(epilogue_word));
    }

    #[test]
    fn fresh_heap_single_allocate() {
        let mut allocator = Allocator::new(VecBroker::new()).unwrap();
        let ptr = unsafe { allocator.allocate(24) };
        assert!(!ptr.is_null());
        assert_eq!(ptr as usize % 16, 0);

        let block = BlockRef::from_payload(Address::from_ptr(ptr).unwrap());
        assert_eq!(unsafe { block.size() }, 32);
        assert!(unsafe { block.is_alloc() });
    }

    #[test]
    fn mini_allocation_sets_successor_prev_mini() {
        let mut allocator = Allocator::new(VecBroker::new()).unwrap();
        let ptr = unsafe { allocator.allocate(8) };
        assert!(!ptr.is_null());

        let block = BlockRef::from_payload(Address::from_ptr(ptr).unwrap());
        assert_eq!(unsafe { block.size() }, 16);

        let successor = unsafe { block.next() };
        assert!(unsafe { successor.is_prev_mini() });
    }

    #[test]
    fn split_correctness_on_first_chunk() {
        let mut allocator = Allocator::new(VecBroker::new()).unwrap();
        let ptr = unsafe { allocator.allocate(100) };
        assert!(!ptr.is_null());

        let block = BlockRef::from_payload(Address::from_ptr(ptr).unwrap());
        assert_eq!(unsafe { block.size() }, 112);

        let remainder = unsafe { block.next() };
        assert_eq!(unsafe { remainder.size() }, CHUNK_SIZE - 112);
        assert!(!unsafe { remainder.is_alloc() });
    }

    #[test]
    fn coalesce_both_after_three_frees() {
        let mut allocator = Allocator::new(VecBroker::new()).unwrap();
        let a = unsafe { allocator.allocate(64) };
        let b = unsafe { allocator.allocate(64) };
        let c = unsafe { allocator.allocate(64) };

        unsafe {
            allocator.free(a);
            allocator.free(c);
            allocator.free(b);
        }

        let block_a = BlockRef::from_payload(Address::from_ptr(a).unwrap());
        // a absorbed b and c: 3 * 80-byte blocks (64 payload + 16 header
        // rounded) merge into one 240-byte free block.
        assert_eq!(unsafe { block_a.size() }, 80 * 3);
        assert!(!unsafe { block_a.is_alloc() });
    }

    #[test]
    fn reallocate_grows_and_preserves_bytes() {
        let mut allocator = Allocator::new(VecBroker::new()).unwrap();
        let ptr = unsafe { allocator.allocate(40) };
        assert!(!ptr.is_null());
        unsafe {
            for i in 0..40u8 {
                ptr.add(i as usize).write(i);
            }
        }

        let grown = unsafe { allocator.reallocate(ptr, 200) };
        assert!(!grown.is_null());
        unsafe {
            for i in 0..40u8 {
                assert_eq!(grown.add(i as usize).read(), i);
            }
        }
    }

    #[test]
    fn reallocate_null_is_allocate() {
        let mut allocator = Allocator::new(VecBroker::new()).unwrap();
        let ptr = unsafe { allocator.reallocate(ptr::null_mut(), 32) };
        assert!(!ptr.is_null());
    }

    #[test]
    fn reallocate_zero_size_is_free() {
        let mut allocator = Allocator::new(VecBroker::new()).unwrap();
        let ptr = unsafe { allocator.allocate(32) };
        let result = unsafe { allocator.reallocate(ptr, 0) };
        assert!(result.is_null());
    }

    #[test]
    fn zero_alloc_fills_with_zero() {
        let mut allocator = Allocator::new(VecBroker::new()).unwrap();
        let ptr = unsafe { allocator.zero_alloc(16, 4) };
        assert!(!ptr.is_null());
        unsafe {
            for i in 0..64 {
                assert_eq!(ptr.add(i).read(), 0);
            }
        }
    }

    #[test]
    fn zero_alloc_overflow_returns_null_without_mutating_heap() {
        let mut allocator = Allocator::new(VecBroker::new()).unwrap();
        let before = allocator.check_heap();
        let ptr = unsafe { allocator.zero_alloc(usize::MAX, 2) };
        assert!(ptr.is_null());
        assert_eq!(allocator.check_heap(), before);
    }

    #[test]
    fn allocate_zero_returns_null() {
        let mut allocator = Allocator::new(VecBroker::new()).unwrap();
        assert!(unsafe { allocator.allocate(0) }.is_null());
    }

    #[test]
    fn free_null_is_noop() {
        let mut allocator = Allocator::new(VecBroker::new()).unwrap();
        unsafe { allocator.free(ptr::null_mut()) };
        assert!(allocator.check_heap().is_empty());
    }

    #[test]
    fn broker_exhaustion_surfaces_as_null() {
        // Only enough for bootstrap's chunk; a later large request fails.
        let mut allocator = Allocator::new(VecBroker::with_fail_after(CHUNK_SIZE + 16)).unwrap();
        let ptr = unsafe { allocator.allocate(CHUNK_SIZE * 4) };
        assert!(ptr.is_null());
    }

    #[test]
    fn heap_passes_checker_after_a_mixed_sequence() {
        let mut allocator = Allocator::new(VecBroker::new()).unwrap();
        let mut live = Vec::new();
        for size in [8, 24, 100, 16, 4000, 64] {
            let ptr = unsafe { allocator.allocate(size) };
            assert!(!ptr.is_null());
            live.push(ptr);
        }
        for (i, ptr) in live.into_iter().enumerate() {
            if i % 2 == 0 {
                unsafe { allocator.free(ptr) };
            }
        }
        assert_eq!(allocator.check_heap(), Vec::new());
    }
}
