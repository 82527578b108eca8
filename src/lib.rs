//! # segfit - A Segregated Free-List Memory Allocator
//!
//! This crate provides a general-purpose dynamic memory allocator that
//! manages a single contiguous, monotonically growable heap region on top
//! of `sbrk`. Unlike a bump allocator, freed blocks are tracked in
//! size-classed free lists and merged with their neighbors, so memory
//! returned by one allocation is actually reused by the next one.
//!
//! ## Overview
//!
//! ```text
//!   Segregated Free List Concept:
//!
//!   ┌──────────────────────────────────────────────────────────────────┐
//!   │                         HEAP MEMORY                               │
//!   │                                                                    │
//!   │  ┌────┬──────┬────┬────────┬────┬──────────────┬────┬──────────┐ │
//!   │  │ P  │ free │ A1 │ free   │ A2 │    free      │ A3 │    E     │ │
//!   │  └────┴──┬───┴────┴───┬────┴────┴──────┬───────┴────┴──────────┘ │
//!   │          │            │                │                         │
//!   │          └──────┐     └──────┐  ┌───────┘                         │
//!   │                 ▼            ▼  ▼                                 │
//!   │   class[0]   class[1]  ...  class[k]  ...  class[14]              │
//!   │   (mini)     (32-64B)       (size range)    (> 256KiB)            │
//!   └──────────────────────────────────────────────────────────────────┘
//!
//!   P/E: prologue/epilogue sentinels. Each free block also lives in the
//!   doubly- (or, for mini blocks, singly-) linked list for its size
//!   class, so placement never has to scan the whole heap.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   segfit
//!   ├── config      - tunable constants (class bounds, search budget, ...)
//!   ├── address     - typed, non-null heap address newtype
//!   ├── header      - 64-bit header/footer bit-packing codec
//!   ├── block       - BlockRef: block navigation and link accessors
//!   ├── free_list   - the 15 segregated free-list heads, insert/delete
//!   ├── coalesce    - boundary-tag coalescing of newly-freed blocks
//!   ├── place       - best-fit search, splitting, size adjustment
//!   ├── error       - CheckFailure: debug-only invariant diagnostics
//!   └── heap        - HeapBroker, bootstrap/extend, the public entry points
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use segfit::ALLOCATOR;
//!
//! #[global_allocator]
//! static GLOBAL: segfit::LockedAllocator = ALLOCATOR;
//!
//! fn main() {
//!     let v: Vec<u32> = (0..1024).collect();
//!     println!("{}", v.len());
//! }
//! ```
//!
//! Or drive the four primitives directly, without installing a global
//! allocator:
//!
//! ```rust,ignore
//! unsafe {
//!     let ptr = segfit::allocate(64);
//!     segfit::free(ptr);
//! }
//! ```
//!
//! ## How It Works
//!
//! Like the crate's bump-allocator predecessor, `sbrk` is the only source
//! of new memory, but every block now carries a packed header (and, when
//! free and larger than a "mini" block, a matching footer):
//!
//! ```text
//!   Header word (64 bits):
//!
//!   63                              4   3    2    1    0
//!   ┌───────────────────────────────┬───┬────┬────┬────┐
//!   │         size (bytes)          │ 0 │ PM │ PA │ A  │
//!   └───────────────────────────────┴───┴────┴────┴────┘
//!
//!   A  = this block allocated
//!   PA = previous block allocated
//!   PM = previous block is a mini block (16 bytes, no footer)
//! ```
//!
//! A freed block is merged with any free neighbor(s) (`coalesce`) and
//! linked into the free list for its size class (`free_list`). An
//! allocation request is rounded up (`place::adjust_size`), matched
//! against the free lists with a bounded best-fit search
//! (`place::find_fit`), and, on a miss, satisfied by asking the broker
//! for more heap (`heap::Allocator::extend`).
//!
//! ## Features
//!
//! - **Real reuse**: freed blocks are coalesced and returned to service,
//!   unlike a bump allocator that can only ever grow.
//! - **Bounded search**: placement never scans more than a fixed number
//!   of blocks per size class, so worst-case allocate cost is bounded.
//! - **`GlobalAlloc`-compatible**: [`LockedAllocator`](heap::LockedAllocator)
//!   can be installed with `#[global_allocator]`.
//!
//! ## Limitations
//!
//! - **Single-threaded algorithm**: `LockedAllocator` serializes callers
//!   with a mutex, but the allocator itself has no internal concurrency.
//! - **No alignment above 16 bytes**: `GlobalAlloc::alloc` returns null
//!   for any stricter request.
//! - **Unix-only**: uses `libc::sbrk`, a POSIX-only primitive.
//! - **Heap only grows**: bytes are never returned to the broker, even
//!   when the entire heap becomes free.
//!
//! ## Safety
//!
//! This crate is inherently unsafe: it manages raw memory outside Rust's
//! ownership model. Every function that reads or writes heap memory is
//! `unsafe` and documents its safety obligations; see each module's `#
//! Safety` sections.

pub mod address;
pub mod block;
pub mod coalesce;
pub mod config;
pub mod error;
pub mod free_list;
pub mod header;
pub mod heap;
pub mod place;

pub use error::{CheckFailure, Sentinel};
pub use heap::{Allocator, HeapBroker, LibcBroker, LockedAllocator};

/// The process-wide allocator instance, lazily bootstrapped on first use.
/// Install it as the global allocator with:
///
/// ```rust,ignore
/// #[global_allocator]
/// static GLOBAL: segfit::LockedAllocator = segfit::ALLOCATOR;
/// ```
pub static ALLOCATOR: LockedAllocator = LockedAllocator::new();

/// Allocates at least `size` bytes from the process-wide allocator.
/// Returns null for a zero-size request or if the heap cannot be grown
/// further.
///
/// # Safety
/// The returned pointer, if non-null, must eventually be passed to
/// [`free`] or [`reallocate`] at most once, and never read or written
/// past the block's actual usable size.
pub unsafe fn allocate(size: usize) -> *mut u8 {
    unsafe { ALLOCATOR.allocate(size) }
}

/// Frees a pointer previously returned by [`allocate`], [`reallocate`],
/// or [`zero_alloc`]. A null pointer is a no-op.
///
/// # Safety
/// `ptr` must be null or a live pointer returned by this crate's
/// allocation functions, not already freed.
pub unsafe fn free(ptr: *mut u8) {
    unsafe { ALLOCATOR.free(ptr) }
}

/// Resizes a previous allocation, preserving its leading bytes.
/// `reallocate(null, size)` behaves like `allocate(size)`;
/// `reallocate(ptr, 0)` behaves like `free(ptr)` and returns null.
///
/// # Safety
/// Same obligations as [`allocate`] and [`free`] combined.
pub unsafe fn reallocate(ptr: *mut u8, size: usize) -> *mut u8 {
    unsafe { ALLOCATOR.reallocate(ptr, size) }
}

/// Allocates `count * elem_size` zero-filled bytes. Returns null, without
/// touching the heap, if the multiplication overflows.
///
/// # Safety
/// Same obligations as [`allocate`].
pub unsafe fn zero_alloc(count: usize, elem_size: usize) -> *mut u8 {
    unsafe { ALLOCATOR.zero_alloc(count, elem_size) }
}
