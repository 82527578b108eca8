//! Tunable constants for the segregated free-list allocator.
//!
//! Every magic number the allocator relies on lives here instead of
//! scattered through the algorithm modules, so there is one obvious place
//! to look for sizing rules. There is no runtime configuration surface (no
//! env vars, no config file): every one of these is a compile-time layout
//! decision.

/// Size of one header/footer word, in bytes. The header format is defined
/// as a 64-bit word regardless of target pointer width.
pub const WORD_SIZE: usize = 8;

/// Minimum required alignment for every block and every payload pointer
/// returned to callers. The low 4 header bits are stolen from the size
/// field because no block size is ever a multiple of less than 16.
pub const ALIGNMENT: usize = 16;

/// Size, in bytes, of a mini block: header only, no footer, single
/// next-link when free.
pub const MINI_BLOCK_SIZE: usize = 16;

/// Smallest legal size for a normal (non-mini) block.
pub const NORMAL_MIN_SIZE: usize = 32;

/// Number of segregated free-list classes, index 0 (mini) through 14.
pub const NUM_CLASSES: usize = 15;

/// Per-class best-fit probe budget: abort the current class's list walk
/// after examining this many blocks and move to the next class.
pub const SEARCH_LIMIT: u32 = 10;

/// A fit whose excess (block size minus requested size) is at or below
/// this threshold is accepted immediately instead of continuing the
/// best-fit search.
pub const CLOSE_ENOUGH: usize = 46;

/// Default number of bytes requested from the broker when no existing
/// free block satisfies a request.
pub const CHUNK_SIZE: usize = 2048;

/// Upper (inclusive) size bound for each of the 14 normal free-list
/// classes (index 1..=14), matching the table in the design. Class 0
/// (mini) is handled separately since it holds only exactly-16-byte
/// blocks.
const CLASS_UPPER_BOUNDS: [usize; 14] = [
    64,
    128,
    256,
    512,
    1024,
    2048,
    4096,
    8192,
    16384,
    32768,
    65536,
    131072,
    262144,
    usize::MAX,
];

/// Rounds `n` up to the next multiple of [`ALIGNMENT`].
pub const fn round_up_align(n: usize) -> usize {
    (n + ALIGNMENT - 1) & !(ALIGNMENT - 1)
}

/// Returns the free-list class index (0..=14) for a block of `size` bytes.
///
/// Index 0 is reserved for mini blocks (`size < NORMAL_MIN_SIZE`, in
/// practice always exactly [`MINI_BLOCK_SIZE`]). Otherwise returns the
/// smallest class whose upper bound is `>= size`, capped at 14. Pure and
/// total: every `usize` maps to exactly one index.
pub const fn class_index(size: usize) -> usize {
    if size < NORMAL_MIN_SIZE {
        return 0;
    }
    let mut i = 0;
    while i < CLASS_UPPER_BOUNDS.len() {
        if size <= CLASS_UPPER_BOUNDS[i] {
            return i + 1;
        }
        i += 1;
    }
    NUM_CLASSES - 1
}
