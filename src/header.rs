//! Header codec: packs and unpacks the 64-bit header/footer word.
//!
//! Layout (low to high bit):
//!
//! ```text
//! bit 0      allocated
//! bit 1      previous block allocated
//! bit 2      previous block is a mini block
//! bit 3      reserved, always 0
//! bits 4..63 block size in bytes (always a 16-byte multiple)
//! ```
//!
//! Stealing the low 4 bits is legal because [`ALIGNMENT`](crate::config::ALIGNMENT)
//! is 16: every real size has its low 4 bits clear anyway.

use crate::address::Address;
use crate::config::MINI_BLOCK_SIZE;

const ALLOC_BIT: u64 = 1 << 0;
const PREV_ALLOC_BIT: u64 = 1 << 1;
const PREV_MINI_BIT: u64 = 1 << 2;
const SIZE_MASK: u64 = !0xF;

/// Packs a header word. Total and deterministic: any 16-byte-multiple size
/// and any combination of the three status bits produces a valid word.
pub const fn pack(size: usize, alloc: bool, prev_alloc: bool, prev_mini: bool) -> u64 {
    debug_assert!(size & 0xF == 0, "block size must be a 16-byte multiple");
    let mut word = size as u64;
    if alloc {
        word |= ALLOC_BIT;
    }
    if prev_alloc {
        word |= PREV_ALLOC_BIT;
    }
    if prev_mini {
        word |= PREV_MINI_BIT;
    }
    word
}

pub const fn size_of(word: u64) -> usize {
    (word & SIZE_MASK) as usize
}

pub const fn is_alloc(word: u64) -> bool {
    word & ALLOC_BIT != 0
}

pub const fn is_prev_alloc(word: u64) -> bool {
    word & PREV_ALLOC_BIT != 0
}

pub const fn is_prev_mini(word: u64) -> bool {
    word & PREV_MINI_BIT != 0
}

/// Reads the raw word at `addr`.
///
/// # Safety
/// `addr` must be a valid, readable, 8-byte-aligned heap address.
pub unsafe fn read_word(addr: Address) -> u64 {
    unsafe { addr.as_ptr::<u64>().read() }
}

/// Writes a raw word at `addr`.
///
/// # Safety
/// `addr` must be a valid, writable, 8-byte-aligned heap address.
pub unsafe fn write_word(addr: Address, word: u64) {
    unsafe { addr.as_ptr::<u64>().write(word) }
}

/// Writes a complete block: always the header, and (iff the block is free
/// and larger than a mini block) a matching footer at `addr + size - WORD`.
///
/// Mini free blocks and every allocated block carry no footer. The footer
/// exists solely so a successor can find this block's size when scanning
/// backwards, and a mini block's successor can always find it via the
/// `prev_mini` bit instead (see `block::BlockRef::prev`).
///
/// # Safety
/// `addr` must be a valid heap address with at least `size` writable
/// bytes following it.
pub unsafe fn write_block(addr: Address, size: usize, alloc: bool, prev_alloc: bool, prev_mini: bool) {
    let word = pack(size, alloc, prev_alloc, prev_mini);
    unsafe { write_word(addr, word) };
    if !alloc && size > MINI_BLOCK_SIZE {
        let footer = addr.add(size - crate::config::WORD_SIZE);
        unsafe { write_word(footer, word) };
    }
}

/// Rewrites only the `prev_alloc`/`prev_mini` bits of the header at
/// `addr`, leaving its size and own allocation status untouched. Used
/// when a neighboring block's status changes without this block itself
/// moving, splitting, or changing allocation state.
///
/// Every call site only ever targets a block with no footer (an allocated
/// block: coalescing guarantees no two adjacent blocks are ever both
/// free), so the footer is never touched here.
///
/// # Safety
/// `addr` must be a valid, readable and writable heap header address.
pub unsafe fn update_block(addr: Address, prev_alloc: bool, prev_mini: bool) {
    let word = unsafe { read_word(addr) };
    let size = size_of(word);
    let alloc = is_alloc(word);
    unsafe { write_word(addr, pack(size, alloc, prev_alloc, prev_mini)) };
}
