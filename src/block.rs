//! The block navigator: `BlockRef` is a `Copy` handle to a block's header
//! address. The header itself is a packed word (see `header.rs`), and
//! `BlockRef` is the only thing allowed to turn a bare `Address` into
//! header reads, writes, and forward/backward navigation.

use crate::address::Address;
use crate::config::{MINI_BLOCK_SIZE, WORD_SIZE};
use crate::header;

/// A handle to one block's header address. Two `BlockRef`s are equal iff
/// they name the same header address; `BlockRef` carries no borrow and no
/// lifetime, since blocks on the heap are aliased heap addresses, not
/// Rust references.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BlockRef(Address);

impl BlockRef {
    /// Wraps the header address `addr` as a block handle. Does not read
    /// memory; the caller vouches that a valid header word lives there.
    pub fn at(addr: Address) -> Self {
        Self(addr)
    }

    pub fn header_addr(self) -> Address {
        self.0
    }

    /// The address one word past the header, where the payload (or, for a
    /// free block, the free-list link(s)) begins.
    pub fn payload_addr(self) -> Address {
        self.0.add(WORD_SIZE)
    }

    /// Recovers the owning block from a payload pointer previously handed
    /// to a caller.
    pub fn from_payload(payload: Address) -> Self {
        Self(payload.sub(WORD_SIZE))
    }

    /// # Safety
    /// The header word at this block's address must be valid and readable.
    pub unsafe fn size(self) -> usize {
        header::size_of(unsafe { header::read_word(self.0) })
    }

    /// # Safety
    /// The header word at this block's address must be valid and readable.
    pub unsafe fn is_alloc(self) -> bool {
        header::is_alloc(unsafe { header::read_word(self.0) })
    }

    /// # Safety
    /// The header word at this block's address must be valid and readable.
    pub unsafe fn is_prev_alloc(self) -> bool {
        header::is_prev_alloc(unsafe { header::read_word(self.0) })
    }

    /// # Safety
    /// The header word at this block's address must be valid and readable.
    pub unsafe fn is_prev_mini(self) -> bool {
        header::is_prev_mini(unsafe { header::read_word(self.0) })
    }

    /// # Safety
    /// The header word at this block's address must be valid and readable.
    pub unsafe fn is_mini(self) -> bool {
        unsafe { self.size() == MINI_BLOCK_SIZE }
    }

    /// Writes a full header (and footer, if free and larger than mini).
    ///
    /// # Safety
    /// This block must have at least `size` valid, writable heap bytes
    /// starting at its header address.
    pub unsafe fn write(self, size: usize, alloc: bool, prev_alloc: bool, prev_mini: bool) {
        unsafe { header::write_block(self.0, size, alloc, prev_alloc, prev_mini) };
    }

    /// Rewrites only the prev_alloc/prev_mini bits, leaving size and this
    /// block's own allocation status untouched.
    ///
    /// # Safety
    /// The header word at this block's address must be valid, readable,
    /// and writable.
    pub unsafe fn update(self, prev_alloc: bool, prev_mini: bool) {
        unsafe { header::update_block(self.0, prev_alloc, prev_mini) };
    }

    /// The next block in address order: `self`'s address plus `self`'s
    /// size. Valid for any real block; applied to the last real block
    /// this yields the epilogue.
    ///
    /// # Safety
    /// The header word at this block's address must be valid and readable,
    /// and the resulting address must itself be a valid header.
    pub unsafe fn next(self) -> BlockRef {
        let size = unsafe { self.size() };
        BlockRef(self.0.add(size))
    }

    /// The previous block in address order, or `None` if `self` is the
    /// first real block (its predecessor is the prologue).
    ///
    /// If `self`'s `prev_mini` bit is set, the predecessor is exactly one
    /// mini block (16 bytes) before `self`. Mini blocks carry no footer,
    /// so the generic footer-based scan below would read garbage for them.
    /// Otherwise, the word immediately before `self`'s header is the
    /// predecessor's footer; a footer size of 0 means that "predecessor"
    /// is actually the prologue sentinel.
    ///
    /// # Safety
    /// The header word at this block's address, and (if not prev-mini)
    /// the word immediately preceding it, must be valid and readable.
    pub unsafe fn prev(self) -> Option<BlockRef> {
        if unsafe { self.is_prev_mini() } {
            return Some(BlockRef(self.0.sub(MINI_BLOCK_SIZE)));
        }
        let footer_addr = self.0.sub(WORD_SIZE);
        let footer_word = unsafe { header::read_word(footer_addr) };
        let prev_size = header::size_of(footer_word);
        if prev_size == 0 {
            None
        } else {
            Some(BlockRef(self.0.sub(prev_size)))
        }
    }

    // -- Free-list link accessors --------------------------------------
    //
    // These interpret the payload area as one of two link layouts
    // depending on which list the block belongs to. Callers outside
    // `free_list.rs`/`coalesce.rs` should never need these directly.
    // The mini list is never walked with the normal accessors below:
    // `free_list`'s dispatcher always checks `is_mini()` first and only
    // ever calls `mini_next`/`set_mini_next` on a mini block.

    /// # Safety
    /// `self` must be a free mini block.
    pub unsafe fn mini_next(self) -> Option<Address> {
        let raw = unsafe { header::read_word(self.payload_addr()) };
        Address::from_ptr(raw as *mut u8)
    }

    /// # Safety
    /// `self` must be a free mini block.
    pub unsafe fn set_mini_next(self, next: Option<Address>) {
        let raw = next.map_or(0, Address::as_usize) as u64;
        unsafe { header::write_word(self.payload_addr(), raw) };
    }

    /// # Safety
    /// `self` must be a free normal (non-mini) block.
    pub unsafe fn normal_prev(self) -> Option<Address> {
        let raw = unsafe { header::read_word(self.payload_addr()) };
        Address::from_ptr(raw as *mut u8)
    }

    /// # Safety
    /// `self` must be a free normal (non-mini) block.
    pub unsafe fn set_normal_prev(self, prev: Option<Address>) {
        let raw = prev.map_or(0, Address::as_usize) as u64;
        unsafe { header::write_word(self.payload_addr(), raw) };
    }

    /// # Safety
    /// `self` must be a free normal (non-mini) block.
    pub unsafe fn normal_next(self) -> Option<Address> {
        let raw = unsafe { header::read_word(self.payload_addr().add(WORD_SIZE)) };
        Address::from_ptr(raw as *mut u8)
    }

    /// # Safety
    /// `self` must be a free normal (non-mini) block.
    pub unsafe fn set_normal_next(self, next: Option<Address>) {
        let raw = next.map_or(0, Address::as_usize) as u64;
        unsafe { header::write_word(self.payload_addr().add(WORD_SIZE), raw) };
    }
}
