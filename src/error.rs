//! Debug-only heap invariant diagnostics.
//!
//! A heap checker that collapses many independent checks into one boolean
//! by overwriting a single result variable hides which check actually
//! failed. This one treats every global heap invariant as independent and
//! reports every failure it finds, instead of stopping at (or hiding
//! behind) the first.
//!
//! No `anyhow`/`thiserror` here deliberately: a memory allocator's own
//! error-reporting path must not itself need to allocate, so this is a
//! plain `Copy` enum with a hand-written `Display`.

use crate::address::Address;
use std::fmt;

/// Which sentinel (prologue or epilogue) an invariant failure concerns.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Sentinel {
    Prologue,
    Epilogue,
}

/// One independently-detected violation of a global heap invariant.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CheckFailure {
    /// A block's size fell below the 16-byte minimum.
    BlockTooSmall { at: Address, size: usize },
    /// A block's size was not a multiple of 16.
    BlockMisaligned { at: Address, size: usize },
    /// A block address fell outside the broker-reported heap bounds.
    OutOfBounds { at: Address },
    /// Two adjacent blocks were both free; coalescing should have merged
    /// them into one.
    AdjacentFreeBlocks { first: Address, second: Address },
    /// A free block's footer did not match its header.
    FooterMismatch { at: Address },
    /// A block's `prev_alloc` bit disagreed with its predecessor's actual
    /// allocation status.
    PrevAllocMismatch { at: Address, expected: bool, found: bool },
    /// A block's `prev_mini` bit disagreed with whether its predecessor is
    /// actually a mini block.
    PrevMiniMismatch { at: Address, expected: bool, found: bool },
    /// A block reachable from free-list class `list`'s head did not
    /// belong in that class, or was marked allocated.
    ListMembershipInvalid { at: Address, list: usize },
    /// A doubly-linked list's prev/next pointers disagreed, or a cycle
    /// was detected.
    BrokenListLinkage { at: Address },
    /// A list head or list-node pointer fell outside the heap.
    DanglingListLink { at: Address },
    /// The prologue or epilogue sentinel is missing, has a nonzero size,
    /// or is not marked allocated.
    MissingSentinel { which: Sentinel },
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlockTooSmall { at, size } => {
                write!(f, "block at {at:?} has size {size}, below the 16-byte minimum")
            }
            Self::BlockMisaligned { at, size } => {
                write!(f, "block at {at:?} has size {size}, not a multiple of 16")
            }
            Self::OutOfBounds { at } => write!(f, "block at {at:?} lies outside the heap bounds"),
            Self::AdjacentFreeBlocks { first, second } => {
                write!(f, "adjacent free blocks at {first:?} and {second:?} were not coalesced")
            }
            Self::FooterMismatch { at } => write!(f, "free block at {at:?} has a footer that does not match its header"),
            Self::PrevAllocMismatch { at, expected, found } => write!(
                f,
                "block at {at:?} has prev_alloc={found}, but its predecessor's allocated status is {expected}"
            ),
            Self::PrevMiniMismatch { at, expected, found } => write!(
                f,
                "block at {at:?} has prev_mini={found}, but its predecessor being mini is {expected}"
            ),
            Self::ListMembershipInvalid { at, list } => {
                write!(f, "block at {at:?} is reachable from free-list class {list}, but does not belong there")
            }
            Self::BrokenListLinkage { at } => write!(f, "free list has inconsistent or cyclic linkage at {at:?}"),
            Self::DanglingListLink { at } => write!(f, "free-list pointer {at:?} lies outside the heap"),
            Self::MissingSentinel { which } => write!(f, "{which:?} sentinel is missing or malformed"),
        }
    }
}
