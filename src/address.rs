//! A typed heap address: a small `Copy` wrapper around a raw byte offset,
//! so pointer-to-integer arithmetic stays behind a named abstraction
//! instead of scattering `as usize`/`as *mut _` casts through the
//! allocator modules.

use std::fmt;
use std::num::NonZeroUsize;

/// A non-null byte address somewhere on the managed heap.
///
/// Deliberately not a pointer with a lifetime: blocks alias freely (a free
/// block's prev/next links are just other blocks' header addresses), which
/// safe Rust references cannot express. `Address` models that as a plain
/// offset instead.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(NonZeroUsize);

impl Address {
    /// Wraps a raw pointer, returning `None` for a null pointer.
    pub fn from_ptr<T>(ptr: *mut T) -> Option<Self> {
        NonZeroUsize::new(ptr as usize).map(Address)
    }

    /// Returns this address as a raw pointer of the requested type.
    pub fn as_ptr<T>(self) -> *mut T {
        self.0.get() as *mut T
    }

    /// Returns this address as a plain integer.
    pub fn as_usize(self) -> usize {
        self.0.get()
    }

    /// Returns the address `bytes` further along the heap.
    pub fn add(self, bytes: usize) -> Address {
        Address(NonZeroUsize::new(self.0.get() + bytes).expect("address overflow"))
    }

    /// Returns the address `bytes` earlier on the heap.
    pub fn sub(self, bytes: usize) -> Address {
        Address(NonZeroUsize::new(self.0.get() - bytes).expect("address underflow"))
    }

    /// True iff this address lies within `[lo, hi]` inclusive.
    pub fn within(self, lo: Address, hi: Address) -> bool {
        self.0.get() >= lo.0.get() && self.0.get() <= hi.0.get()
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0.get())
    }
}
