use core::fmt;

/// The address of an allocation's payload.
///
/// A handle is a plain address-sized value: it can be stored in fixed-layout
/// structures and compared, but it carries no borrow of the arena. Turning it
/// back into memory goes through the owning [`Arena`](crate::Arena), which
/// validates it first.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Handle(usize);

impl Handle {
    /// The empty handle, returned for zero-sized requests and accepted as a
    /// no-op by deallocation.
    pub const NULL: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn from_addr(addr: usize) -> Self {
        Self(addr)
    }

    #[inline]
    #[must_use]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr.addr())
    }

    #[inline]
    #[must_use]
    pub const fn addr(self) -> usize {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Whether the address is a multiple of `align` (a power of two).
    #[inline]
    #[must_use]
    pub const fn is_aligned_to(self, align: usize) -> bool {
        self.0 & (align - 1) == 0
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle(0x{:016X})", self.0)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl From<Handle> for usize {
    #[inline]
    fn from(h: Handle) -> Self {
        h.addr()
    }
}
