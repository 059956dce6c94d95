//! Opaque native handle addresses.

/// An opaque, pointer-sized address of a native resource.
///
/// The registry never dereferences or interprets a handle; it only stores the
/// address and hands it back. Zero is the null handle.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeHandle(usize);

impl NativeHandle {
    /// The null handle. Never recorded.
    pub const NULL: NativeHandle = NativeHandle(0);

    pub const fn from_addr(addr: usize) -> Self {
        Self(addr)
    }

    pub const fn addr(self) -> usize {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl From<usize> for NativeHandle {
    fn from(addr: usize) -> Self {
        Self(addr)
    }
}

impl<T> From<*mut T> for NativeHandle {
    fn from(ptr: *mut T) -> Self {
        Self(ptr as usize)
    }
}

impl<T> From<*const T> for NativeHandle {
    fn from(ptr: *const T) -> Self {
        Self(ptr as usize)
    }
}

impl std::fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
