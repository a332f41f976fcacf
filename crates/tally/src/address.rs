use std::{fmt, ptr::NonNull};

/// The address of a control block
///
/// Addresses identify blocks in lifecycle events and in [Shared::ptr_eq](crate::Shared::ptr_eq).
/// Only the numeric address is kept, an `Address` can't be turned back into a pointer.
///
/// Addresses are displayed in hex, padded to the width of a pointer:
///
/// ```
/// use tally::Address;
///
/// let address = Address::from(0x1f0 as *const u8);
/// assert_eq!(address.as_usize(), 0x1f0);
/// assert!(address.to_string().starts_with("0x0"));
/// assert!(address.to_string().ends_with("1f0"));
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(usize);

impl Address {
    /// Returns the address as a number
    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl<T: ?Sized> From<*const T> for Address {
    fn from(pointer: *const T) -> Self {
        Self(pointer.cast::<u8>().addr())
    }
}

impl<T: ?Sized> From<NonNull<T>> for Address {
    fn from(pointer: NonNull<T>) -> Self {
        Self::from(pointer.as_ptr().cast_const())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Two hex digits per byte, plus the 0x prefix
        let width = size_of::<usize>() * 2 + 2;
        write!(f, "{:#0width$x}", self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}
