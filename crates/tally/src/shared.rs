use crate::{
    Address, BlockKind, Error, Result,
    block::{BlockPtr, FusedBlock, PlainBlock},
    factory::make_shared,
    lifecycle::{HandleOrigin, LifecycleEvent, notify},
};
use std::{
    borrow::Borrow,
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
    ops::Deref,
    ptr::{self, NonNull},
};

/// A shared-ownership pointer to a value in allocated memory
///
/// Cloning a `Shared` increments the count in its control block, and dropping one decrements it.
/// The value is destroyed, and the control block freed, when the last handle lets go.
///
/// A handle may also be empty, see [Shared::empty]. Dereferencing an empty handle panics,
/// [Shared::get] and [Shared::try_get] are the non-panicking alternatives.
///
/// Like `Rc`, the pointer's functions are associated functions rather than methods,
/// so that they don't shadow methods on the value.
///
/// # Threading
///
/// The count isn't atomic, so a `Shared` can't be sent to or shared with another thread:
///
/// ```compile_fail
/// fn assert_send<T: Send>() {}
///
/// assert_send::<tally::Shared<i32>>();
/// ```
pub struct Shared<T> {
    inner: Option<Owned<T>>,
    _value: PhantomData<T>,
}

// The access pointer and the block that it belongs to
struct Owned<T> {
    value: NonNull<T>,
    block: BlockPtr<T>,
}

impl<T> Clone for Owned<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Owned<T> {}

impl<T> Shared<T> {
    /// Makes a new handle with the value in a fused control block
    ///
    /// See [make_shared].
    pub fn new(value: T) -> Self {
        make_shared(value)
    }

    /// Makes a handle that doesn't refer to any value
    pub fn empty() -> Self {
        notify(|| LifecycleEvent::HandleCreated {
            origin: HandleOrigin::Empty,
        });

        Self::from_inner(None)
    }

    /// Takes ownership of a value that was allocated with `Box`
    ///
    /// A separate control block gets allocated for the count. If `value` is null then an empty
    /// handle is returned.
    ///
    /// # Safety
    ///
    /// `value` must be null or must have come from [Box::into_raw], and mustn't be owned by
    /// anything else. In particular, passing the same pointer to `from_raw` twice produces two
    /// independent counts, and the value will be destroyed twice.
    pub unsafe fn from_raw(value: *mut T) -> Self {
        match NonNull::new(value) {
            Some(value) => {
                // SAFETY: the caller guarantees that the value is a Box allocation that we now own
                let block = unsafe { PlainBlock::create(value) };

                notify(|| LifecycleEvent::HandleCreated {
                    origin: HandleOrigin::Adopted,
                });

                Self::from_inner(Some(Owned {
                    value,
                    block: BlockPtr::Plain(block),
                }))
            }
            None => Self::empty(),
        }
    }

    /// Takes ownership of a boxed value, keeping the value in its existing allocation
    ///
    /// A separate control block gets allocated for the count, see [Shared::from_raw].
    ///
    /// Prefer this over `Shared::from(boxed)`, where inference can pick the `From<T>` impl and
    /// produce a `Shared<Box<T>>` in a fused block.
    ///
    /// ```
    /// use tally::{BlockKind, Shared};
    ///
    /// let h = Shared::from_box(Box::new(42));
    /// assert_eq!(*h, 42);
    /// assert_eq!(Shared::block_kind(&h), Some(BlockKind::Plain));
    /// ```
    pub fn from_box(boxed: Box<T>) -> Self {
        // SAFETY: the pointer comes straight from the box
        unsafe { Self::from_raw(Box::into_raw(boxed)) }
    }

    pub(crate) fn from_fused(block: NonNull<FusedBlock<T>>) -> Self {
        // SAFETY: the block has just been made and its value is initialized
        let value = unsafe { FusedBlock::value_ptr(block) };

        notify(|| LifecycleEvent::HandleCreated {
            origin: HandleOrigin::Made,
        });

        Self::from_inner(Some(Owned {
            value,
            block: BlockPtr::Fused(block),
        }))
    }

    fn from_inner(inner: Option<Owned<T>>) -> Self {
        Self {
            inner,
            _value: PhantomData,
        }
    }

    /// Returns a reference to the value, or None if the handle is empty
    pub fn get(this: &Self) -> Option<&T> {
        // SAFETY: the handle keeps the block, and so the value, alive
        this.inner.as_ref().map(|owned| unsafe { owned.value.as_ref() })
    }

    /// Returns a reference to the value, or an error if the handle is empty
    pub fn try_get(this: &Self) -> Result<&T> {
        Self::get(this).ok_or(Error::Empty)
    }

    /// Returns a mutable reference to the value if this is the only handle referring to it
    pub fn get_mut(this: &mut Self) -> Option<&mut T> {
        Self::try_get_mut(this).ok()
    }

    /// Returns a mutable reference to the value if this is the only handle referring to it
    ///
    /// An error is returned if the handle is empty, or if the value is shared.
    pub fn try_get_mut(this: &mut Self) -> Result<&mut T> {
        let count = Self::use_count(this);

        match this.inner.as_mut() {
            None => Err(Error::Empty),
            Some(_) if count > 1 => Err(Error::NotUnique { count }),
            // SAFETY: no other handle refers to the value, and `this` is borrowed mutably
            Some(owned) => Ok(unsafe { owned.value.as_mut() }),
        }
    }

    /// Returns a raw pointer to the value, null if the handle is empty
    ///
    /// The pointer dangles once the last handle referring to the value has been dropped.
    pub fn as_ptr(this: &Self) -> *const T {
        this.inner
            .as_ref()
            .map_or(ptr::null(), |owned| owned.value.as_ptr().cast_const())
    }

    /// Returns the number of handles that share the value, 0 if the handle is empty
    pub fn use_count(this: &Self) -> usize {
        // SAFETY: the handle keeps the block alive
        this.inner
            .as_ref()
            .map_or(0, |owned| unsafe { owned.block.count() })
    }

    /// Returns true if this is the only handle referring to the value
    pub fn is_unique(this: &Self) -> bool {
        Self::use_count(this) == 1
    }

    /// Returns true if the handle refers to a value
    pub fn is_some(this: &Self) -> bool {
        this.inner.is_some()
    }

    /// Returns true if the handle doesn't refer to a value
    pub fn is_empty(this: &Self) -> bool {
        this.inner.is_none()
    }

    /// Returns true if the two handles share a control block, or if both are empty
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Self::address(this) == Self::address(other)
    }

    /// Returns the address of the handle's control block
    pub fn address(this: &Self) -> Option<Address> {
        this.inner.as_ref().map(|owned| owned.block.address())
    }

    /// Returns the kind of control block that's managing the value
    pub fn block_kind(this: &Self) -> Option<BlockKind> {
        this.inner.as_ref().map(|owned| owned.block.kind())
    }

    /// Copies the state of `source` into `this`, releasing the value that `this` referred to
    ///
    /// Assigning between handles that already share a control block has no effect.
    pub fn assign(this: &mut Self, source: &Self) {
        this.clone_from(source)
    }

    /// Releases the handle's value, leaving the handle empty
    pub fn reset(this: &mut Self) {
        this.release();
    }

    /// Moves the handle's state into a new handle, leaving `this` empty
    ///
    /// The count is unchanged.
    pub fn take(this: &mut Self) -> Self {
        Self::from_inner(this.inner.take())
    }

    /// Moves the value out if this is the only handle referring to it
    ///
    /// The control block is freed, without the value's destructor being run.
    /// If the value is shared, or if the handle is empty, then the handle is returned unchanged.
    pub fn try_unwrap(mut this: Self) -> std::result::Result<T, Self> {
        if !Self::is_unique(&this) {
            return Err(this);
        }

        let Some(owned) = this.inner.take() else {
            return Err(this);
        };

        // SAFETY: this was the only handle, so the value can be read out and the block freed
        unsafe {
            let value = ptr::read(owned.value.as_ptr());
            let count = owned.block.decrement();
            notify(|| LifecycleEvent::HandleReleased {
                address: owned.block.address(),
                count,
            });
            owned.block.discard_value();
            notify(|| LifecycleEvent::ValueMovedOut {
                address: owned.block.address(),
            });
            owned.block.deallocate();
            Ok(value)
        }
    }

    // Gives up this handle's reference, destroying the value if it was the last one.
    // The handle is empty before the value's destructor runs.
    fn release(&mut self) {
        let Some(owned) = self.inner.take() else {
            return;
        };

        // SAFETY: the handle was holding a reference, so the block is still live
        let count = unsafe { owned.block.decrement() };

        notify(|| LifecycleEvent::HandleReleased {
            address: owned.block.address(),
            count,
        });

        if count == 0 {
            // SAFETY: the count reached zero, so no other handle refers to the block
            unsafe {
                owned.block.destroy_value();
                owned.block.deallocate();
            }
        }
    }

    // Adds a reference to the block for a new co-owner, returning the new count
    fn acquire(&self) -> Option<usize> {
        // SAFETY: the handle keeps the block alive
        self.inner
            .as_ref()
            .map(|owned| unsafe { owned.block.increment() })
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        let count = self.acquire();

        notify(|| LifecycleEvent::HandleCloned {
            address: Self::address(self),
            count: count.unwrap_or(0),
        });

        Self::from_inner(self.inner)
    }

    fn clone_from(&mut self, source: &Self) {
        if !Self::ptr_eq(self, source) {
            // The incoming reference is taken before the old one is released,
            // the old value's destructor can then safely drop other handles.
            source.acquire();
            self.release();
            self.inner = source.inner;
        }

        notify(|| LifecycleEvent::HandleAssigned {
            address: Self::address(self),
        });
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T> Default for Shared<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Deref for Shared<T> {
    type Target = T;

    /// Returns a reference to the value
    ///
    /// # Panics
    ///
    /// Panics if the handle is empty.
    fn deref(&self) -> &T {
        match Self::get(self) {
            Some(value) => value,
            None => panic!("attempted to dereference an empty Shared handle"),
        }
    }
}

impl<T> AsRef<T> for Shared<T> {
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T> From<T> for Shared<T> {
    fn from(value: T) -> Self {
        make_shared(value)
    }
}

impl<T> From<Box<T>> for Shared<T> {
    fn from(boxed: Box<T>) -> Self {
        Self::from_box(boxed)
    }
}

impl<T> Borrow<T> for Shared<T> {
    fn borrow(&self) -> &T {
        self
    }
}

impl<T: fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Self::get(self) {
            Some(value) => f
                .debug_struct("Shared")
                .field("value", value)
                .field("use_count", &Self::use_count(self))
                .finish(),
            None => f.write_str("Shared(empty)"),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Self::get(self) {
            Some(value) => value.fmt(f),
            None => f.write_str("empty"),
        }
    }
}

impl<T: PartialEq> PartialEq for Shared<T> {
    fn eq(&self, other: &Self) -> bool {
        Self::get(self) == Self::get(other)
    }
}

impl<T: Eq> Eq for Shared<T> {}

// Hashes the same as the value, so that lookups through `Borrow<T>` work
impl<T: Hash> Hash for Shared<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if let Some(value) = Self::get(self) {
            value.hash(state)
        }
    }
}

impl<T: PartialOrd> PartialOrd for Shared<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Self::get(self).partial_cmp(&Self::get(other))
    }
}

impl<T: Ord> Ord for Shared<T> {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        Self::get(self).cmp(&Self::get(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::Cell, rc::Rc};

    #[derive(Debug)]
    struct Car {
        value: i32,
        drops: Rc<Cell<usize>>,
    }

    impl Drop for Car {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    fn car(value: i32) -> (Shared<Car>, Rc<Cell<usize>>) {
        let drops = Rc::new(Cell::new(0));
        let shared = make_shared(Car {
            value,
            drops: drops.clone(),
        });
        (shared, drops)
    }

    #[test]
    fn empty_handle() {
        let h = Shared::<Car>::default();

        assert!(!Shared::is_some(&h));
        assert!(Shared::as_ptr(&h).is_null());
        assert_eq!(Shared::use_count(&h), 0);
        assert!(!Shared::is_unique(&h));
    }

    #[test]
    fn clone_and_drop() {
        let (h1, drops) = car(50);
        assert_eq!(h1.value, 50);
        assert!(Shared::is_unique(&h1));

        let h2 = h1.clone();
        assert_eq!(Shared::use_count(&h1), 2);
        assert_eq!(Shared::as_ptr(&h1), Shared::as_ptr(&h2));

        drop(h1);
        assert_eq!(Shared::use_count(&h2), 1);
        assert_eq!(drops.get(), 0);

        drop(h2);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn assignment_between_co_owners_is_a_no_op() {
        let (mut h1, drops) = car(1);
        let h2 = h1.clone();
        let before = Shared::as_ptr(&h1);

        h1.clone_from(&h2);

        assert_eq!(Shared::use_count(&h1), 2);
        assert_eq!(Shared::as_ptr(&h1), before);
        assert_eq!(drops.get(), 0);
    }

    #[test]
    fn reset_leaves_the_handle_empty() {
        let (mut h, drops) = car(3);
        Shared::reset(&mut h);

        assert!(Shared::is_empty(&h));
        assert_eq!(drops.get(), 1);

        Shared::reset(&mut h);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn deref_of_an_empty_handle_panics() {
        let result = std::panic::catch_unwind(|| {
            let h = Shared::<i32>::empty();
            *h
        });
        assert!(result.is_err());
    }
}
