//! Control blocks, the shared state behind a group of handles
//!
//! A control block always holds the reference count. There are two kinds of block:
//!
//! - [PlainBlock] holds a pointer to a value that was allocated separately, and is used when
//!   a handle adopts an existing allocation.
//! - [FusedBlock] embeds the value in the same allocation as the count, and is what the
//!   factory functions produce.
//!
//! The release path in the handle only needs to know about [BlockPtr], which dispatches
//! to the right [ControlBlock] implementation.

use crate::{
    Address,
    lifecycle::{LifecycleEvent, notify},
};
use std::{cell::Cell, fmt, mem, mem::MaybeUninit, process, ptr, ptr::NonNull};

/// The kind of control block that's managing a value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// The count is allocated separately from the value
    Plain,
    /// The count and the value share a single allocation
    Fused,
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Plain => "plain",
            Self::Fused => "fused",
        })
    }
}

/// The operations that the release path performs on a block
///
/// All functions taking `this` require that the block is live, i.e. it was created by one of the
/// block constructors and hasn't been passed to `deallocate`.
pub(crate) trait ControlBlock {
    /// The block's reference count
    fn count(&self) -> &Cell<usize>;

    /// Runs the managed value's destructor, leaving the block allocated
    ///
    /// # Safety
    ///
    /// Must be called at most once, after the count has dropped to zero.
    unsafe fn destroy_value(this: NonNull<Self>);

    /// Frees any separate storage for the value without running the value's destructor
    ///
    /// # Safety
    ///
    /// Must be called at most once, after the value has been moved out of the block,
    /// and instead of `destroy_value`.
    unsafe fn discard_value(this: NonNull<Self>);

    /// Frees the block's storage
    ///
    /// # Safety
    ///
    /// The count must be zero, and the value must have been destroyed or discarded.
    unsafe fn deallocate(this: NonNull<Self>);
}

/// A count cell for a value that lives in its own allocation
pub(crate) struct PlainBlock<T> {
    count: Cell<usize>,
    value: NonNull<T>,
}

impl<T> PlainBlock<T> {
    /// Allocates a block with a count of 1 that takes ownership of `value`
    ///
    /// # Safety
    ///
    /// `value` must have been produced by `Box::into_raw`, and must not be owned by anything else.
    pub(crate) unsafe fn create(value: NonNull<T>) -> NonNull<Self> {
        let block = NonNull::from(Box::leak(Box::new(Self {
            count: Cell::new(1),
            value,
        })));

        notify(|| LifecycleEvent::BlockAllocated {
            address: block.into(),
            kind: BlockKind::Plain,
        });
        notify(|| LifecycleEvent::ValueAdopted {
            address: block.into(),
        });

        block
    }
}

impl<T> ControlBlock for PlainBlock<T> {
    fn count(&self) -> &Cell<usize> {
        &self.count
    }

    unsafe fn destroy_value(this: NonNull<Self>) {
        // SAFETY: the block is live and owns the value's allocation
        let value = unsafe { this.as_ref().value };
        drop(unsafe { Box::from_raw(value.as_ptr()) });

        notify(|| LifecycleEvent::ValueDestroyed {
            address: this.into(),
        });
    }

    unsafe fn discard_value(this: NonNull<Self>) {
        // SAFETY: the value has been moved out, so only its allocation remains
        let value = unsafe { this.as_ref().value };
        drop(unsafe { Box::from_raw(value.as_ptr().cast::<MaybeUninit<T>>()) });
    }

    unsafe fn deallocate(this: NonNull<Self>) {
        drop(unsafe { Box::from_raw(this.as_ptr()) });

        notify(|| LifecycleEvent::BlockDeallocated {
            address: this.into(),
        });
    }
}

/// A count cell with the value stored alongside it
pub(crate) struct FusedBlock<T> {
    count: Cell<usize>,
    value: MaybeUninit<T>,
}

impl<T> FusedBlock<T> {
    /// Allocates a block and then constructs the value inside it
    ///
    /// If `construct` fails or panics, the block is freed before the failure propagates.
    pub(crate) fn create<E>(
        construct: impl FnOnce() -> Result<T, E>,
    ) -> Result<NonNull<Self>, E> {
        let block = NonNull::from(Box::leak(Box::new(Self {
            count: Cell::new(1),
            value: MaybeUninit::uninit(),
        })));

        notify(|| LifecycleEvent::BlockAllocated {
            address: block.into(),
            kind: BlockKind::Fused,
        });

        let guard = UnconstructedBlock(block);
        let value = construct()?;
        mem::forget(guard);

        // SAFETY: the block was allocated above and nothing else refers to it yet
        unsafe { Self::value_ptr(block).as_ptr().write(value) };

        notify(|| LifecycleEvent::ValueConstructed {
            address: block.into(),
        });

        Ok(block)
    }

    /// Returns a pointer to the embedded value
    ///
    /// # Safety
    ///
    /// The block must be live.
    pub(crate) unsafe fn value_ptr(this: NonNull<Self>) -> NonNull<T> {
        // SAFETY: projecting to a field of a live allocation can't produce a null pointer
        unsafe { NonNull::new_unchecked((&raw mut (*this.as_ptr()).value).cast::<T>()) }
    }
}

impl<T> ControlBlock for FusedBlock<T> {
    fn count(&self) -> &Cell<usize> {
        &self.count
    }

    unsafe fn destroy_value(this: NonNull<Self>) {
        // SAFETY: the value was initialized in `create` and is dropped exactly once
        unsafe { ptr::drop_in_place(Self::value_ptr(this).as_ptr()) };

        notify(|| LifecycleEvent::ValueDestroyed {
            address: this.into(),
        });
    }

    unsafe fn discard_value(_this: NonNull<Self>) {}

    unsafe fn deallocate(this: NonNull<Self>) {
        // The value is MaybeUninit, so dropping the box only frees the storage
        drop(unsafe { Box::from_raw(this.as_ptr()) });

        notify(|| LifecycleEvent::BlockDeallocated {
            address: this.into(),
        });
    }
}

// Frees a fused block whose value hasn't been constructed
struct UnconstructedBlock<T>(NonNull<FusedBlock<T>>);

impl<T> Drop for UnconstructedBlock<T> {
    fn drop(&mut self) {
        // SAFETY: the value was never written, and the block is only reachable from here
        unsafe { FusedBlock::deallocate(self.0) };
    }
}

/// A pointer to either kind of control block
pub(crate) enum BlockPtr<T> {
    Plain(NonNull<PlainBlock<T>>),
    Fused(NonNull<FusedBlock<T>>),
}

impl<T> Clone for BlockPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for BlockPtr<T> {}

impl<T> BlockPtr<T> {
    pub(crate) fn kind(self) -> BlockKind {
        match self {
            Self::Plain(_) => BlockKind::Plain,
            Self::Fused(_) => BlockKind::Fused,
        }
    }

    pub(crate) fn address(self) -> Address {
        match self {
            Self::Plain(block) => block.into(),
            Self::Fused(block) => block.into(),
        }
    }

    /// # Safety
    ///
    /// The block must be live.
    pub(crate) unsafe fn count(self) -> usize {
        unsafe { self.count_cell().get() }
    }

    /// Increments the count, returning the new value
    ///
    /// The process is aborted if the count would overflow.
    ///
    /// # Safety
    ///
    /// The block must be live.
    pub(crate) unsafe fn increment(self) -> usize {
        let cell = unsafe { self.count_cell() };
        let Some(count) = cell.get().checked_add(1) else {
            process::abort();
        };
        cell.set(count);
        count
    }

    /// Decrements the count, returning the new value
    ///
    /// # Safety
    ///
    /// The block must be live, and the caller must be giving up one of the block's references.
    pub(crate) unsafe fn decrement(self) -> usize {
        let cell = unsafe { self.count_cell() };
        let count = cell.get() - 1;
        cell.set(count);
        count
    }

    /// See [ControlBlock::destroy_value]
    pub(crate) unsafe fn destroy_value(self) {
        match self {
            Self::Plain(block) => unsafe { PlainBlock::destroy_value(block) },
            Self::Fused(block) => unsafe { FusedBlock::destroy_value(block) },
        }
    }

    /// See [ControlBlock::discard_value]
    pub(crate) unsafe fn discard_value(self) {
        match self {
            Self::Plain(block) => unsafe { PlainBlock::discard_value(block) },
            Self::Fused(block) => unsafe { FusedBlock::discard_value(block) },
        }
    }

    /// See [ControlBlock::deallocate]
    pub(crate) unsafe fn deallocate(self) {
        match self {
            Self::Plain(block) => unsafe { PlainBlock::deallocate(block) },
            Self::Fused(block) => unsafe { FusedBlock::deallocate(block) },
        }
    }

    unsafe fn count_cell<'a>(self) -> &'a Cell<usize>
    where
        T: 'a,
    {
        match self {
            Self::Plain(block) => unsafe { block.as_ref() }.count(),
            Self::Fused(block) => unsafe { block.as_ref() }.count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    // Counts drops through a shared cell
    struct DropCount(Rc<Cell<usize>>);

    impl Drop for DropCount {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn fused_block_starts_with_a_count_of_one() {
        let drops = Rc::new(Cell::new(0));
        let block = FusedBlock::create(|| Ok::<_, ()>(DropCount(drops.clone()))).unwrap();
        let block = BlockPtr::Fused(block);

        unsafe {
            assert_eq!(block.count(), 1);
            assert_eq!(block.increment(), 2);
            assert_eq!(block.decrement(), 1);
            assert_eq!(block.decrement(), 0);
            block.destroy_value();
            assert_eq!(drops.get(), 1);
            block.deallocate();
        }
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn failed_construction_returns_the_error() {
        let result = FusedBlock::<DropCount>::create(|| Err("no value"));
        assert!(matches!(result, Err("no value")));
    }

    #[test]
    fn plain_block_destroys_the_adopted_value() {
        let drops = Rc::new(Cell::new(0));
        let value = NonNull::from(Box::leak(Box::new(DropCount(drops.clone()))));
        let block = BlockPtr::Plain(unsafe { PlainBlock::create(value) });

        assert_eq!(block.kind(), BlockKind::Plain);
        unsafe {
            assert_eq!(block.count(), 1);
            assert_eq!(block.increment(), 2);
            assert_eq!(block.decrement(), 1);
            assert_eq!(block.decrement(), 0);
            block.destroy_value();
            block.deallocate();
        }
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn discarding_a_moved_value_skips_its_destructor() {
        let drops = Rc::new(Cell::new(0));
        let value = NonNull::from(Box::leak(Box::new(DropCount(drops.clone()))));
        let block = BlockPtr::Plain(unsafe { PlainBlock::create(value) });

        let moved = unsafe { ptr::read(value.as_ptr()) };
        unsafe {
            block.decrement();
            block.discard_value();
            block.deallocate();
        }
        assert_eq!(drops.get(), 0);

        drop(moved);
        assert_eq!(drops.get(), 1);
    }
}
