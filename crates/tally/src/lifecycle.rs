//! Lifecycle events reported by control blocks and handles
//!
//! Every block allocation, value construction or destruction, block deallocation, and handle
//! transition produces a [LifecycleEvent]. Events are delivered to the [LifecycleObserver] that's
//! currently installed on the calling thread, see [set_observer].
//!
//! Nothing is stored in the handle or the control block to support this, and with the
//! `lifecycle` feature disabled the notifications compile away entirely.

use crate::{Address, BlockKind};
use std::{cell::RefCell, fmt, rc::Rc};

/// How a handle came into existence
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandleOrigin {
    /// The handle was created empty
    Empty,
    /// The handle adopted an externally allocated value
    Adopted,
    /// The handle was made by the factory, with the value in a fused block
    Made,
}

impl fmt::Display for HandleOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Empty => "empty",
            Self::Adopted => "adopted",
            Self::Made => "made",
        })
    }
}

/// A transition in the life of a control block or a handle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum LifecycleEvent {
    /// A control block has been allocated with a count of 1
    BlockAllocated { address: Address, kind: BlockKind },
    /// A value has been constructed inside a fused block
    ValueConstructed { address: Address },
    /// A plain block has taken ownership of an externally allocated value
    ValueAdopted { address: Address },
    /// The managed value's destructor has run
    ValueDestroyed { address: Address },
    /// The managed value has been moved out of its block by the last handle
    ValueMovedOut { address: Address },
    /// The control block's storage has been freed
    BlockDeallocated { address: Address },
    /// A new handle has been created
    HandleCreated { origin: HandleOrigin },
    /// A handle has been cloned, `count` is the block's count after the increment
    HandleCloned {
        address: Option<Address>,
        count: usize,
    },
    /// A handle has been assigned from another handle, `address` is the adopted block
    HandleAssigned { address: Option<Address> },
    /// A handle has let go of its block, `count` is the block's count after the decrement
    HandleReleased { address: Address, count: usize },
}

impl LifecycleEvent {
    /// Returns the address of the control block involved in the event, if there is one
    pub fn address(&self) -> Option<Address> {
        use LifecycleEvent::*;

        match self {
            BlockAllocated { address, .. }
            | ValueConstructed { address }
            | ValueAdopted { address }
            | ValueDestroyed { address }
            | ValueMovedOut { address }
            | BlockDeallocated { address }
            | HandleReleased { address, .. } => Some(*address),
            HandleCloned { address, .. } | HandleAssigned { address } => *address,
            HandleCreated { .. } => None,
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use LifecycleEvent::*;

        match self {
            BlockAllocated { address, kind } => {
                write!(f, "control block allocated ({kind}) at {address}")
            }
            ValueConstructed { address } => write!(f, "value constructed in block {address}"),
            ValueAdopted { address } => write!(f, "value adopted by block {address}"),
            ValueDestroyed { address } => write!(f, "value destroyed in block {address}"),
            ValueMovedOut { address } => write!(f, "value moved out of block {address}"),
            BlockDeallocated { address } => write!(f, "control block {address} deallocated"),
            HandleCreated { origin } => write!(f, "handle created ({origin})"),
            HandleCloned {
                address: Some(address),
                count,
            } => write!(f, "handle cloned, block {address} count = {count}"),
            HandleCloned { address: None, .. } => write!(f, "empty handle cloned"),
            HandleAssigned {
                address: Some(address),
            } => write!(f, "handle assigned to block {address}"),
            HandleAssigned { address: None } => write!(f, "handle assigned from an empty handle"),
            HandleReleased { address, count } => {
                write!(f, "handle released, block {address} count = {count}")
            }
        }
    }
}

/// A receiver of lifecycle events
///
/// Observers are called synchronously from inside handle and block operations, so an observer
/// must not panic, and shouldn't create or drop handles itself.
pub trait LifecycleObserver {
    /// Called once for each event
    fn on_event(&self, event: &LifecycleEvent);
}

thread_local! {
    static OBSERVER: RefCell<Option<Rc<dyn LifecycleObserver>>> = const { RefCell::new(None) };
}

/// Installs an observer for the current thread
///
/// The returned guard restores the previously installed observer when dropped. Guards should be
/// dropped in the reverse order of their creation.
pub fn set_observer(observer: impl LifecycleObserver + 'static) -> ObserverGuard {
    let observer: Rc<dyn LifecycleObserver> = Rc::new(observer);
    let previous = OBSERVER.with(|current| current.replace(Some(observer)));
    ObserverGuard { previous }
}

/// Restores the previous observer when dropped, see [set_observer]
#[must_use = "the observer is removed when the guard is dropped"]
pub struct ObserverGuard {
    previous: Option<Rc<dyn LifecycleObserver>>,
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        // The thread-local may already be gone during thread teardown
        let _ = OBSERVER.try_with(|current| current.replace(previous));
    }
}

#[cfg(feature = "lifecycle")]
#[inline]
pub(crate) fn notify(event: impl FnOnce() -> LifecycleEvent) {
    let observer = OBSERVER
        .try_with(|current| current.borrow().clone())
        .ok()
        .flatten();

    if let Some(observer) = observer {
        observer.on_event(&event());
    }
}

#[cfg(not(feature = "lifecycle"))]
#[inline(always)]
pub(crate) fn notify(_event: impl FnOnce() -> LifecycleEvent) {}

#[cfg(all(test, not(feature = "lifecycle")))]
mod disabled_tests {
    use super::*;

    struct Unreachable;

    impl LifecycleObserver for Unreachable {
        fn on_event(&self, event: &LifecycleEvent) {
            unreachable!("unexpected event: {event}");
        }
    }

    #[test]
    fn notify_does_nothing() {
        let _guard = set_observer(Unreachable);

        notify(|| unreachable!("events aren't built"));
        drop(crate::make_shared(1));
    }
}
