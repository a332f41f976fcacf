use std::{
    cell::{Ref, RefCell},
    rc::Rc,
};
use tally::lifecycle::{LifecycleEvent, LifecycleObserver, ObserverGuard, set_observer};

/// Captures lifecycle events in a list
///
/// [LifecycleObserver] is implemented for EventCapture, allowing it to be installed as the
/// current thread's observer.
#[derive(Clone, Debug, Default)]
pub struct EventCapture {
    events: Rc<RefCell<Vec<LifecycleEvent>>>,
}

impl EventCapture {
    /// Installs an EventCapture as the current thread's observer
    ///
    /// Events are captured until the returned guard is dropped.
    pub fn install() -> (Self, ObserverGuard) {
        let capture = Self::default();
        let guard = set_observer(capture.clone());
        (capture, guard)
    }

    /// Clears the captured events
    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    /// Returns the events that have been captured so far
    pub fn events(&self) -> Ref<'_, Vec<LifecycleEvent>> {
        self.events.borrow()
    }

    /// Returns the number of captured events that match the predicate
    pub fn count(&self, predicate: impl Fn(&LifecycleEvent) -> bool) -> usize {
        self.events.borrow().iter().filter(|event| predicate(event)).count()
    }

    /// The number of control blocks that have been allocated
    pub fn blocks_allocated(&self) -> usize {
        self.count(|event| matches!(event, LifecycleEvent::BlockAllocated { .. }))
    }

    /// The number of control blocks that have been deallocated
    pub fn blocks_deallocated(&self) -> usize {
        self.count(|event| matches!(event, LifecycleEvent::BlockDeallocated { .. }))
    }

    /// The number of values constructed inside fused blocks
    pub fn values_constructed(&self) -> usize {
        self.count(|event| matches!(event, LifecycleEvent::ValueConstructed { .. }))
    }

    /// The number of external values adopted by plain blocks
    pub fn values_adopted(&self) -> usize {
        self.count(|event| matches!(event, LifecycleEvent::ValueAdopted { .. }))
    }

    /// The number of values destroyed by their blocks
    pub fn values_destroyed(&self) -> usize {
        self.count(|event| matches!(event, LifecycleEvent::ValueDestroyed { .. }))
    }

    /// The number of values moved out of their blocks
    pub fn values_unwrapped(&self) -> usize {
        self.count(|event| matches!(event, LifecycleEvent::ValueMovedOut { .. }))
    }

    /// The number of blocks that have been allocated but not yet deallocated
    pub fn live_blocks(&self) -> usize {
        self.blocks_allocated() - self.blocks_deallocated()
    }

    /// Returns the captured events, one per line
    pub fn captured_output(&self) -> String {
        self.events
            .borrow()
            .iter()
            .map(|event| format!("{event}\n"))
            .collect()
    }
}

impl LifecycleObserver for EventCapture {
    fn on_event(&self, event: &LifecycleEvent) {
        self.events.borrow_mut().push(*event);
    }
}
