use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
};
use tally::{
    Address,
    lifecycle::{LifecycleEvent, LifecycleObserver},
};

/// Prints each lifecycle event on its own line
///
/// Block addresses change from run to run, so blocks are labelled in order of appearance
/// instead, starting from #1. A label is dropped when its block is deallocated, so a new block
/// at a recycled address gets a new label.
#[derive(Default)]
pub struct PrintObserver {
    labels: RefCell<HashMap<Address, usize>>,
    last_label: Cell<usize>,
}

impl PrintObserver {
    fn label(&self, address: Address) -> String {
        let label = *self.labels.borrow_mut().entry(address).or_insert_with(|| {
            self.last_label.set(self.last_label.get() + 1);
            self.last_label.get()
        });
        format!("#{label}")
    }

    fn describe(&self, event: &LifecycleEvent) -> String {
        use LifecycleEvent::*;

        match *event {
            BlockAllocated { address, kind } => {
                format!("[{}] control block allocated ({kind})", self.label(address))
            }
            ValueConstructed { address } => {
                format!("[{}] value constructed in place", self.label(address))
            }
            ValueAdopted { address } => format!("[{}] value adopted", self.label(address)),
            ValueDestroyed { address } => format!("[{}] value destroyed", self.label(address)),
            ValueMovedOut { address } => format!("[{}] value moved out", self.label(address)),
            BlockDeallocated { address } => {
                let label = self.label(address);
                self.labels.borrow_mut().remove(&address);
                format!("[{label}] control block deallocated")
            }
            HandleCreated { origin } => format!("handle created ({origin})"),
            HandleCloned {
                address: Some(address),
                count,
            } => format!("[{}] handle cloned, count = {count}", self.label(address)),
            HandleCloned { address: None, .. } => "empty handle cloned".into(),
            HandleAssigned {
                address: Some(address),
            } => format!("[{}] handle assigned", self.label(address)),
            HandleAssigned { address: None } => "handle assigned from an empty handle".into(),
            HandleReleased { address, count } => {
                format!("[{}] handle released, count = {count}", self.label(address))
            }
        }
    }
}

impl LifecycleObserver for PrintObserver {
    fn on_event(&self, event: &LifecycleEvent) {
        println!("  {}", self.describe(event));
    }
}
