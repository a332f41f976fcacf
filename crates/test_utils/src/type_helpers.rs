use std::{cell::Cell, fmt, rc::Rc};
use thiserror::Error;

/// Counts the number of times that values holding it have been dropped
#[derive(Clone, Debug, Default)]
pub struct DropCounter(Rc<Cell<usize>>);

impl DropCounter {
    /// Returns the number of drops recorded so far
    pub fn count(&self) -> usize {
        self.0.get()
    }

    fn increment(&self) {
        self.0.set(self.0.get() + 1);
    }
}

/// The error returned by [Car::try_new]
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum CarError {
    /// Cars can't have a negative value
    #[error("a car can't have a negative value (found {0})")]
    NegativeValue(i32),
}

/// A value that records its destruction in a [DropCounter]
#[derive(Debug)]
pub struct Car {
    /// The car's value
    pub value: i32,
    drops: DropCounter,
}

impl Car {
    /// Makes a new Car that reports to the given counter when dropped
    pub fn new(value: i32, drops: &DropCounter) -> Self {
        Self {
            value,
            drops: drops.clone(),
        }
    }

    /// Makes a new Car, failing if the value is negative
    pub fn try_new(value: i32, drops: &DropCounter) -> Result<Self, CarError> {
        if value < 0 {
            return Err(CarError::NegativeValue(value));
        }
        Ok(Self::new(value, drops))
    }
}

impl Drop for Car {
    fn drop(&mut self) {
        self.drops.increment();
    }
}

impl fmt::Display for Car {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Car({})", self.value)
    }
}
