use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CarError {
    #[error("a car can't have a negative value (found {0})")]
    NegativeValue(i32),
}

/// The value managed by the demo, announcing its construction and destruction
pub struct Car {
    pub value: i32,
}

impl Car {
    pub fn try_new(value: i32) -> Result<Self, CarError> {
        if value < 0 {
            return Err(CarError::NegativeValue(value));
        }

        println!("Car({value})");
        Ok(Self { value })
    }
}

impl Drop for Car {
    fn drop(&mut self) {
        println!("~Car() value={}", self.value);
    }
}

impl fmt::Display for Car {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Car({})", self.value)
    }
}
