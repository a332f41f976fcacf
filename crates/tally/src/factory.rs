use crate::{Shared, block::FusedBlock};
use std::convert::Infallible;

/// Makes a [Shared] with the value stored in the same allocation as the count
///
/// This is the preferred way of making a handle; adopting a `Box` needs a second allocation
/// for the count.
///
/// # Examples
///
/// ```
/// use tally::{Shared, make_shared};
///
/// let a = make_shared(String::from("hello"));
/// let b = a.clone();
///
/// assert_eq!(*b, "hello");
/// assert_eq!(Shared::use_count(&a), 2);
/// ```
pub fn make_shared<T>(value: T) -> Shared<T> {
    make_shared_with(|| value)
}

/// Allocates a control block and then constructs the value inside it with `construct`
///
/// If `construct` panics then the block is freed before the panic continues.
pub fn make_shared_with<T>(construct: impl FnOnce() -> T) -> Shared<T> {
    match try_make_shared(|| Ok::<T, Infallible>(construct())) {
        Ok(shared) => shared,
        Err(never) => match never {},
    }
}

/// Allocates a control block and then constructs the value inside it with a fallible constructor
///
/// If `construct` returns an error then the block is freed and the error is returned unchanged.
///
/// # Examples
///
/// ```
/// use tally::try_make_shared;
///
/// let parsed = try_make_shared(|| "42".parse::<i32>()).unwrap();
/// assert_eq!(*parsed, 42);
///
/// assert!(try_make_shared(|| "forty two".parse::<i32>()).is_err());
/// ```
pub fn try_make_shared<T, E>(construct: impl FnOnce() -> Result<T, E>) -> Result<Shared<T>, E> {
    let block = FusedBlock::create(construct)?;
    Ok(Shared::from_fused(block))
}
