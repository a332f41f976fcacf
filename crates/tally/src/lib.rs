//! A single-threaded shared-ownership pointer
//!
//! [Shared] is a reference-counted handle to a value. Handles referring to the same value share
//! a control block that holds the count, and the value is destroyed exactly once, when the last
//! handle is dropped or reassigned.
//!
//! There are two ways of making a handle:
//!
//! - [make_shared] (and its variants) allocates a single block holding both the count and the
//!   value, and then constructs the value inside it.
//! - [Shared::from_raw] or [Shared::from_box] adopts a value that's already been allocated,
//!   and allocates a separate block for the count.
//!
//! The count isn't atomic, and handles can't be sent between threads.
//! Weak references, custom deleters, and custom allocators aren't supported.
//!
//! Each transition in a block's or a handle's life can be observed by installing a
//! [LifecycleObserver](lifecycle::LifecycleObserver), see the [lifecycle] module.

#![warn(missing_docs)]

mod address;
mod block;
mod error;
mod factory;
pub mod lifecycle;
mod shared;

pub use crate::{
    address::Address,
    block::BlockKind,
    error::{Error, Result},
    factory::{make_shared, make_shared_with, try_make_shared},
    shared::Shared,
};
