use thiserror::Error;

/// The errors returned by the checked accessors of [Shared](crate::Shared)
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The handle doesn't refer to a value
    #[error("the handle is empty")]
    Empty,
    /// Mutable access was requested while other handles share the value
    #[error("the value is shared between {count} handles")]
    NotUnique {
        /// The number of handles sharing the value
        count: usize,
    },
}

/// The Result type used by the checked accessors
pub type Result<T> = std::result::Result<T, Error>;
