//! Token stores
//!
//! A store holds at most one token string and is the session's source of
//! truth. The session manager is its only writer.

use std::sync::Arc;

use crate::{AccessTokenRef, BoxError};

#[cfg(feature = "file")]
pub mod file;
pub mod in_memory;

#[cfg(feature = "file")]
pub use file::FileTokenStore;
pub use in_memory::InMemoryTokenStore;

/// A durable slot holding the current token
///
/// Stores return the raw stored value; the session manager normalizes empty
/// and placeholder values (`"null"`, `"undefined"`) to "no token".
pub trait TokenStore: Send + Sync {
    /// Reads the stored token, if any
    fn get(&self) -> Result<Option<String>, BoxError>;

    /// Replaces the stored token
    fn set(&self, token: &AccessTokenRef) -> Result<(), BoxError>;

    /// Removes the stored token
    ///
    /// Removing from an empty store succeeds.
    fn delete(&self) -> Result<(), BoxError>;
}

impl<T: TokenStore + ?Sized> TokenStore for Arc<T> {
    #[inline]
    fn get(&self) -> Result<Option<String>, BoxError> {
        (**self).get()
    }

    #[inline]
    fn set(&self, token: &AccessTokenRef) -> Result<(), BoxError> {
        (**self).set(token)
    }

    #[inline]
    fn delete(&self) -> Result<(), BoxError> {
        (**self).delete()
    }
}
