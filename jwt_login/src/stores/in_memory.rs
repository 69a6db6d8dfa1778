//! An in-memory token store

use parking_lot::Mutex;

use crate::stores::TokenStore;
use crate::{AccessToken, AccessTokenRef, BoxError};

/// An in-memory token store
///
/// The token does not survive a restart of the process.
#[derive(Default, Debug)]
pub struct InMemoryTokenStore {
    token: Mutex<Option<AccessToken>>,
}

impl InMemoryTokenStore {
    /// Constructs a new, empty in-memory token store
    pub const fn new() -> Self {
        Self {
            token: parking_lot::const_mutex(None),
        }
    }

    /// Constructs an in-memory token store holding `token`
    pub fn with_token(token: AccessToken) -> Self {
        Self {
            token: Mutex::new(Some(token)),
        }
    }
}

impl TokenStore for InMemoryTokenStore {
    fn get(&self) -> Result<Option<String>, BoxError> {
        Ok(self.token.lock().as_ref().map(|t| t.as_str().to_owned()))
    }

    fn set(&self, token: &AccessTokenRef) -> Result<(), BoxError> {
        *self.token.lock() = Some(token.to_owned());
        Ok(())
    }

    fn delete(&self) -> Result<(), BoxError> {
        self.token.lock().take();
        Ok(())
    }
}
