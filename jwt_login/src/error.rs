use std::{error, sync::Arc};

use thiserror::Error;

/// A boxed error returned by a collaborator
pub type BoxError = Box<dyn error::Error + Send + Sync + 'static>;

/// A collaborator error that may be shared among several waiting callers
pub type SharedError = Arc<dyn error::Error + Send + Sync + 'static>;

/// An error obtaining or establishing a login session
///
/// Errors are cheap to clone so that the outcome of a single login prompt or
/// refresh can be handed to every caller that was waiting on it.
#[derive(Clone, Debug, Error)]
pub enum LoginError {
    /// The login prompt was dismissed or failed
    #[error("login cancelled")]
    LoginCancelled(#[source] SharedError),
    /// The authority rejected an explicit login
    #[error("authentication failed")]
    AuthFailure(#[source] SharedError),
    /// The login prompt completed, but no token was stored
    #[error("login completed without storing a token")]
    MissingToken,
    /// The session was logged out while a refresh was in flight
    #[error("session ended while the token was being refreshed")]
    SessionEnded,
    /// The token store could not be written
    #[error("unable to persist token")]
    Store(#[source] SharedError),
    /// The task performing the operation panicked or was cancelled
    #[error("token operation did not complete")]
    Aborted,
}

impl LoginError {
    pub(crate) fn login_cancelled(error: BoxError) -> Self {
        Self::LoginCancelled(error.into())
    }

    pub(crate) fn auth_failure(error: BoxError) -> Self {
        Self::AuthFailure(error.into())
    }

    pub(crate) fn store(error: BoxError) -> Self {
        Self::Store(error.into())
    }
}
