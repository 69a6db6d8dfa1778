//! Network exchanges that issue tokens

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::{AccessToken, AccessTokenRef, BoxError, Password, Username};

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use self::http::HttpTokenExchange;

/// Credentials presented at login
#[derive(Clone, Debug, Serialize)]
pub struct Credentials {
    /// The user's name
    pub username: Username,

    /// The user's password
    pub password: Password,
}

impl Credentials {
    /// Constructs a new set of credentials
    pub fn new(username: impl Into<Username>, password: impl Into<Password>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// An authority that issues tokens
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Exchanges credentials for a token
    async fn login(&self, credentials: &Credentials) -> Result<AccessToken, BoxError>;

    /// Exchanges a current, possibly expired, token for a fresh one
    async fn refresh(&self, token: &AccessTokenRef) -> Result<AccessToken, BoxError>;
}

#[async_trait]
impl<T: TokenExchange + ?Sized> TokenExchange for Arc<T> {
    #[inline]
    async fn login(&self, credentials: &Credentials) -> Result<AccessToken, BoxError> {
        (**self).login(credentials).await
    }

    #[inline]
    async fn refresh(&self, token: &AccessTokenRef) -> Result<AccessToken, BoxError> {
        (**self).refresh(token).await
    }
}
