//! A token exchange that talks to HTTP login and refresh endpoints
//!
//! Login posts `{"username", "password"}` to the login endpoint; refresh posts
//! `{"token"}` to the refresh endpoint. Both expect `{"token"}` in the response.

use async_trait::async_trait;
use reqwest::Url;
use thiserror::Error;

use super::{Credentials, TokenExchange};
use crate::{AccessToken, AccessTokenRef, BoxError, ConfigError, LoginConfig};

pub mod dto;

/// A token exchange that uses HTTP endpoints
#[derive(Clone, Debug)]
pub struct HttpTokenExchange {
    client: reqwest::Client,
    login_url: Url,
    refresh_url: Url,
}

impl HttpTokenExchange {
    /// Constructs a new HTTP token exchange
    ///
    /// The client should not itself attach session tokens to requests.
    pub fn new(client: reqwest::Client, login_url: Url, refresh_url: Url) -> Self {
        Self {
            client,
            login_url,
            refresh_url,
        }
    }

    /// Constructs a new HTTP token exchange using the endpoints in `config`
    pub fn from_config(client: reqwest::Client, config: &LoginConfig) -> Result<Self, ConfigError> {
        let login_url = config
            .login_url()
            .cloned()
            .ok_or(ConfigError::MissingEndpoint("login"))?;
        let refresh_url = config
            .refresh_url()
            .cloned()
            .ok_or(ConfigError::MissingEndpoint("refresh"))?;
        Ok(Self::new(client, login_url, refresh_url))
    }
}

#[async_trait]
impl TokenExchange for HttpTokenExchange {
    async fn login(&self, credentials: &Credentials) -> Result<AccessToken, BoxError> {
        Ok(request_token(&self.client, self.login_url.clone(), "login", credentials).await?)
    }

    async fn refresh(&self, token: &AccessTokenRef) -> Result<AccessToken, BoxError> {
        let body = dto::RefreshRequest { token };
        Ok(request_token(&self.client, self.refresh_url.clone(), "refresh", &body).await?)
    }
}

/// An error while attempting to request a new token from the authority
#[derive(Debug, Error)]
pub enum TokenRequestError {
    /// An error from the authority with an error body
    #[error("error requesting token from authority: {body}")]
    ErrorWithBody {
        /// The underlying request error
        source: reqwest::Error,
        /// The body of the error
        body: String,
    },
    /// Unable to deserialize the token body
    #[error("error deserializing token body from authority")]
    TokenBodyError(#[from] serde_json::Error),
    /// Unable to read the response
    #[error("error reading response body")]
    BodyReadError(reqwest::Error),
    /// Unable to send a token request to the authority
    #[error("error sending request to authority")]
    RequestSend(reqwest::Error),
}

#[tracing::instrument(
    err,
    skip(client, token_url, payload),
    fields(token_url = %token_url),
)]
async fn request_token<P: serde::Serialize>(
    client: &reqwest::Client,
    token_url: Url,
    operation: &'static str,
    payload: &P,
) -> Result<AccessToken, TokenRequestError> {
    tracing::trace!("requesting token from authority");

    let resp = client
        .post(token_url)
        .json(payload)
        .send()
        .await
        .map_err(TokenRequestError::RequestSend)?;

    tracing::debug!(
        response.status = resp.status().as_u16(),
        "received token response from issuing authority"
    );

    if let Err(error) = resp.error_for_status_ref() {
        let body = resp
            .text()
            .await
            .map_err(TokenRequestError::BodyReadError)?;
        return Err(TokenRequestError::ErrorWithBody {
            source: error,
            body,
        });
    }

    let body = resp
        .bytes()
        .await
        .map_err(TokenRequestError::BodyReadError)?;
    let resp: dto::TokenResponse = serde_json::from_slice(&body)?;

    tracing::info!("received new token");

    Ok(resp.token.to_owned())
}
