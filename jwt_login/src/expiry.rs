//! Expiry inspection of JSON Web Tokens
//!
//! Only the `exp` claim is consulted. Signatures are never verified here; the
//! authority that issued the token is the one responsible for rejecting it.

use aliri_base64::Base64Url;
use aliri_clock::{Clock, UnixTime};
use serde::Deserialize;
use thiserror::Error;

use crate::AccessTokenRef;

/// The reason a token could not be inspected
#[derive(Debug, Error)]
pub enum MalformedToken {
    /// The token does not have a header, payload, and signature
    #[error("token is not a well-formed JWT")]
    Structure,
    /// A segment is not valid base64url
    #[error("token segment is not valid base64url")]
    Encoding(#[from] aliri_base64::InvalidBase64Data),
    /// The header is not a JSON object
    #[error("token header could not be decoded")]
    Header(#[source] serde_json::Error),
    /// The payload does not decode into claims
    #[error("token claims could not be decoded")]
    Claims(#[source] serde_json::Error),
    /// The `exp` claim is negative or not finite
    #[error("token expiry is not a valid timestamp")]
    Expiry,
}

type HeaderObject = serde_json::Map<String, serde_json::Value>;

#[derive(Deserialize)]
struct ExpiryClaims {
    #[serde(default)]
    exp: Option<f64>,
}

/// Reads the untrusted `exp` claim of a token
///
/// Returns `Ok(None)` for a well-formed token that does not expire. A
/// fractional `exp` is truncated to the whole second.
pub fn expiry(token: &AccessTokenRef) -> Result<Option<UnixTime>, MalformedToken> {
    let mut segments = token.as_str().split('.');
    let (Some(header), Some(payload), Some(_), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(MalformedToken::Structure);
    };

    let header = Base64Url::from_encoded(header)?;
    serde_json::from_slice::<HeaderObject>(header.as_slice()).map_err(MalformedToken::Header)?;

    let payload = Base64Url::from_encoded(payload)?;
    let claims: ExpiryClaims =
        serde_json::from_slice(payload.as_slice()).map_err(MalformedToken::Claims)?;

    match claims.exp {
        None => Ok(None),
        Some(exp) if exp.is_finite() && exp >= 0.0 => Ok(Some(UnixTime(exp.floor() as u64))),
        Some(_) => Err(MalformedToken::Expiry),
    }
}

/// Whether the token is expired as of `now`
///
/// A token that cannot be inspected is always considered expired.
pub fn is_expired_at(token: &AccessTokenRef, now: UnixTime) -> bool {
    match expiry(token) {
        Ok(Some(exp)) => now >= exp,
        Ok(None) => false,
        Err(error) => {
            tracing::debug!(
                error = (&error as &dyn std::error::Error),
                "unable to inspect token, treating as expired"
            );
            true
        }
    }
}

/// Whether the token is expired according to the given clock
#[inline]
pub fn is_expired<C: Clock + ?Sized>(token: &AccessTokenRef, clock: &C) -> bool {
    is_expired_at(token, clock.now())
}
