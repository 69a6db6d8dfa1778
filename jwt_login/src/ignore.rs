//! Predicates deciding which outbound requests never receive a token
//!
//! A request matched by the configured ignore predicate is handed no
//! token and never causes a refresh or a login prompt. The predicates here
//! compose with the combinators from [`predicates::prelude`].
//!
//! ```
//! use jwt_login::ignore::{HttpsOnly, UrlPrefix};
//! use predicates::prelude::*;
//!
//! // Skip plain-text requests and anything under the public API
//! let ignore = HttpsOnly.not().or(UrlPrefix::new("https://example.com/public/"));
//! # let _ = ignore;
//! ```

use std::fmt;

use predicates::{reflection, Predicate};
use reqwest::{Method, Url};

/// The outbound request a token is being requested for
#[derive(Clone, Debug)]
pub struct RequestContext {
    method: Method,
    url: Url,
}

impl RequestContext {
    /// Constructs a new request context
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url }
    }

    /// The request method
    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request URL
    #[inline]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl From<&reqwest::Request> for RequestContext {
    fn from(req: &reqwest::Request) -> Self {
        Self::new(req.method().clone(), req.url().clone())
    }
}

/// Matches requests that are sent over HTTPS
#[derive(Clone, Copy, Debug)]
pub struct HttpsOnly;

impl Predicate<RequestContext> for HttpsOnly {
    #[inline]
    fn eval(&self, req: &RequestContext) -> bool {
        req.url().scheme() == "https"
    }

    fn find_case(&self, expected: bool, req: &RequestContext) -> Option<reflection::Case> {
        let result = self.eval(req);
        if result != expected {
            Some(
                reflection::Case::new(Some(self), result).add_product(reflection::Product::new(
                    "scheme",
                    req.url().scheme().to_owned(),
                )),
            )
        } else {
            None
        }
    }
}

impl reflection::PredicateReflection for HttpsOnly {}
impl fmt::Display for HttpsOnly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("scheme is https")
    }
}

/// Matches requests sent to exactly the host specified
#[derive(Clone, Debug)]
pub struct ExactHostMatch {
    host: String,
}

impl ExactHostMatch {
    /// Construct a new predicate from a host string
    pub fn new<S>(host: S) -> Self
    where
        S: ToString,
    {
        Self {
            host: host.to_string(),
        }
    }
}

impl Predicate<RequestContext> for ExactHostMatch {
    #[inline]
    fn eval(&self, req: &RequestContext) -> bool {
        req.url().host_str() == Some(&self.host)
    }

    fn find_case(&self, expected: bool, req: &RequestContext) -> Option<reflection::Case> {
        let result = self.eval(req);
        if result != expected {
            Some(
                reflection::Case::new(Some(self), result).add_product(reflection::Product::new(
                    "host",
                    req.url().host_str().unwrap_or("<no host>").to_owned(),
                )),
            )
        } else {
            None
        }
    }
}

impl reflection::PredicateReflection for ExactHostMatch {}
impl fmt::Display for ExactHostMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("host == ")?;
        f.write_str(&self.host)
    }
}

/// Matches requests whose full URL starts with the given prefix
///
/// Useful for exempting the login and refresh endpoints themselves.
#[derive(Clone, Debug)]
pub struct UrlPrefix {
    prefix: String,
}

impl UrlPrefix {
    /// Construct a new predicate from a URL prefix
    pub fn new<S>(prefix: S) -> Self
    where
        S: ToString,
    {
        Self {
            prefix: prefix.to_string(),
        }
    }
}

impl Predicate<RequestContext> for UrlPrefix {
    #[inline]
    fn eval(&self, req: &RequestContext) -> bool {
        req.url().as_str().starts_with(&self.prefix)
    }

    fn find_case(&self, expected: bool, req: &RequestContext) -> Option<reflection::Case> {
        let result = self.eval(req);
        if result != expected {
            Some(
                reflection::Case::new(Some(self), result)
                    .add_product(reflection::Product::new("url", req.url().to_string())),
            )
        } else {
            None
        }
    }
}

impl reflection::PredicateReflection for UrlPrefix {}
impl fmt::Display for UrlPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("url starts with ")?;
        f.write_str(&self.prefix)
    }
}
