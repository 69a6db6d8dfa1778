//! Middleware to automatically attach a login session's token to outgoing requests
//!
//! When using [`ClientWithMiddleware`](reqwest_middleware::ClientWithMiddleware),
//! include the [`LoginMiddleware`] in the middleware stack to use the current
//! token of a [`LoginManager`] for each outbound request. Obtaining the token
//! may refresh it or prompt the user to log in; the request waits until that
//! completes.
//!
//! If a request already has specified an `Authorization` header value by
//! the time that the middleware executes, the existing value will be left
//! in place, allowing overrides to be specified as required. Requests that
//! the session's ignore predicate matches are sent without a token.
//!
//! ```
//! use jwt_login::{events::NoopNotifier, stores::InMemoryTokenStore, LoginConfig, LoginManager};
//! use jwt_login_reqwest::LoginMiddleware;
//! use reqwest::Client;
//! use reqwest_middleware::ClientBuilder;
//! # use jwt_login::exchange::{Credentials, TokenExchange};
//! # use jwt_login::{AccessToken, AccessTokenRef, BoxError};
//! # struct Unreachable;
//! # #[async_trait::async_trait]
//! # impl TokenExchange for Unreachable {
//! #     async fn login(&self, _: &Credentials) -> Result<AccessToken, BoxError> {
//! #         Err("unreachable".into())
//! #     }
//! #     async fn refresh(&self, _: &AccessTokenRef) -> Result<AccessToken, BoxError> {
//! #         Err("unreachable".into())
//! #     }
//! # }
//! # let exchange = Unreachable;
//!
//! let manager = LoginManager::new(
//!     LoginConfig::new(),
//!     InMemoryTokenStore::new(),
//!     exchange,
//!     NoopNotifier,
//! );
//!
//! let client = ClientBuilder::new(Client::default())
//!     .with(LoginMiddleware::new(manager))
//!     .build();
//!
//! let req = client
//!     .get("https://example.com");
//! # async move { req
//!     .send()
//!     .await
//!     .unwrap();
//! # };
//! ```

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

use bytes::{BufMut, BytesMut};
use jwt_login::{ignore::RequestContext, AccessTokenRef, LoginManager};
use reqwest::{header, Request, Response};
use reqwest_middleware::{Error, Middleware, Next, Result};

/// A middleware that injects the session token into outgoing requests
#[derive(Clone, Debug)]
pub struct LoginMiddleware {
    manager: LoginManager,
}

impl LoginMiddleware {
    /// Construct a new middleware from a session manager
    pub fn new(manager: LoginManager) -> Self {
        Self { manager }
    }
}

fn bearer(token: &AccessTokenRef) -> Result<header::HeaderValue> {
    let mut header_value = BytesMut::with_capacity(token.as_str().len() + 7);
    header_value.put_slice(b"Bearer ");
    header_value.put_slice(token.as_str().as_bytes());
    let mut value =
        header::HeaderValue::from_maybe_shared(header_value).map_err(Error::middleware)?;
    value.set_sensitive(true);
    Ok(value)
}

#[async_trait::async_trait]
impl Middleware for LoginMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        if !req.headers().contains_key(header::AUTHORIZATION) {
            let context = RequestContext::from(&req);
            match self.manager.get_token(Some(&context)).await {
                Ok(Some(token)) => {
                    req.headers_mut().insert(header::AUTHORIZATION, bearer(&token)?);
                }
                Ok(None) => {
                    tracing::trace!(url = %req.url(), "sending request without a token");
                }
                Err(error) => {
                    tracing::warn!(%error, url = %req.url(), "unable to obtain token for request");
                    return Err(Error::middleware(error));
                }
            }
        }

        next.run(req, extensions).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    };

    use aliri_base64::Base64Url;
    use jwt_login::{
        events::NoopNotifier,
        exchange::{Credentials, TokenExchange},
        stores::InMemoryTokenStore,
        AccessToken, BoxError, LoginConfig,
    };
    use predicates::prelude::*;
    use reqwest::Client;
    use reqwest_middleware::ClientBuilder;

    use super::*;

    fn test_token() -> AccessToken {
        let header = Base64Url::from_raw(r#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = Base64Url::from_raw(r#"{"sub":"test","exp":32503680000}"#);
        AccessToken::from(format!("{header}.{payload}.c2ln"))
    }

    fn bearer_test_token() -> String {
        format!("Bearer {}", test_token().as_str())
    }

    #[derive(Default)]
    struct ConstExchange {
        refreshes: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl TokenExchange for ConstExchange {
        async fn login(&self, _: &Credentials) -> std::result::Result<AccessToken, BoxError> {
            Ok(test_token())
        }

        async fn refresh(&self, _: &AccessTokenRef) -> std::result::Result<AccessToken, BoxError> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            Ok(test_token())
        }
    }

    struct AuthChecker {
        expected_authorization: String,
        checked: AtomicBool,
    }

    impl AuthChecker {
        pub fn new(expected: impl Into<String>) -> Self {
            Self {
                expected_authorization: expected.into(),
                checked: AtomicBool::new(false),
            }
        }
    }

    #[async_trait::async_trait]
    impl Middleware for AuthChecker {
        async fn handle(
            &self,
            req: Request,
            _: &mut http::Extensions,
            _: Next<'_>,
        ) -> Result<Response> {
            let authorization_header = req
                .headers()
                .get(header::AUTHORIZATION)
                .expect("no authorization header")
                .to_str()
                .expect("authorization header was not valid UTF-8");

            assert_eq!(authorization_header, self.expected_authorization);
            self.checked.store(true, Ordering::Release);

            Ok(http::Response::<&[u8]>::default().into())
        }
    }

    #[derive(Default)]
    struct NoAuthChecker {
        checked: AtomicBool,
    }

    #[async_trait::async_trait]
    impl Middleware for NoAuthChecker {
        async fn handle(
            &self,
            req: Request,
            _: &mut http::Extensions,
            _: Next<'_>,
        ) -> Result<Response> {
            assert_eq!(req.headers().get(header::AUTHORIZATION), None);
            self.checked.store(true, Ordering::Release);

            Ok(http::Response::<&[u8]>::default().into())
        }
    }

    fn prepare_middleware(
        config: LoginConfig,
        token: Option<AccessToken>,
    ) -> (LoginMiddleware, Arc<ConstExchange>) {
        let store = match token {
            Some(token) => InMemoryTokenStore::with_token(token),
            None => InMemoryTokenStore::new(),
        };
        let exchange = Arc::new(ConstExchange::default());
        let manager = LoginManager::new(config, store, exchange.clone(), NoopNotifier);

        (LoginMiddleware::new(manager), exchange)
    }

    mod when_request_does_not_have_an_authorization_header {
        use super::*;

        #[tokio::test]
        async fn middleware_attaches_session_token() {
            let (middleware, exchange) = prepare_middleware(LoginConfig::new(), Some(test_token()));
            let auth_checker = Arc::new(AuthChecker::new(bearer_test_token()));

            let client = ClientBuilder::new(Client::default())
                .with(middleware)
                .with_arc(auth_checker.clone())
                .build();

            let resp = client.get("https://example.com").send().await.unwrap();

            assert_eq!(resp.status(), http::StatusCode::OK);
            assert!(auth_checker.checked.load(Ordering::Acquire));
            assert_eq!(exchange.refreshes.load(Ordering::SeqCst), 1);
        }

        #[tokio::test]
        async fn attached_token_is_marked_sensitive() {
            let (middleware, _) = prepare_middleware(LoginConfig::new(), Some(test_token()));
            let manager = middleware.manager.clone();
            let token = manager.get_token(None).await.unwrap().unwrap();

            assert!(bearer(&token).unwrap().is_sensitive());
        }

        mod and_session_ignores_the_request {
            use super::*;

            #[tokio::test]
            async fn middleware_does_not_attach_token() {
                let config = LoginConfig::new().with_ignore_predicate(predicate::always());
                let (middleware, exchange) = prepare_middleware(config, Some(test_token()));
                let auth_checker = Arc::new(NoAuthChecker::default());

                let client = ClientBuilder::new(Client::default())
                    .with(middleware)
                    .with_arc(auth_checker.clone())
                    .build();

                let resp = client.get("https://example.com").send().await.unwrap();

                assert_eq!(resp.status(), http::StatusCode::OK);
                assert!(auth_checker.checked.load(Ordering::Acquire));
                assert_eq!(exchange.refreshes.load(Ordering::SeqCst), 0);
            }
        }

        mod and_no_token_can_be_obtained {
            use super::*;

            #[tokio::test]
            async fn request_fails_without_being_sent() {
                let (middleware, _) = prepare_middleware(LoginConfig::new(), None);
                let auth_checker = Arc::new(NoAuthChecker::default());

                let client = ClientBuilder::new(Client::default())
                    .with(middleware)
                    .with_arc(auth_checker.clone())
                    .build();

                let result = client.get("https://example.com").send().await;

                assert!(matches!(result, Err(Error::Middleware(_))));
                assert!(!auth_checker.checked.load(Ordering::Acquire));
            }
        }
    }

    mod when_request_already_contains_an_authorization_header {
        use super::*;

        #[tokio::test]
        async fn middleware_does_not_attach_session_token() {
            const OVERRIDE_TOKEN: &str = "overridden!";
            // Reqwest uses a capital `B` bearer
            const BEARER_OVERRIDE_TOKEN: &str = "Bearer overridden!";

            let (middleware, exchange) = prepare_middleware(LoginConfig::new(), None);
            let auth_checker = Arc::new(AuthChecker::new(BEARER_OVERRIDE_TOKEN));

            let client = ClientBuilder::new(Client::default())
                .with(middleware)
                .with_arc(auth_checker.clone())
                .build();

            let resp = client
                .get("https://example.com")
                .bearer_auth(OVERRIDE_TOKEN)
                .send()
                .await
                .unwrap();

            assert_eq!(resp.status(), http::StatusCode::OK);
            assert!(auth_checker.checked.load(Ordering::Acquire));
            assert_eq!(exchange.refreshes.load(Ordering::SeqCst), 0);
        }
    }
}
