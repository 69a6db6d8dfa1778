//! Session configuration and the login prompt callbacks

use std::{fmt, future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use predicates::{prelude::*, BoxPredicate};
use reqwest::Url;
use thiserror::Error;

use crate::{ignore::RequestContext, BoxError};

/// Presents a login prompt to the user
///
/// The returned future resolves once the user has logged in and a token has
/// been written to the token store, typically by the prompt calling
/// [`LoginManager::login()`][crate::LoginManager::login()]. Rejecting signals
/// that the user cancelled or that the login failed.
///
/// Closures returning a future implement this trait.
#[async_trait]
pub trait DisplayLogin: Send + Sync {
    /// Displays the login prompt and waits for it to complete
    async fn display_login(&self) -> Result<(), BoxError>;
}

#[async_trait]
impl<F, Fut> DisplayLogin for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    async fn display_login(&self) -> Result<(), BoxError> {
        (self)().await
    }
}

/// Dismisses a login prompt after a token has been obtained
///
/// Closures returning a future implement this trait.
#[async_trait]
pub trait HideLogin: Send + Sync {
    /// Hides the login prompt
    async fn hide_login(&self) -> Result<(), BoxError>;
}

#[async_trait]
impl<F, Fut> HideLogin for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    async fn hide_login(&self) -> Result<(), BoxError> {
        (self)().await
    }
}

/// A login callback that was never configured
#[derive(Clone, Copy, Debug, Error)]
#[error("undefined {0} login method")]
pub struct UndefinedLoginMethod(&'static str);

/// The display callback used when none is configured; always rejects
#[derive(Clone, Copy, Debug, Default)]
pub struct UndefinedDisplayLogin;

#[async_trait]
impl DisplayLogin for UndefinedDisplayLogin {
    async fn display_login(&self) -> Result<(), BoxError> {
        Err(UndefinedLoginMethod("display").into())
    }
}

/// The hide callback used when none is configured; always rejects
#[derive(Clone, Copy, Debug, Default)]
pub struct UndefinedHideLogin;

#[async_trait]
impl HideLogin for UndefinedHideLogin {
    async fn hide_login(&self) -> Result<(), BoxError> {
        Err(UndefinedLoginMethod("hide").into())
    }
}

/// Configuration required but not provided
#[derive(Clone, Copy, Debug, Error)]
pub enum ConfigError {
    /// No endpoint was configured for the given operation
    #[error("no {0} endpoint configured")]
    MissingEndpoint(&'static str),
}

/// Static settings for a login session
///
/// All settings are fixed once the session manager is constructed.
pub struct LoginConfig {
    refresh_interval: Duration,
    login_url: Option<Url>,
    refresh_url: Option<Url>,
    ignore: BoxPredicate<RequestContext>,
    display_login: Arc<dyn DisplayLogin>,
    hide_login: Arc<dyn HideLogin>,
}

impl LoginConfig {
    /// The refresh interval used when none is set
    pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(250_000);

    /// The shortest refresh interval accepted
    pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(1);

    /// The longest refresh interval accepted
    pub const MAX_REFRESH_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

    /// Constructs the default configuration
    ///
    /// Tokens are refreshed every 250 seconds, no request is ignored, no
    /// endpoints are set, and both login callbacks reject.
    pub fn new() -> Self {
        Self {
            refresh_interval: Self::DEFAULT_REFRESH_INTERVAL,
            login_url: None,
            refresh_url: None,
            ignore: predicate::never().boxed(),
            display_login: Arc::new(UndefinedDisplayLogin),
            hide_login: Arc::new(UndefinedHideLogin),
        }
    }

    /// Sets how often the token is refreshed in the background
    ///
    /// The interval is clamped between [`MIN_REFRESH_INTERVAL`][Self::MIN_REFRESH_INTERVAL]
    /// and [`MAX_REFRESH_INTERVAL`][Self::MAX_REFRESH_INTERVAL].
    pub fn with_refresh_interval(mut self, refresh_interval: Duration) -> Self {
        self.refresh_interval =
            refresh_interval.clamp(Self::MIN_REFRESH_INTERVAL, Self::MAX_REFRESH_INTERVAL);
        self
    }

    /// Sets the endpoint that exchanges credentials for a token
    pub fn with_login_url(mut self, login_url: Url) -> Self {
        self.login_url = Some(login_url);
        self
    }

    /// Sets the endpoint that exchanges a token for a fresh one
    pub fn with_refresh_url(mut self, refresh_url: Url) -> Self {
        self.refresh_url = Some(refresh_url);
        self
    }

    /// Sets the predicate selecting requests that must never receive a token
    pub fn with_ignore_predicate<P>(mut self, ignore: P) -> Self
    where
        P: Predicate<RequestContext> + Send + Sync + 'static,
    {
        self.ignore = ignore.boxed();
        self
    }

    /// Sets the callback that prompts the user to log in
    pub fn with_display_login(mut self, display_login: impl DisplayLogin + 'static) -> Self {
        self.display_login = Arc::new(display_login);
        self
    }

    /// Sets the callback that dismisses the login prompt
    pub fn with_hide_login(mut self, hide_login: impl HideLogin + 'static) -> Self {
        self.hide_login = Arc::new(hide_login);
        self
    }

    /// How often the token is refreshed in the background
    #[inline]
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// The login endpoint, if configured
    #[inline]
    pub fn login_url(&self) -> Option<&Url> {
        self.login_url.as_ref()
    }

    /// The refresh endpoint, if configured
    #[inline]
    pub fn refresh_url(&self) -> Option<&Url> {
        self.refresh_url.as_ref()
    }

    /// Whether the request must not receive a token
    #[inline]
    pub fn ignores(&self, request: &RequestContext) -> bool {
        self.ignore.eval(request)
    }

    pub(crate) fn display_login(&self) -> &dyn DisplayLogin {
        &*self.display_login
    }

    pub(crate) fn hide_login(&self) -> &dyn HideLogin {
        &*self.hide_login
    }
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LoginConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("LoginConfig")
            .field("refresh_interval", &self.refresh_interval)
            .field("login_url", &self.login_url.as_ref().map(Url::as_str))
            .field("refresh_url", &self.refresh_url.as_ref().map(Url::as_str))
            .field("ignore", &format_args!("{}", self.ignore))
            .finish_non_exhaustive()
    }
}
