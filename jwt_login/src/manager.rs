use crate::config::LoginConfig;
use crate::events::{EventNotifier, LoginEvent};
use crate::exchange::{Credentials, TokenExchange};
use crate::ignore::RequestContext;
use crate::single_flight::{Flight, PendingToken};
use crate::stores::TokenStore;
use crate::{expiry, AccessToken, AccessTokenRef, LoginError};
use aliri_clock::{Clock, System};
use parking_lot::Mutex;
use std::{error, fmt, sync::Arc};
use tokio::{
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};

/// The state of a login session as derived from the stored token
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No token is stored
    NoToken,
    /// A token is stored, unexpired, and kept fresh in the background
    ValidToken,
    /// A token is stored, but is expired or is not being kept fresh
    ExpiredToken,
}

/// Manages the token of a login session
///
/// The manager hands out the current token, refreshing it or prompting the
/// user to log in when required. Concurrent callers that need a refresh or a
/// login share a single in-flight operation and all observe its outcome.
///
/// Once a token has been set, it is refreshed in the background at the
/// configured interval until the session is logged out or a refresh fails.
///
/// Cloning a manager is cheap and yields a handle on the same session. The
/// manager must be used from within a Tokio runtime.
#[derive(Clone)]
pub struct LoginManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: LoginConfig,
    store: Box<dyn TokenStore>,
    exchange: Box<dyn TokenExchange>,
    notifier: Box<dyn EventNotifier>,
    clock: Box<dyn Clock + Send + Sync>,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    refresh_cycle: Option<RefreshCycle>,
    login: Flight,
    refresh: Flight,
    prompt_open: bool,
    generation: u64,
}

/// The background refresh task, aborted when dropped
struct RefreshCycle(JoinHandle<()>);

impl Drop for RefreshCycle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

enum Commit {
    Stored { prompt_open: bool },
    Discarded,
}

enum Refreshed {
    Token(AccessToken),
    Failed,
    Stale,
    Stuck(LoginError),
}

impl LoginManager {
    /// Constructs a new session manager using the system clock
    ///
    /// No work is performed until a token is first requested.
    pub fn new<S, X, N>(config: LoginConfig, store: S, exchange: X, notifier: N) -> Self
    where
        S: TokenStore + 'static,
        X: TokenExchange + 'static,
        N: EventNotifier + 'static,
    {
        Self::with_clock(config, store, exchange, notifier, System)
    }

    /// Constructs a new session manager that checks expiry against the given clock
    pub fn with_clock<S, X, N, C>(
        config: LoginConfig,
        store: S,
        exchange: X,
        notifier: N,
        clock: C,
    ) -> Self
    where
        S: TokenStore + 'static,
        X: TokenExchange + 'static,
        N: EventNotifier + 'static,
        C: Clock + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                config,
                store: Box::new(store),
                exchange: Box::new(exchange),
                notifier: Box::new(notifier),
                clock: Box::new(clock),
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// The session's configuration
    #[inline]
    pub fn config(&self) -> &LoginConfig {
        &self.inner.config
    }

    /// Logs in with the given credentials
    ///
    /// On success the token is stored, background refresh is started if it
    /// is not already running, an open login prompt is hidden, and
    /// [`LoginEvent::UserLoggedIn`] is published. On failure nothing changes.
    pub async fn login(&self, credentials: &Credentials) -> Result<(), LoginError> {
        tracing::debug!(username = %credentials.username, "logging in");

        let token = self
            .inner
            .exchange
            .login(credentials)
            .await
            .map_err(|error| {
                tracing::warn!(
                    error = (&*error as &dyn error::Error),
                    "authority rejected login"
                );
                LoginError::auth_failure(error)
            })?;

        self.inner.set_token(&token, None).await?;

        tracing::info!(username = %credentials.username, "logged in");
        self.inner.notifier.publish(LoginEvent::UserLoggedIn);
        Ok(())
    }

    /// Gets a token to authorize the given request
    ///
    /// Returns `None` when the configured ignore predicate matches the
    /// request. Otherwise returns the stored token if it is unexpired and
    /// being kept fresh, refreshes it if not, or prompts the user to log in
    /// if there is no stored token. A failed refresh discards the stored
    /// token and falls back to prompting the user.
    pub async fn get_token(
        &self,
        request: Option<&RequestContext>,
    ) -> Result<Option<AccessToken>, LoginError> {
        if let Some(request) = request {
            if self.inner.config.ignores(request) {
                tracing::trace!(
                    method = %request.method(),
                    url = %request.url(),
                    "request is ignored, no token attached"
                );
                return Ok(None);
            }
        }

        Arc::clone(&self.inner).resolve().await.map(Some)
    }

    /// Logs out of the session
    ///
    /// Removes the stored token, stops background refresh, and publishes
    /// [`LoginEvent::UserLoggedOut`]. A refresh still in flight will not
    /// restore the token. Logging out of a logged-out session is harmless.
    pub fn logout(&self) {
        {
            let mut state = self.inner.state.lock();
            state.generation = state.generation.wrapping_add(1);
            state.refresh_cycle = None;
            if let Err(error) = self.inner.store.delete() {
                tracing::warn!(
                    error = (&*error as &dyn error::Error),
                    "unable to remove token from store"
                );
            }
        }

        tracing::info!("logged out");
        self.inner.notifier.publish(LoginEvent::UserLoggedOut);
    }

    /// The current state of the session
    pub fn session_state(&self) -> SessionState {
        let state = self.inner.state.lock();
        self.inner.inspect(&state).0
    }

    /// Whether the token is being refreshed in the background
    pub fn is_refresh_armed(&self) -> bool {
        self.inner.state.lock().refresh_cycle.is_some()
    }
}

impl fmt::Debug for LoginManager {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("LoginManager")
            .field("config", &self.inner.config)
            .field("refresh_armed", &state.refresh_cycle.is_some())
            .field("login_pending", &state.login.is_pending())
            .field("refresh_pending", &state.refresh.is_pending())
            .finish_non_exhaustive()
    }
}

fn is_placeholder(raw: &str) -> bool {
    matches!(raw, "" | "null" | "undefined")
}

impl Inner {
    fn current_token(&self) -> Option<AccessToken> {
        match self.store.get() {
            Ok(Some(raw)) if !is_placeholder(&raw) => Some(AccessToken::from(raw)),
            Ok(_) => None,
            Err(error) => {
                tracing::warn!(
                    error = (&*error as &dyn error::Error),
                    "unable to read token store, treating session as logged out"
                );
                None
            }
        }
    }

    fn inspect(&self, state: &State) -> (SessionState, Option<AccessToken>) {
        match self.current_token() {
            None => (SessionState::NoToken, None),
            Some(token)
                if state.refresh_cycle.is_none() || expiry::is_expired(&token, &*self.clock) =>
            {
                (SessionState::ExpiredToken, Some(token))
            }
            Some(token) => (SessionState::ValidToken, Some(token)),
        }
    }

    async fn resolve(self: Arc<Self>) -> Result<AccessToken, LoginError> {
        let pending = {
            let mut state = self.state.lock();
            match self.inspect(&state) {
                (SessionState::ValidToken, Some(token)) => {
                    tracing::trace!("using stored token");
                    return Ok(token);
                }
                (SessionState::ExpiredToken, _) => self.join_refresh(&mut state),
                _ => self.join_login(&mut state),
            }
        };

        pending.await
    }

    fn join_login(self: &Arc<Self>, state: &mut State) -> PendingToken {
        if let Some(pending) = state.login.pending() {
            tracing::debug!("waiting on login already in progress");
            return pending;
        }

        tracing::debug!("no stored token, prompting for login");
        state.prompt_open = true;

        let inner = Arc::clone(self);
        state.login.start(move |id| async move {
            let result = inner.prompt_login().await;
            inner.state.lock().login.settle(id);
            result
        })
    }

    async fn prompt_login(&self) -> Result<AccessToken, LoginError> {
        if let Err(error) = self.config.display_login().display_login().await {
            tracing::info!(
                error = (&*error as &dyn error::Error),
                "login prompt cancelled"
            );
            self.state.lock().prompt_open = false;
            return Err(LoginError::login_cancelled(error));
        }

        let prompt_open = std::mem::take(&mut self.state.lock().prompt_open);
        if prompt_open {
            self.hide_prompt().await;
        }

        self.current_token().ok_or(LoginError::MissingToken)
    }

    async fn hide_prompt(&self) {
        if let Err(error) = self.config.hide_login().hide_login().await {
            tracing::warn!(
                error = (&*error as &dyn error::Error),
                "unable to hide login prompt"
            );
        }
    }

    fn join_refresh(self: &Arc<Self>, state: &mut State) -> PendingToken {
        if let Some(pending) = state.refresh.pending() {
            tracing::debug!("waiting on refresh already in progress");
            return pending;
        }

        let generation = state.generation;
        let inner = Arc::clone(self);
        state.refresh.start(move |id| async move {
            let refreshed = inner.refresh(generation).await;
            inner.state.lock().refresh.settle(id);

            match refreshed {
                Refreshed::Token(token) => Ok(token),
                Refreshed::Failed => inner.resolve().await,
                Refreshed::Stale => Err(LoginError::SessionEnded),
                Refreshed::Stuck(error) => Err(error),
            }
        })
    }

    async fn refresh(self: &Arc<Self>, generation: u64) -> Refreshed {
        if let Some(current) = self.current_token() {
            tracing::debug!("refreshing token");

            match self.exchange.refresh(&current).await {
                Ok(token) => match self.set_token(&token, Some(generation)).await {
                    Ok(true) => {
                        tracing::info!("token refreshed");
                        return Refreshed::Token(token);
                    }
                    Ok(false) => {
                        tracing::info!("session ended during refresh, discarding new token");
                        return Refreshed::Stale;
                    }
                    Err(error) => {
                        tracing::warn!(
                            error = (&error as &dyn error::Error),
                            "unable to store refreshed token"
                        );
                    }
                },
                Err(error) => {
                    tracing::warn!(
                        error = (&*error as &dyn error::Error),
                        "error refreshing token"
                    );
                }
            }
        } else {
            tracing::debug!("no stored token to refresh");
        }

        match self.end_session(generation) {
            Ok(true) => Refreshed::Failed,
            Ok(false) => Refreshed::Stale,
            Err(error) => Refreshed::Stuck(error),
        }
    }

    /// Drops the stored token and stops background refresh after a failed
    /// refresh, unless the session already ended
    ///
    /// A token that cannot be removed would be refreshed again on the next
    /// lookup, so the failure is reported instead of falling back to login.
    fn end_session(&self, generation: u64) -> Result<bool, LoginError> {
        let mut state = self.state.lock();
        if state.generation != generation {
            return Ok(false);
        }

        tracing::info!("discarding token that could not be refreshed");
        state.refresh_cycle = None;
        self.store.delete().map_err(|error| {
            tracing::warn!(
                error = (&*error as &dyn error::Error),
                "unable to remove token that could not be refreshed"
            );
            LoginError::store(error)
        })?;
        Ok(true)
    }

    /// Stores the token, hiding an open login prompt
    ///
    /// With a `generation`, the token is discarded if the session was logged
    /// out since that generation began; returns whether the token was stored.
    async fn set_token(
        self: &Arc<Self>,
        token: &AccessTokenRef,
        generation: Option<u64>,
    ) -> Result<bool, LoginError> {
        match self.commit(token, generation)? {
            Commit::Stored { prompt_open } => {
                if prompt_open {
                    self.hide_prompt().await;
                }
                Ok(true)
            }
            Commit::Discarded => Ok(false),
        }
    }

    fn commit(
        self: &Arc<Self>,
        token: &AccessTokenRef,
        generation: Option<u64>,
    ) -> Result<Commit, LoginError> {
        let mut state = self.state.lock();
        if generation.is_some_and(|g| g != state.generation) {
            return Ok(Commit::Discarded);
        }

        self.store.set(token).map_err(LoginError::store)?;
        self.arm_refresh_cycle(&mut state);

        Ok(Commit::Stored {
            prompt_open: std::mem::take(&mut state.prompt_open),
        })
    }

    fn arm_refresh_cycle(self: &Arc<Self>, state: &mut State) {
        if state.refresh_cycle.is_some() {
            return;
        }

        let period = self.config.refresh_interval();

        tracing::debug!(
            interval_ms = period.as_millis() as u64,
            "starting background token refresh"
        );

        let start = Instant::now() + period;
        let inner = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            let mut ticks = time::interval_at(start, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticks.tick().await;
                match inner.upgrade() {
                    Some(inner) => inner.refresh_in_background(),
                    None => {
                        tracing::debug!("session dropped, halting background refresh");
                        break;
                    }
                }
            }
        });

        state.refresh_cycle = Some(RefreshCycle(task));
    }

    fn refresh_in_background(self: &Arc<Self>) {
        tracing::debug!("background refresh due");
        let mut state = self.state.lock();
        drop(self.join_refresh(&mut state));
    }
}
