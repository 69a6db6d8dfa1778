use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc, OnceLock,
    },
    time::Duration,
};

use aliri_base64::Base64Url;
use aliri_clock::{Clock, UnixTime};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, Semaphore};

use crate::{
    events::{BroadcastNotifier, LoginEvent},
    exchange::{Credentials, TokenExchange},
    stores::{InMemoryTokenStore, TokenStore},
    AccessToken, AccessTokenRef, BoxError, LoginConfig, LoginManager,
};

pub(crate) const NOW: u64 = 1_700_000_000;
pub(crate) const LATER: u64 = NOW + 3_600;
pub(crate) const INTERVAL: Duration = Duration::from_secs(10);

/// Builds an unsigned JWT carrying the given subject and expiry
pub(crate) fn jwt(sub: &str, exp: Option<u64>) -> AccessToken {
    let header = Base64Url::from_raw(r#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = match exp {
        Some(exp) => format!(r#"{{"sub":"{sub}","exp":{exp}}}"#),
        None => format!(r#"{{"sub":"{sub}"}}"#),
    };
    let payload = Base64Url::from_raw(claims);
    AccessToken::from(format!("{header}.{payload}.c2ln"))
}

pub(crate) fn fresh_jwt(sub: &str) -> AccessToken {
    jwt(sub, Some(LATER))
}

pub(crate) fn stale_jwt(sub: &str) -> AccessToken {
    jwt(sub, Some(NOW - 60))
}

/// A clock shared between a test and the manager under test
#[derive(Clone, Debug)]
pub(crate) struct SharedClock(Arc<AtomicU64>);

impl SharedClock {
    pub(crate) fn new(now: u64) -> Self {
        Self(Arc::new(AtomicU64::new(now)))
    }

    pub(crate) fn set(&self, now: u64) {
        self.0.store(now, Ordering::SeqCst);
    }
}

impl Clock for SharedClock {
    fn now(&self) -> UnixTime {
        UnixTime(self.0.load(Ordering::SeqCst))
    }
}

/// An authority that issues a numbered token for every request
#[derive(Debug, Default)]
pub(crate) struct StubExchange {
    logins: AtomicUsize,
    refreshes: AtomicUsize,
    reject_logins: AtomicBool,
    reject_refreshes: AtomicBool,
    refreshed_from: Mutex<Vec<AccessToken>>,
    gate: Option<Semaphore>,
}

impl StubExchange {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Holds every refresh until [`release()`][Self::release()] is called
    pub(crate) fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    pub(crate) fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub(crate) fn reject_logins(&self) {
        self.reject_logins.store(true, Ordering::SeqCst);
    }

    pub(crate) fn reject_refreshes(&self) {
        self.reject_refreshes.store(true, Ordering::SeqCst);
    }

    pub(crate) fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub(crate) fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub(crate) fn refreshed_from(&self) -> Vec<AccessToken> {
        self.refreshed_from.lock().clone()
    }
}

#[async_trait]
impl TokenExchange for StubExchange {
    async fn login(&self, credentials: &Credentials) -> Result<AccessToken, BoxError> {
        let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        if self.reject_logins.load(Ordering::SeqCst) {
            return Err("invalid credentials".into());
        }
        Ok(fresh_jwt(&format!("{}-login-{n}", credentials.username)))
    }

    async fn refresh(&self, token: &AccessTokenRef) -> Result<AccessToken, BoxError> {
        let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        self.refreshed_from.lock().push(token.to_owned());

        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }

        if self.reject_refreshes.load(Ordering::SeqCst) {
            return Err("refresh rejected".into());
        }
        Ok(fresh_jwt(&format!("refresh-{n}")))
    }
}

/// A store that refuses to give up its token
#[derive(Debug)]
pub(crate) struct UndeletableStore(pub(crate) InMemoryTokenStore);

impl TokenStore for UndeletableStore {
    fn get(&self) -> Result<Option<String>, BoxError> {
        self.0.get()
    }

    fn set(&self, token: &AccessTokenRef) -> Result<(), BoxError> {
        self.0.set(token)
    }

    fn delete(&self) -> Result<(), BoxError> {
        Err("store is read-only".into())
    }
}

/// What the login prompt does when displayed
#[derive(Clone, Debug)]
pub(crate) enum PromptAction {
    /// Logs in through the manager
    Login(Credentials),
    /// Writes a token to the store behind the manager's back
    Store(AccessToken),
    /// Completes without doing anything
    Nothing,
    /// Rejects as if dismissed by the user
    Cancel,
}

#[derive(Debug, Default)]
pub(crate) struct PromptLog {
    displays: AtomicUsize,
    hides: AtomicUsize,
}

impl PromptLog {
    pub(crate) fn displays(&self) -> usize {
        self.displays.load(Ordering::SeqCst)
    }

    pub(crate) fn hides(&self) -> usize {
        self.hides.load(Ordering::SeqCst)
    }
}

async fn run_prompt(
    action: PromptAction,
    manager: Arc<OnceLock<LoginManager>>,
    store: Arc<InMemoryTokenStore>,
) -> Result<(), BoxError> {
    tokio::task::yield_now().await;

    match action {
        PromptAction::Login(credentials) => {
            let manager = manager.get().cloned().ok_or("manager not constructed")?;
            manager.login(&credentials).await?;
        }
        PromptAction::Store(token) => store.set(&token)?,
        PromptAction::Nothing => {}
        PromptAction::Cancel => return Err("prompt dismissed".into()),
    }

    Ok(())
}

/// A manager wired to in-memory collaborators that record what happens to them
pub(crate) struct Harness {
    pub(crate) manager: LoginManager,
    pub(crate) store: Arc<InMemoryTokenStore>,
    pub(crate) exchange: Arc<StubExchange>,
    pub(crate) prompt: Arc<PromptLog>,
    pub(crate) clock: SharedClock,
    pub(crate) events: broadcast::Receiver<LoginEvent>,
}

impl Harness {
    pub(crate) fn new(
        token: Option<AccessToken>,
        action: PromptAction,
        exchange: StubExchange,
    ) -> Self {
        Self::with_config(LoginConfig::new(), token, action, exchange)
    }

    pub(crate) fn with_config(
        config: LoginConfig,
        token: Option<AccessToken>,
        action: PromptAction,
        exchange: StubExchange,
    ) -> Self {
        let store = Arc::new(match token {
            Some(token) => InMemoryTokenStore::with_token(token),
            None => InMemoryTokenStore::new(),
        });
        let exchange = Arc::new(exchange);
        let prompt = Arc::new(PromptLog::default());
        let clock = SharedClock::new(NOW);
        let notifier = BroadcastNotifier::new(16);
        let events = notifier.subscribe();
        let slot = Arc::new(OnceLock::new());

        let display = {
            let prompt = prompt.clone();
            let slot = slot.clone();
            let store = store.clone();
            move || {
                prompt.displays.fetch_add(1, Ordering::SeqCst);
                run_prompt(action.clone(), slot.clone(), store.clone())
            }
        };

        let hide = {
            let prompt = prompt.clone();
            move || {
                prompt.hides.fetch_add(1, Ordering::SeqCst);
                async { Ok::<(), BoxError>(()) }
            }
        };

        let config = config
            .with_refresh_interval(INTERVAL)
            .with_display_login(display)
            .with_hide_login(hide);

        let manager = LoginManager::with_clock(
            config,
            store.clone(),
            exchange.clone(),
            notifier,
            clock.clone(),
        );
        let _ = slot.set(manager.clone());

        Self {
            manager,
            store,
            exchange,
            prompt,
            clock,
            events,
        }
    }

    /// The raw value in the token store
    pub(crate) fn stored(&self) -> Option<String> {
        self.store.get().expect("in-memory store never fails")
    }

    /// Events published so far
    pub(crate) fn published(&mut self) -> Vec<LoginEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Lets every ready task make progress
pub(crate) async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}
