//! Notification of login and logout transitions

use std::{fmt, sync::Arc};

use tokio::sync::broadcast;

/// A session transition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoginEvent {
    /// A user logged in explicitly
    UserLoggedIn,
    /// The session was logged out
    UserLoggedOut,
}

impl LoginEvent {
    /// The wire name of the event
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UserLoggedIn => "login::userLoggedIn",
            Self::UserLoggedOut => "login::userLoggedOut",
        }
    }
}

impl fmt::Display for LoginEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sink for session transitions
pub trait EventNotifier: Send + Sync {
    /// Publishes an event
    fn publish(&self, event: LoginEvent);
}

impl<T: EventNotifier + ?Sized> EventNotifier for Arc<T> {
    #[inline]
    fn publish(&self, event: LoginEvent) {
        (**self).publish(event)
    }
}

/// A notifier that drops every event
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotifier;

impl EventNotifier for NoopNotifier {
    #[inline]
    fn publish(&self, _: LoginEvent) {}
}

/// A notifier that fans events out to any number of subscribers
#[derive(Clone, Debug)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<LoginEvent>,
}

impl BroadcastNotifier {
    /// Constructs a notifier that buffers up to `capacity` events per lagging subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribes to events published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<LoginEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(16)
    }
}

impl EventNotifier for BroadcastNotifier {
    fn publish(&self, event: LoginEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!(%event, "no subscribers for login event");
        }
    }
}
