use std::future::Future;

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::{AccessToken, LoginError};

/// A handle on the outcome of an in-flight token operation
pub(crate) type PendingToken = Shared<BoxFuture<'static, Result<AccessToken, LoginError>>>;

/// At most one in-flight token operation of a given kind
///
/// The operation runs as its own task, so it completes and its outcome is
/// delivered even if every caller waiting on it goes away. The task is
/// responsible for calling [`settle()`][Self::settle()] with the identifier it
/// was started with once its outcome is known.
#[derive(Default)]
pub(crate) struct Flight {
    current: Option<(u64, PendingToken)>,
    next_id: u64,
}

impl Flight {
    /// The operation currently in flight, if any
    pub(crate) fn pending(&self) -> Option<PendingToken> {
        self.current.as_ref().map(|(_, pending)| pending.clone())
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.current.is_some()
    }

    /// Starts a new operation, replacing any record of a previous one
    pub(crate) fn start<F, Fut>(&mut self, operation: F) -> PendingToken
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = Result<AccessToken, LoginError>> + Send + 'static,
    {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        let task = tokio::spawn(operation(id));
        let pending = async move {
            task.await.unwrap_or_else(|error| {
                tracing::error!(
                    error = (&error as &dyn std::error::Error),
                    "token operation did not complete"
                );
                Err(LoginError::Aborted)
            })
        }
        .boxed()
        .shared();

        self.current = Some((id, pending.clone()));
        pending
    }

    /// Forgets the operation started with `id`, if it is still the current one
    pub(crate) fn settle(&mut self, id: u64) {
        if matches!(self.current, Some((current, _)) if current == id) {
            self.current = None;
        }
    }
}
