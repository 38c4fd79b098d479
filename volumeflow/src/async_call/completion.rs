//! First-class continuation values.

use std::fmt;
use tokio::sync::oneshot;

/// A deferred unit of work that runs exactly once with the outcome of an
/// asynchronous operation.
///
/// Consuming `self` in [`Completion::complete`] makes double delivery a
/// compile error. Dropping a completion without calling it leaves whoever
/// waits on it pending forever; every holder must either complete it or hand
/// it on.
pub struct Completion<T> {
    callback: Box<dyn FnOnce(T) + Send + 'static>,
}

impl<T: 'static> Completion<T> {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(T) + Send + 'static,
    {
        Self {
            callback: Box::new(f),
        }
    }

    /// Deliver the outcome, on whatever thread the caller happens to be on.
    pub fn complete(self, value: T) {
        (self.callback)(value)
    }
}

impl<T: Send + 'static> Completion<T> {
    /// Completion backed by a oneshot channel, for callers that want to
    /// `.await` the outcome.
    ///
    /// If the receiver was dropped the value is discarded.
    pub fn channel() -> (Self, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        let completion = Self::new(move |value| {
            if tx.send(value).is_err() {
                tracing::trace!("completion receiver dropped before delivery");
            }
        });
        (completion, rx)
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion").finish_non_exhaustive()
    }
}
