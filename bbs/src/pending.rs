use crate::Error;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Observable lifecycle of a [Promise].
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PromiseState {
    Pending,
    Running,
    Done,
    Failed,
    Cancelled,
}

enum Inner<T> {
    Pending,
    Running,
    Done(T),
    Failed(Error),
    Cancelled,
}

impl<T> Inner<T> {
    fn is_terminal(&self) -> bool {
        matches!(self, Inner::Done(_) | Inner::Failed(_) | Inner::Cancelled)
    }
}

struct Shared<T> {
    inner: Mutex<Inner<T>>,
    done: Notify,
}

/// A one shot completion slot shared between a queue worker and its waiters.
///
/// States run `Pending -> Running -> (Done | Failed | Cancelled)`. The
/// terminal transitions are one shot: whichever of [Promise::complete],
/// [Promise::fail] and [Promise::cancel] lands first wins and every waiter
/// observes that outcome exactly once.
pub(crate) struct Promise<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Clone> Promise<T> {
    pub fn new() -> Self {
        Promise {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::Pending),
                done: Notify::new(),
            }),
        }
    }

    pub fn handle(&self) -> PromiseHandle<T> {
        PromiseHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Marks the item as being processed.
    ///
    /// Returns false if the item was cancelled while it was still queued, in
    /// which case the worker must skip it.
    pub fn claim(&self) -> bool {
        let mut inner = self.shared.inner.lock().unwrap();
        match *inner {
            Inner::Pending => {
                *inner = Inner::Running;
                true
            }
            _ => false,
        }
    }

    pub fn complete(&self, value: T) -> bool {
        self.finish(Inner::Done(value))
    }

    pub fn fail(&self, err: Error) -> bool {
        self.finish(Inner::Failed(err))
    }

    /// Cancels an item that has not been claimed yet.
    pub fn cancel(&self) -> bool {
        let mut inner = self.shared.inner.lock().unwrap();
        if !matches!(*inner, Inner::Pending) {
            return false;
        }
        *inner = Inner::Cancelled;
        drop(inner);
        self.shared.done.notify_waiters();
        true
    }

    fn finish(&self, outcome: Inner<T>) -> bool {
        let mut inner = self.shared.inner.lock().unwrap();
        if inner.is_terminal() {
            return false;
        }
        *inner = outcome;
        drop(inner);
        self.shared.done.notify_waiters();
        true
    }
}

/// A waiter side handle to a [Promise].
#[derive(Clone)]
pub(crate) struct PromiseHandle<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Clone> PromiseHandle<T> {
    pub async fn wait(&self) -> Result<T, Error> {
        loop {
            let notified = self.shared.done.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let inner = self.shared.inner.lock().unwrap();
                match &*inner {
                    Inner::Done(value) => return Ok(value.clone()),
                    Inner::Failed(err) => return Err(err.clone()),
                    Inner::Cancelled => return Err(Error::RequestCancelled),
                    Inner::Pending | Inner::Running => {}
                }
            }
            notified.await;
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> PromiseState {
        match &*self.shared.inner.lock().unwrap() {
            Inner::Pending => PromiseState::Pending,
            Inner::Running => PromiseState::Running,
            Inner::Done(_) => PromiseState::Done,
            Inner::Failed(_) => PromiseState::Failed,
            Inner::Cancelled => PromiseState::Cancelled,
        }
    }
}
