use crate::Error;
use async_trait::async_trait;
use bbs::{Payment, PaymentEvents, Price};
use std::sync::Arc;
use std::time::Duration;

/// A single payment in flight on a terminal.
#[async_trait]
pub trait PaymentSession: Send + Sync {
    /// Waits for the transaction outcome. Timing out only abandons the
    /// wait, never the transaction.
    async fn result(&self, timeout: Option<Duration>) -> Result<Payment, Error>;

    /// Tries to cancel the payment and waits for the session to reach a
    /// terminal state. Does not roll back a payment that has already been
    /// committed.
    async fn cancel(&self) -> Result<(), Error>;
}

/// A driver-agnostic card terminal.
#[async_trait]
pub trait Terminal: Send + Sync {
    /// Starts a payment over `amount`, replacing (and thereby cancelling) a
    /// still active session.
    ///
    /// `events` receives display and print traffic and the commit decision
    /// callback: after the terminal authorises the transaction,
    /// [PaymentEvents::before_commit] decides whether it is committed or
    /// rolled back.
    async fn start_payment(
        &self,
        amount: Price,
        events: Arc<dyn PaymentEvents>,
    ) -> Result<Box<dyn PaymentSession>, Error>;

    async fn shutdown(&self);
}
