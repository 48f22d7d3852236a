use crate::base::{PaymentSession, Terminal};
use crate::Error;
use async_trait::async_trait;
use bbs::{BbsPaymentSession, MsgRouterTerminal, Payment, PaymentEvents, Price};
use std::sync::Arc;
use std::time::Duration;

/// Adapter exposing a [MsgRouterTerminal] through the driver-agnostic
/// traits.
pub struct BbsTerminal {
    inner: MsgRouterTerminal,
}

struct BbsSession {
    inner: Arc<BbsPaymentSession>,
}

/// Opens a BBS MsgRouter terminal from a `bbs+tcp://host:port` uri.
pub async fn open_tcp(uri: &str) -> Result<Box<dyn Terminal>, Error> {
    let inner = bbs::open_tcp(uri).await?;
    Ok(Box::new(BbsTerminal { inner }))
}

#[async_trait]
impl Terminal for BbsTerminal {
    async fn start_payment(
        &self,
        amount: Price,
        events: Arc<dyn PaymentEvents>,
    ) -> Result<Box<dyn PaymentSession>, Error> {
        let inner = self.inner.start_payment(amount, events).await?;
        Ok(Box::new(BbsSession { inner }))
    }

    async fn shutdown(&self) {
        self.inner.shutdown().await
    }
}

#[async_trait]
impl PaymentSession for BbsSession {
    async fn result(&self, timeout: Option<Duration>) -> Result<Payment, Error> {
        Ok(self.inner.result(timeout).await?)
    }

    async fn cancel(&self) -> Result<(), Error> {
        Ok(self.inner.cancel().await?)
    }
}
