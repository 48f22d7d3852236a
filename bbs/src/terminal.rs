use crate::connection::Connection;
use crate::payment_session::{BbsPaymentSession, PaymentEvents};
use crate::Error;
use bbs_builder::Price;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

pub const URI_SCHEME: &str = "bbs+tcp";

/// A card terminal reachable over a BBS MsgRouter byte stream.
pub struct MsgRouterTerminal {
    connection: Arc<Connection>,
}

impl MsgRouterTerminal {
    pub fn new<S>(port: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        MsgRouterTerminal {
            connection: Connection::new(port),
        }
    }

    /// Starts a payment, replacing (and thereby cancelling) a still active
    /// session. Returns once the terminal has acknowledged the transfer.
    pub async fn start_payment(
        &self,
        amount: Price,
        events: Arc<dyn PaymentEvents>,
    ) -> Result<Arc<BbsPaymentSession>, Error> {
        BbsPaymentSession::start(self.connection.clone(), amount, events).await
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub async fn shutdown(&self) {
        self.connection.shutdown().await
    }
}

/// Opens a terminal from a `bbs+tcp://host:port` uri.
pub async fn open_tcp(uri: &str) -> Result<MsgRouterTerminal, Error> {
    let address = uri
        .strip_prefix(URI_SCHEME)
        .and_then(|rest| rest.strip_prefix("://"))
        .ok_or_else(|| Error::Io(format!("unsupported terminal uri: {uri}")))?;
    let stream = TcpStream::connect(address).await?;
    Ok(MsgRouterTerminal::new(stream))
}
