use async_trait::async_trait;
use payment_terminal::{Error, PaymentEvents, PaymentSession, Price, Registry, Terminal};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static OPENED: AtomicUsize = AtomicUsize::new(0);

struct TestTerminal {
    uri: String,
}

#[async_trait]
impl Terminal for TestTerminal {
    async fn start_payment(
        &self,
        _amount: Price,
        _events: Arc<dyn PaymentEvents>,
    ) -> Result<Box<dyn PaymentSession>, Error> {
        Err(Error::NotSupported(self.uri.clone()))
    }

    async fn shutdown(&self) {}
}

#[tokio::test]
async fn test_open_registered_driver() {
    let mut registry = Registry::empty();
    registry.register("opentestdriver", |uri: String| async move {
        OPENED.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(TestTerminal { uri }) as Box<dyn Terminal>)
    });

    let terminal = registry
        .open_terminal("opentestdriver://example")
        .await
        .unwrap();
    assert_eq!(OPENED.load(Ordering::SeqCst), 1);
    terminal.shutdown().await;
}

#[tokio::test]
async fn test_unknown_scheme() {
    let registry = Registry::default();
    let err = registry.open_terminal("nope://example").await.err().unwrap();
    assert!(matches!(err, Error::NotSupported(scheme) if scheme == "nope"));
}

#[tokio::test]
async fn test_missing_scheme() {
    let registry = Registry::default();
    let err = registry.open_terminal("example.com").await.err().unwrap();
    assert!(matches!(err, Error::MalformedUri(_)));
}
