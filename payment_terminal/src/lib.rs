use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;

pub mod base;
pub mod drivers;
mod error;

pub use base::{PaymentSession, Terminal};
pub use bbs::{Payment, PaymentEvents, Price};
pub use error::Error;

/// Factory opening a terminal from its full uri.
pub type DriverFactory =
    Box<dyn Fn(String) -> BoxFuture<'static, Result<Box<dyn Terminal>, Error>> + Send + Sync>;

/// Uri scheme keyed driver registry.
///
/// [Registry::default] knows the built-in drivers; hosts may register their
/// own factories next to them.
pub struct Registry {
    drivers: HashMap<String, DriverFactory>,
}

impl Default for Registry {
    fn default() -> Self {
        let mut registry = Registry::empty();
        registry.register(bbs::terminal::URI_SCHEME, |uri: String| async move {
            drivers::bbs::open_tcp(&uri).await
        });
        registry
    }
}

impl Registry {
    /// A registry without any drivers.
    pub fn empty() -> Self {
        Registry {
            drivers: HashMap::new(),
        }
    }

    pub fn register<F, Fut>(&mut self, uri_scheme: &str, factory: F)
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Box<dyn Terminal>, Error>> + Send + 'static,
    {
        self.drivers
            .insert(uri_scheme.to_string(), Box::new(move |uri| Box::pin(factory(uri))));
    }

    /// Opens the terminal at `uri`, dispatching on the uri scheme.
    pub async fn open_terminal(&self, uri: &str) -> Result<Box<dyn Terminal>, Error> {
        log::debug!("opening terminal at {uri}");
        let scheme = uri
            .split_once("://")
            .map(|(scheme, _)| scheme)
            .filter(|scheme| !scheme.is_empty())
            .ok_or_else(|| Error::MalformedUri(uri.to_string()))?;
        let factory = self
            .drivers
            .get(scheme)
            .ok_or_else(|| Error::NotSupported(scheme.to_string()))?;
        factory(uri.to_string()).await
    }
}
