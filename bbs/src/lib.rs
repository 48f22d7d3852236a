pub mod connection;
mod error;
pub mod io;
pub mod packets;
pub mod payment_session;
mod pending;
pub mod session;
pub mod terminal;

pub use connection::{Connection, Reply};
pub use error::Error;
pub use payment_session::{BbsPaymentSession, Payment, PaymentEvents, PaymentState};
pub use session::{Session, TerminalError};
pub use terminal::{open_tcp, MsgRouterTerminal};

// Reexport everything so we can just use this crate for importing the internals.
pub use bbs_builder::*;
pub use bbs_derive::*;
