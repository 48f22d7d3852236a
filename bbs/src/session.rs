use crate::packets::{DeviceAttributeRequest, EcrMessage, KeyboardInputRequest, LocalMode, SendData};
use crate::Error;
use anyhow::Result;
use async_trait::async_trait;
use bbs_builder::PrintCommand;

/// Semantic failure a request handler reports back to the terminal.
///
/// Raising this from a handler produces a failure response on the wire and
/// nothing else; the connection stays up. Any other handler error is fatal
/// and tears the connection down.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct TerminalError(pub String);

/// A consumer of the requests the ITU sends while it is in bank mode.
///
/// Exactly one session is bound to a connection at a time. Handlers run on
/// the connection's receive worker and must not block on connection traffic;
/// a handler returns either a response message or `None` for a generic
/// success acknowledgement.
#[async_trait]
pub trait Session: Send + Sync {
    fn on_req_display_text(
        &self,
        text: &str,
        prompt_customer: bool,
        expects_input: bool,
    ) -> Result<Option<EcrMessage>> {
        let _ = (text, prompt_customer, expects_input);
        Ok(None)
    }

    fn on_req_print_text(&self, commands: &[PrintCommand]) -> Result<Option<EcrMessage>> {
        let _ = commands;
        Ok(None)
    }

    fn on_req_reset_timer(&self, seconds: u32) -> Result<Option<EcrMessage>> {
        let _ = seconds;
        Ok(None)
    }

    fn on_req_local_mode(&self, message: &LocalMode) -> Result<Option<EcrMessage>>;

    fn on_req_keyboard_input(
        &self,
        request: &KeyboardInputRequest,
    ) -> Result<Option<EcrMessage>> {
        let _ = request;
        Err(TerminalError("keyboard input is not supported".into()).into())
    }

    fn on_req_send_data(&self, message: &SendData) -> Result<Option<EcrMessage>> {
        let _ = message;
        Err(TerminalError("send data is not supported".into()).into())
    }

    fn on_req_device_attr(
        &self,
        request: &DeviceAttributeRequest,
    ) -> Result<Option<EcrMessage>> {
        let _ = request;
        Err(TerminalError("device attributes are not supported".into()).into())
    }

    /// Called when the session is replaced as the connection's current
    /// session. The session stays bound until this returns, so an in-flight
    /// cancel handshake can still see its local mode message.
    async fn unbind(&self) {}

    /// Called when the connection tears down with the session still bound.
    fn on_connection_closed(&self, err: Error) {
        let _ = err;
    }
}
