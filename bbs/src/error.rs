use bbs_builder::CodecError;
use thiserror::Error;

/// Connection and session level failures.
///
/// The enum is cheap to clone so one failure can be fanned out to every
/// caller waiting on the same item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Frame payload length {0} is outside the valid range")]
    InvalidFrameLength(usize),

    #[error("End of stream")]
    EndOfStream,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Request was sent but the connection closed before a response arrived")]
    ResponseInterrupted,

    #[error("Request was cancelled before it was written")]
    RequestCancelled,

    #[error("Connection is shut down")]
    ConnectionClosed,

    #[error("Operation is not implemented by the driver")]
    NotImplemented,

    #[error("Session has already reached a terminal state")]
    SessionCompleted,

    #[error("Session ended without committing")]
    SessionCancelled { reason: Option<&'static str> },

    #[error("Cancellation could not complete; the payment may remain posted")]
    CancelFailed,

    #[error("Timed out waiting for a result")]
    Timeout,
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => Error::EndOfStream,
            _ => Error::Io(err.to_string()),
        }
    }
}
