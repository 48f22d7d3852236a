use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Malformed terminal uri: {0}")]
    MalformedUri(String),

    #[error("Unrecognised terminal uri scheme: {0}")]
    NotSupported(String),

    #[error(transparent)]
    Driver(#[from] bbs::Error),
}
