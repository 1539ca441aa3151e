use crate::result::{ErrorKind, RemoteError};
use crate::transport::TransportError;

/// Error raised by admin and client calls.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The provider answered with a failure envelope; `message` is verbatim.
    #[error("{message}")]
    Remote { kind: ErrorKind, message: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("malformed reply: {0}")]
    Decode(#[from] serde_json::Error),
}

impl Error {
    /// Kind carried by a failure envelope, if this is one.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Remote { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == Some(ErrorKind::NotFound)
    }
}

impl From<RemoteError> for Error {
    fn from(e: RemoteError) -> Self {
        Self::Remote {
            kind: e.kind,
            message: e.message,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
