//! Response envelope returned by every provider RPC.

use serde::{Deserialize, Serialize};

/// Category of a failed request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Security token mismatch on an admin operation.
    Auth,
    /// Sequencer configuration is not a valid JSON object.
    ConfigParse,
    /// No backend registered under the requested type name.
    UnknownBackendType,
    /// The backend constructor failed.
    BackendConstruction,
    /// No live sequencer with the requested id.
    NotFound,
    /// A backend operation (domain call or destroy) failed.
    BackendOperation,
}

/// Failure half of an envelope, as seen by the caller.
///
/// Displays as the server's message verbatim.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct RemoteError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Tagged result of one request: either a value or an error, never both.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RequestResult<T> {
    Success { value: T },
    Failure { kind: ErrorKind, error: String },
}

impl<T> RequestResult<T> {
    pub fn ok(value: T) -> Self {
        Self::Success { value }
    }

    pub fn err(kind: ErrorKind, error: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            error: error.into(),
        }
    }

    pub fn success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Success { value } => Some(value),
            Self::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error, .. } => Some(error),
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RequestResult<U> {
        match self {
            Self::Success { value } => RequestResult::Success { value: f(value) },
            Self::Failure { kind, error } => RequestResult::Failure { kind, error },
        }
    }

    pub fn into_result(self) -> Result<T, RemoteError> {
        match self {
            Self::Success { value } => Ok(value),
            Self::Failure { kind, error } => Err(RemoteError {
                kind,
                message: error,
            }),
        }
    }
}

impl<T> From<RequestResult<T>> for Result<T, RemoteError> {
    fn from(r: RequestResult<T>) -> Self {
        r.into_result()
    }
}

impl<T> From<Result<T, RemoteError>> for RequestResult<T> {
    fn from(r: Result<T, RemoteError>) -> Self {
        match r {
            Ok(value) => Self::ok(value),
            Err(e) => Self::err(e.kind, e.message),
        }
    }
}

impl RemoteError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
