use crate::clients::github::ApiResponse;
use crate::clients::github::RateLimit;

/// Classification of a failed file, branch or repository operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    Conflict,
    PayloadTooLarge,
    Transient,
    RemoteError,
    NoContextSelected,
    InvalidInput,
}

#[derive(Debug, thiserror::Error)]
pub enum OpError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    AlreadyExists(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Content is {len} characters long; the limit is {max}")]
    PayloadTooLarge { len: usize, max: usize },
    #[error("{0}")]
    Transient(String),
    #[error("GitHub error ({status}): {message}")]
    Remote { status: u16, message: String },
    #[error("No repository selected. Pick one with the repo command first.")]
    NoContextSelected,
    #[error("{0}")]
    InvalidInput(String),
}

impl OpError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            Self::Transient(_) => ErrorKind::Transient,
            Self::Remote { .. } => ErrorKind::RemoteError,
            Self::NoContextSelected => ErrorKind::NoContextSelected,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }

    /// Default translation of an unexpected response
    pub fn from_response(resp: &ApiResponse) -> Self {
        if resp.is(408) {
            Self::Transient(resp.message())
        } else {
            Self::Remote {
                status: resp.status,
                message: resp.message(),
            }
        }
    }
}

/// A successful operation: what to tell the user, plus any payload.
#[derive(Debug)]
pub struct Done<T = ()> {
    pub message: String,
    pub value: T,
    pub rate_limit: Option<RateLimit>,
}

impl Done<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            value: (),
            rate_limit: None,
        }
    }
}

impl<T> Done<T> {
    pub fn new(message: impl Into<String>, value: T) -> Self {
        Self {
            message: message.into(),
            value,
            rate_limit: None,
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: Option<RateLimit>) -> Self {
        self.rate_limit = rate_limit;
        self
    }
}

pub type OpResult<T = ()> = Result<Done<T>, OpError>;

/// Flatten an outcome into the `(success, message)` pair shown to users
pub fn reply<T>(result: &OpResult<T>) -> (bool, String) {
    match result {
        Ok(done) => (true, done.message.clone()),
        Err(err) => (false, err.to_string()),
    }
}
