use std::error::Error as StdError;
use std::fmt::{self, Display};

use qed_model::ModelProviderError;

/// Where a failure originated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The completion backend failed.
    Model(qed_model::ErrorKind),
    /// Scene code could not be produced from the model output.
    Generation,
    /// The rendering service failed, or gave up.
    Render,
    /// The client went away while events were being written.
    Disconnected,
}

/// Error type of the orchestrators.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    /// Creates a new error.
    #[inline]
    pub fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    pub(crate) fn from_provider<E: ModelProviderError>(err: &E) -> Self {
        Self::new(err.to_string(), ErrorKind::Model(err.kind()))
    }

    pub(crate) fn disconnected() -> Self {
        Self::new("client disconnected", ErrorKind::Disconnected)
    }

    /// Returns the human-readable message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}
