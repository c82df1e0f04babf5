use thiserror::Error;

/// Result type for guarded operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error produced by caller-supplied operations
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Policy error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("circuit breaker is open")]
    CircuitOpen,

    #[error("circuit breaker half-open: too many concurrent requests")]
    CircuitTooManyRequests,

    #[error("circuit breaker tripped after consecutive failures")]
    CircuitTripped {
        #[source]
        source: Box<Error>,
    },

    #[error("context canceled")]
    Canceled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error("{0}")]
    ShortCircuit(#[source] Box<Error>),

    #[error("{0}")]
    Operation(#[source] BoxError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Wrap a caller error
    pub fn operation<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Error::Operation(err.into())
    }

    /// Build an operation error from a message
    pub fn msg(message: impl Into<String>) -> Self {
        Error::Operation(message.into().into())
    }

    /// The call was never attempted because the breaker refused it
    pub fn is_rejection(&self) -> bool {
        matches!(self, Error::CircuitOpen | Error::CircuitTooManyRequests)
    }

    /// The error came from the execution context rather than the operation
    pub fn is_context_error(&self) -> bool {
        matches!(self, Error::Canceled | Error::DeadlineExceeded)
    }

    pub fn is_tripped(&self) -> bool {
        matches!(self, Error::CircuitTripped { .. })
    }

    /// Marked final by a short-circuit policy; retries must not continue
    pub fn is_short_circuit(&self) -> bool {
        matches!(self, Error::ShortCircuit(_))
    }

    /// Strip short-circuit marking, returning the error underneath
    pub fn into_inner(self) -> Error {
        match self {
            Error::ShortCircuit(inner) => inner.into_inner(),
            other => other,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Operation(err.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Operation(Box::new(err))
    }
}
