//! Error types for the challenge host.

/// Main error types for the library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Client input is malformed or has the wrong shape.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Invalid group or budget parameters were provided.
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// A group element is out of range, degenerate or in a weak subgroup.
    #[error("Invalid group element: {0}")]
    InvalidGroupElement(String),

    /// The client asked for something the session can no longer do.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// The server cannot take another session right now.
    #[error("Server unavailable: {0}")]
    AtCapacity(String),

    /// The hosted primitive could not produce a result.
    #[error("Primitive failure: {0}")]
    PrimitiveFailure(String),

    /// Transport failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the session can keep going after replying with this error.
    ///
    /// Validation errors reject a single message; everything else ends the session.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::InvalidParams(_) | Error::InvalidGroupElement(_)
        )
    }
}
