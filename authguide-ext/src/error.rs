use thiserror::Error;

/// Outcome of a failed authentication call.
///
/// Only [`AuthError::AuthFailed`] is a regular rejection. Every other variant
/// means the decision could not be taken and must be surfaced as an internal
/// error by the host.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("{0}")]
    AuthFailed(String),
    #[error("required context field '{0}' is missing")]
    MissingContextField(&'static str),
    #[error("no authentication mechanism registered as '{0}'")]
    UnknownMechanism(String),
    #[error("no authentication mechanism configured for account {0}")]
    NoMechanism(String),
    #[error("internal authentication error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::AuthFailed(_))
    }
}

/// Failure while loading an extension into the host.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtensionError {
    #[error("an authentication mechanism is already registered as '{0}'")]
    DuplicateMechanism(String),
    #[error("'{0}' is not a valid mechanism identifier")]
    InvalidMechanism(String),
}
