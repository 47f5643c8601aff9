use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("only the host may do this")]
    NotHost,
    #[error("local identity is already confirmed")]
    IdentityAlreadyConfirmed,
    #[error("local identity has not been confirmed")]
    IdentityNotConfirmed,
    #[error("session has been torn down")]
    Closed,
    #[error("identity store: {0}")]
    Identity(String),
}
