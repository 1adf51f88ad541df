use db::{models::Role, StorageError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("remote backend is not configured")]
    Unavailable,

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RemoteError {
    pub fn is_invalid_credentials(&self) -> bool {
        match self {
            RemoteError::Api { message, .. } => message.contains("Invalid login credentials"),
            _ => false,
        }
    }

    pub fn is_already_registered(&self) -> bool {
        match self {
            RemoteError::Api { message, .. } => message.contains("already registered"),
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("no {role} account uses {email}")]
    UnknownAccount { email: String, role: Role },

    #[error("{0} passwords are reset by an administrator")]
    ResetByAdmin(Role),

    #[error("invalid verification code")]
    InvalidCode,

    #[error("password must be at least {0} characters")]
    PasswordTooShort(usize),
}
