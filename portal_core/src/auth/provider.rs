use async_trait::async_trait;
use thiserror::Error;

use crate::auth::models::{
    AuthSession, AuthUser, ConfirmSignUpOutput, SignInOutput, SignUpOutput, SignUpRequest,
};

/// Named failure conditions an identity provider can report.
///
/// Display strings are the provider's own wording; they are passed through
/// to callers unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("There is already a signed in user.")]
    AlreadyAuthenticated,

    #[error("User needs to be authenticated to call this API.")]
    NotAuthenticated,

    #[error("User does not exist.")]
    UserNotFound,

    #[error("Incorrect username or password.")]
    NotAuthorized,

    #[error("User already exists")]
    UsernameExists,

    #[error("User is not confirmed.")]
    UserNotConfirmed,

    #[error("Invalid verification code provided, please try again.")]
    CodeMismatch,

    #[error("Invalid code provided, please request a code again.")]
    ExpiredCode,

    #[error("Password does not conform to policy: {0}")]
    InvalidPassword(String),

    #[error("Attempt limit exceeded, please try after some time.")]
    LimitExceeded,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid session: {0}")]
    InvalidSession(String),

    #[error("{0}")]
    Unknown(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Network(_) | ProviderError::LimitExceeded)
    }
}

/// The external identity service. Implementations talk to the real SDK;
/// [`crate::auth::MemoryIdentityProvider`] keeps everything in process.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, username: &str, password: &str) -> Result<SignInOutput, ProviderError>;
    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutput, ProviderError>;
    async fn confirm_sign_up(&self, username: &str, code: &str) -> Result<ConfirmSignUpOutput, ProviderError>;
    async fn sign_out(&self) -> Result<(), ProviderError>;
    /// `Ok(None)` when nobody is signed in.
    async fn current_user(&self) -> Result<Option<AuthUser>, ProviderError>;
    async fn fetch_session(&self) -> Result<AuthSession, ProviderError>;
}
