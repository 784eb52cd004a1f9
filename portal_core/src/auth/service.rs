use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::auth::models::{
    AuthResult, AuthSession, AuthUser, ConfirmSignUpOutput, SignInOutput, SignUpOutput,
    SignUpRequest,
};
use crate::auth::provider::{IdentityProvider, ProviderError};
use crate::error::AppError;

const SIGN_OUT_RECOVERY_FAILED: &str = "Failed to sign out existing session";

/// Front door for every identity action. Failures come back inside
/// [`AuthResult`], never as `Err`.
#[derive(Clone)]
pub struct AuthService {
    provider: Arc<dyn IdentityProvider>,
}

impl AuthService {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    /// Signs in, first checking who (if anyone) already holds the session.
    ///
    /// The same login short-circuits with `already_authenticated`. A different
    /// login is signed out, then the provider gets exactly one sign-in attempt.
    pub async fn sign_in(&self, username: &str, password: &str) -> AuthResult<SignInOutput> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return AuthResult::failure("Username and password are required");
        }

        if let Some(current) = self.signed_in_user().await {
            if current.matches_login(username) {
                info!("User {} is already signed in", current.username);
                return AuthResult::already_authenticated(SignInOutput::signed_in(current));
            }

            info!(
                "Signing out {} before signing in as {}",
                current.username, username
            );
            if let Err(e) = self.provider.sign_out().await {
                warn!("Could not sign out {}: {}", current.username, e);
                return AuthResult::failure(SIGN_OUT_RECOVERY_FAILED);
            }
        }

        match self.provider.sign_in(username, password).await {
            Ok(output) => {
                debug!("Sign-in for {} finished with step {:?}", username, output.next_step);
                AuthResult::ok(output)
            }
            Err(ProviderError::AlreadyAuthenticated) => {
                warn!("Provider still reports an active session after sign-out");
                AuthResult::failure(ProviderError::AlreadyAuthenticated.to_string())
            }
            Err(e) => {
                debug!("Sign-in for {} failed: {}", username, e);
                AuthResult::failure(e.to_string())
            }
        }
    }

    pub async fn sign_up(&self, request: SignUpRequest) -> AuthResult<SignUpOutput> {
        if let Err(errors) = request.validate() {
            return AuthResult::failure(AppError::from(errors).to_string());
        }

        let result = self.provider.sign_up(&request).await;
        if let Ok(output) = &result {
            info!(
                "Registered {} (complete: {})",
                request.username, output.is_sign_up_complete
            );
        }
        result.into()
    }

    pub async fn confirm_sign_up(&self, username: &str, code: &str) -> AuthResult<ConfirmSignUpOutput> {
        let code = code.trim();
        if code.is_empty() {
            return AuthResult::failure("Confirmation code is required");
        }

        self.provider.confirm_sign_up(username.trim(), code).await.into()
    }

    pub async fn sign_out(&self) -> AuthResult<()> {
        let result = self.provider.sign_out().await;
        if let Err(e) = &result {
            warn!("Sign-out failed: {}", e);
        }
        result.into()
    }

    pub async fn current_session(&self) -> AuthResult<AuthSession> {
        self.provider.fetch_session().await.into()
    }

    pub async fn current_user(&self) -> AuthResult<AuthUser> {
        match self.provider.current_user().await {
            Ok(Some(user)) => AuthResult::ok(user),
            Ok(None) => AuthResult::failure(ProviderError::NotAuthenticated.to_string()),
            Err(e) => AuthResult::failure(e.to_string()),
        }
    }

    pub async fn is_authenticated(&self) -> bool {
        self.signed_in_user().await.is_some()
    }

    async fn signed_in_user(&self) -> Option<AuthUser> {
        match self.provider.current_user().await {
            Ok(user) => user,
            Err(ProviderError::NotAuthenticated) => None,
            Err(e) => {
                warn!("Could not determine current user, assuming signed out: {}", e);
                None
            }
        }
    }
}
