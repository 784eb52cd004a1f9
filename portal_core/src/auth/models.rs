use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

use crate::auth::jwt::{decode_unverified, SessionClaims};
use crate::auth::provider::ProviderError;

/// Uniform outcome of every authentication call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResult<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub already_authenticated: bool,
}

impl<T> AuthResult<T> {
    pub fn ok(result: T) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            already_authenticated: false,
        }
    }

    pub fn already_authenticated(result: T) -> Self {
        Self {
            already_authenticated: true,
            ..Self::ok(result)
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            already_authenticated: false,
        }
    }
}

impl<T> From<Result<T, ProviderError>> for AuthResult<T> {
    fn from(result: Result<T, ProviderError>) -> Self {
        match result {
            Ok(value) => AuthResult::ok(value),
            Err(err) => AuthResult::failure(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub username: String,
    pub user_id: String,
    /// What the user typed to sign in, when it differs from `username`
    /// (for example an email address).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_id: Option<String>,
}

impl AuthUser {
    pub fn matches_login(&self, login: &str) -> bool {
        self.username.eq_ignore_ascii_case(login)
            || self
                .login_id
                .as_deref()
                .is_some_and(|login_id| login_id.eq_ignore_ascii_case(login))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignInStep {
    Done,
    ConfirmSignUp,
    ResetPassword,
    NewPasswordRequired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInOutput {
    pub is_signed_in: bool,
    pub next_step: SignInStep,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<AuthUser>,
}

impl SignInOutput {
    pub fn signed_in(user: AuthUser) -> Self {
        Self {
            is_signed_in: true,
            next_step: SignInStep::Done,
            user: Some(user),
        }
    }

    pub fn pending(next_step: SignInStep) -> Self {
        Self {
            is_signed_in: false,
            next_step,
            user: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SignUpRequest {
    #[validate(length(min = 1, max = 128, message = "Username is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl SignUpRequest {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            email: None,
            attributes: HashMap::new(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignUpStep {
    ConfirmSignUp,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpOutput {
    pub user_id: Option<String>,
    pub is_sign_up_complete: bool,
    pub next_step: SignUpStep,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmSignUpOutput {
    pub is_sign_up_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    pub id_token: String,
    pub access_token: String,
}

/// Session as reported by the provider. Signed-out sessions carry no tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub tokens: Option<AuthTokens>,
    pub user_sub: Option<String>,
}

impl AuthSession {
    pub fn is_signed_in(&self) -> bool {
        self.tokens.is_some()
    }

    /// Reads the ID token payload. The signature is not checked here; the
    /// backend verifies tokens on every request.
    pub fn id_token_claims(&self) -> Result<SessionClaims, ProviderError> {
        let tokens = self
            .tokens
            .as_ref()
            .ok_or(ProviderError::NotAuthenticated)?;

        decode_unverified(&tokens.id_token)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.id_token_claims() {
            Ok(claims) => claims.exp <= now.timestamp(),
            Err(_) => true,
        }
    }
}
