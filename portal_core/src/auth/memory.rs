use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::jwt::{SessionTokenIssuer, TokenUse};
use crate::auth::models::{
    AuthSession, AuthTokens, AuthUser, ConfirmSignUpOutput, SignInOutput, SignInStep,
    SignUpOutput, SignUpRequest, SignUpStep,
};
use crate::auth::provider::{IdentityProvider, ProviderError};

const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Clone)]
struct StoredUser {
    user_id: String,
    username: String,
    email: Option<String>,
    password_hash: String,
    confirmed: bool,
    confirmation_code: Option<String>,
}

impl StoredUser {
    fn to_auth_user(&self, login_id: Option<&str>) -> AuthUser {
        AuthUser {
            username: self.username.clone(),
            user_id: self.user_id.clone(),
            login_id: login_id.map(str::to_string),
        }
    }
}

struct Inner {
    users: RwLock<HashMap<String, StoredUser>>,
    current: RwLock<Option<AuthUser>>,
    tokens: SessionTokenIssuer,
    argon2: Argon2<'static>,
    sign_out_calls: AtomicUsize,
    fail_sign_out: AtomicBool,
}

/// Identity provider kept entirely in memory, with the same observable
/// behaviour as the hosted one: confirmation before sign-in, a single active
/// session, JWT session tokens.
#[derive(Clone)]
pub struct MemoryIdentityProvider {
    inner: Arc<Inner>,
}

impl Default for MemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        let secret = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        // Lighter than the argon2 defaults: these hashes never leave the process.
        let params = Params::new(4096, 1, 1, None).unwrap_or_default();

        Self {
            inner: Arc::new(Inner {
                users: RwLock::new(HashMap::new()),
                current: RwLock::new(None),
                tokens: SessionTokenIssuer::new(secret.as_bytes()),
                argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
                sign_out_calls: AtomicUsize::new(0),
                fail_sign_out: AtomicBool::new(false),
            }),
        }
    }

    /// Registers an already-confirmed user.
    pub fn add_confirmed_user(
        &self,
        username: &str,
        password: &str,
        email: Option<&str>,
    ) -> Result<AuthUser, ProviderError> {
        let user = StoredUser {
            user_id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: email.map(str::to_string),
            password_hash: self.hash_password(password)?,
            confirmed: true,
            confirmation_code: None,
        };

        let auth_user = user.to_auth_user(None);
        self.inner.users.write().insert(key(username), user);
        Ok(auth_user)
    }

    pub fn confirmation_code(&self, username: &str) -> Option<String> {
        self.inner
            .users
            .read()
            .get(&key(username))
            .and_then(|user| user.confirmation_code.clone())
    }

    pub fn sign_out_calls(&self) -> usize {
        self.inner.sign_out_calls.load(Ordering::SeqCst)
    }

    pub fn fail_sign_out(&self, fail: bool) {
        self.inner.fail_sign_out.store(fail, Ordering::SeqCst);
    }

    fn find_user(&self, login: &str) -> Option<StoredUser> {
        let users = self.inner.users.read();
        users.get(&key(login)).cloned().or_else(|| {
            users
                .values()
                .find(|user| {
                    user.email
                        .as_deref()
                        .is_some_and(|email| email.eq_ignore_ascii_case(login))
                })
                .cloned()
        })
    }

    fn hash_password(&self, password: &str) -> Result<String, ProviderError> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = self
            .inner
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| ProviderError::Unknown(format!("Failed to hash password: {}", e)))?;

        Ok(password_hash.to_string())
    }

    fn verify_password(&self, password: &str, hash: &str) -> Result<bool, ProviderError> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| ProviderError::Unknown(format!("Invalid password hash: {}", e)))?;

        Ok(self
            .inner
            .argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }
}

fn key(username: &str) -> String {
    username.trim().to_lowercase()
}

fn confirmation_code() -> String {
    format!("{:06}", Uuid::new_v4().as_u128() % 1_000_000)
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn sign_in(&self, username: &str, password: &str) -> Result<SignInOutput, ProviderError> {
        if self.inner.current.read().is_some() {
            return Err(ProviderError::AlreadyAuthenticated);
        }

        let user = self.find_user(username).ok_or(ProviderError::UserNotFound)?;

        if !self.verify_password(password, &user.password_hash)? {
            return Err(ProviderError::NotAuthorized);
        }

        if !user.confirmed {
            return Ok(SignInOutput::pending(SignInStep::ConfirmSignUp));
        }

        let login_id = (!user.username.eq_ignore_ascii_case(username)).then_some(username);
        let auth_user = user.to_auth_user(login_id);
        *self.inner.current.write() = Some(auth_user.clone());

        Ok(SignInOutput::signed_in(auth_user))
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutput, ProviderError> {
        if request.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ProviderError::InvalidPassword(
                "Password not long enough".to_string(),
            ));
        }

        if self.inner.users.read().contains_key(&key(&request.username)) {
            return Err(ProviderError::UsernameExists);
        }

        let user = StoredUser {
            user_id: Uuid::new_v4().to_string(),
            username: request.username.trim().to_string(),
            email: request.email.clone(),
            password_hash: self.hash_password(&request.password)?,
            confirmed: false,
            confirmation_code: Some(confirmation_code()),
        };
        let user_id = user.user_id.clone();

        let mut users = self.inner.users.write();
        if users.contains_key(&key(&request.username)) {
            return Err(ProviderError::UsernameExists);
        }
        users.insert(key(&request.username), user);

        Ok(SignUpOutput {
            user_id: Some(user_id),
            is_sign_up_complete: false,
            next_step: SignUpStep::ConfirmSignUp,
        })
    }

    async fn confirm_sign_up(&self, username: &str, code: &str) -> Result<ConfirmSignUpOutput, ProviderError> {
        let mut users = self.inner.users.write();
        let user = users
            .get_mut(&key(username))
            .ok_or(ProviderError::UserNotFound)?;

        if user.confirmed {
            return Ok(ConfirmSignUpOutput {
                is_sign_up_complete: true,
            });
        }

        if user.confirmation_code.as_deref() != Some(code) {
            return Err(ProviderError::CodeMismatch);
        }

        user.confirmed = true;
        user.confirmation_code = None;

        Ok(ConfirmSignUpOutput {
            is_sign_up_complete: true,
        })
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.inner.sign_out_calls.fetch_add(1, Ordering::SeqCst);

        if self.inner.fail_sign_out.load(Ordering::SeqCst) {
            return Err(ProviderError::Network("sign-out request failed".to_string()));
        }

        *self.inner.current.write() = None;
        Ok(())
    }

    async fn current_user(&self) -> Result<Option<AuthUser>, ProviderError> {
        Ok(self.inner.current.read().clone())
    }

    async fn fetch_session(&self) -> Result<AuthSession, ProviderError> {
        let Some(current) = self.inner.current.read().clone() else {
            return Ok(AuthSession::default());
        };

        let email = self
            .find_user(&current.username)
            .and_then(|user| user.email);

        let tokens = AuthTokens {
            id_token: self.inner.tokens.issue(&current, email.as_deref(), TokenUse::Id)?,
            access_token: self.inner.tokens.issue(&current, None, TokenUse::Access)?,
        };

        Ok(AuthSession {
            tokens: Some(tokens),
            user_sub: Some(current.user_id),
        })
    }
}
