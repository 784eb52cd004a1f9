use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::auth::models::AuthUser;
use crate::auth::provider::ProviderError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    #[serde(rename = "cognito:username", alias = "username", default)]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
    #[serde(default)]
    pub token_use: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenUse {
    Id,
    Access,
}

impl TokenUse {
    fn as_str(self) -> &'static str {
        match self {
            TokenUse::Id => "id",
            TokenUse::Access => "access",
        }
    }
}

/// Mints HS256 session tokens shaped like the hosted provider's.
pub struct SessionTokenIssuer {
    encoding_key: EncodingKey,
    token_lifetime: Duration,
}

impl SessionTokenIssuer {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            token_lifetime: Duration::hours(1),
        }
    }

    pub fn with_lifetime(mut self, token_lifetime: Duration) -> Self {
        self.token_lifetime = token_lifetime;
        self
    }

    pub fn issue(
        &self,
        user: &AuthUser,
        email: Option<&str>,
        token_use: TokenUse,
    ) -> Result<String, ProviderError> {
        let now = Utc::now();

        let claims = SessionClaims {
            sub: user.user_id.clone(),
            username: Some(user.username.clone()),
            email: email.map(str::to_string),
            exp: (now + self.token_lifetime).timestamp(),
            iat: now.timestamp(),
            token_use: token_use.as_str().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            ProviderError::InvalidSession(format!("Failed to generate {} token: {}", token_use.as_str(), e))
        })
    }
}

/// Decodes a token payload without checking its signature or expiry.
pub fn decode_unverified(token: &str) -> Result<SessionClaims, ProviderError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<SessionClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| ProviderError::InvalidSession(format!("Unreadable token: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> AuthUser {
        AuthUser {
            username: "alice".to_string(),
            user_id: "7d9f0c1e-0000-4000-8000-000000000001".to_string(),
            login_id: None,
        }
    }

    #[test]
    fn test_issue_and_decode() {
        let issuer = SessionTokenIssuer::new(b"0123456789abcdef0123456789abcdef");
        let token = issuer.issue(&user(), Some("alice@example.com"), TokenUse::Id).unwrap();

        let claims = decode_unverified(&token).unwrap();
        assert_eq!(claims.sub, "7d9f0c1e-0000-4000-8000-000000000001");
        assert_eq!(claims.username.as_deref(), Some("alice"));
        assert_eq!(claims.email.as_deref(), Some("alice@example.com"));
        assert_eq!(claims.token_use, "id");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(
            decode_unverified("not-a-token"),
            Err(ProviderError::InvalidSession(_))
        ));
    }
}
