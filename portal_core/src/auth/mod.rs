pub mod jwt;
pub mod memory;
pub mod models;
pub mod provider;
pub mod service;


pub use jwt::{decode_unverified, SessionClaims, SessionTokenIssuer, TokenUse};
pub use memory::MemoryIdentityProvider;
pub use models::*;
pub use provider::{IdentityProvider, ProviderError};
pub use service::AuthService;
