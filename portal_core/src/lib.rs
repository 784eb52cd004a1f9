//! Core library for the document portal: upload validation, authentication
//! and user feedback around batch document processing.

pub mod auth;
pub mod batch;
pub mod config;
pub mod error;
pub mod files;
pub mod notify;

pub use auth::{AuthResult, AuthService, AuthSession, AuthUser, IdentityProvider, MemoryIdentityProvider, ProviderError};
pub use batch::{BatchOutcome, BatchProcessor, RetryPolicy};
pub use crate::config::AppConfig;
pub use error::{AppError, Result};
pub use files::{FileDescriptor, FileValidator, ValidationErrorCode, ValidationResult};
pub use notify::{NotificationKind, NotificationSink, Notifier, TracingSink};
