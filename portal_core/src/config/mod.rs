pub mod settings;

pub use settings::{ApiConfig, AppConfig, IdentityConfig, RetryConfig, StorageConfig, UploadConfig};
