pub mod models;
pub mod validation;

pub use models::{format_file_size, get_file_metadata, FileDescriptor, FileMetadata};
pub use validation::{
    DocumentFormat, FileValidationConfig, FileValidator, OversizeSeverity, Rejection,
    ValidationErrorCode, ValidationResult, DOCUMENT_FORMATS,
};
