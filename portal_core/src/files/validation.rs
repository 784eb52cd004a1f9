use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use mime::Mime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::models::{extension_of, format_file_size, FileDescriptor};
use crate::config::UploadConfig;

const GENERIC_MIME_TYPE: &str = "application/octet-stream";
const MAX_FILENAME_LENGTH: usize = 255;
const SMALL_FILE_THRESHOLD: i64 = 100;

const EXECUTABLE_EXTENSIONS: [&str; 13] = [
    "exe", "bat", "cmd", "com", "scr", "pif", "vbs", "js", "jar", "msi", "sh", "ps1", "dll",
];

// Segments that hide a payload when they sit before the real extension.
const DISGUISE_EXTENSIONS: [&str; 17] = [
    "zip", "rar", "7z", "tar", "gz", "iso", "py", "pl", "php", "rb", "hta", "wsf", "lnk", "html",
    "htm", "svg", "reg",
];

const RESERVED_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

lazy_static! {
    static ref INVALID_FILENAME_CHARS: Regex =
        Regex::new(r#"[<>:"/\\|?*\x00-\x1F\x7F\x{202A}-\x{202E}\x{2066}-\x{2069}]"#).unwrap();
    static ref EXECUTABLE_SUFFIX: Regex = Regex::new(&format!(
        r"(?i)\.({})$",
        EXECUTABLE_EXTENSIONS.join("|")
    ))
    .unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationErrorCode {
    NoFile,
    InvalidFileObject,
    EmptyFile,
    FileTooLarge,
    UnsupportedMimeType,
    UnsupportedExtension,
    SuspiciousFilename,
    FilenameTooLong,
    MultipleExtensions,
}

impl fmt::Display for ValidationErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            ValidationErrorCode::NoFile => "NO_FILE",
            ValidationErrorCode::InvalidFileObject => "INVALID_FILE_OBJECT",
            ValidationErrorCode::EmptyFile => "EMPTY_FILE",
            ValidationErrorCode::FileTooLarge => "FILE_TOO_LARGE",
            ValidationErrorCode::UnsupportedMimeType => "UNSUPPORTED_MIME_TYPE",
            ValidationErrorCode::UnsupportedExtension => "UNSUPPORTED_EXTENSION",
            ValidationErrorCode::SuspiciousFilename => "SUSPICIOUS_FILENAME",
            ValidationErrorCode::FilenameTooLong => "FILENAME_TOO_LONG",
            ValidationErrorCode::MultipleExtensions => "MULTIPLE_EXTENSIONS",
        };
        f.write_str(code)
    }
}

/// How far past the size limit a file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OversizeSeverity {
    Slight,
    Double,
    Much,
    Far,
}

impl OversizeSeverity {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > 10.0 {
            OversizeSeverity::Far
        } else if ratio > 5.0 {
            OversizeSeverity::Much
        } else if ratio > 2.0 {
            OversizeSeverity::Double
        } else {
            OversizeSeverity::Slight
        }
    }

    fn message(self, size: &str, max: &str) -> String {
        match self {
            OversizeSeverity::Far => format!(
                "File size ({}) far exceeds the {} limit. Split the document into several smaller files before uploading.",
                size, max
            ),
            OversizeSeverity::Much => format!(
                "File size ({}) is much larger than the {} limit. Compress embedded images or remove media, or split the document.",
                size, max
            ),
            OversizeSeverity::Double => format!(
                "File size ({}) is more than double the {} limit. Try compressing the document or saving it in a more compact format.",
                size, max
            ),
            OversizeSeverity::Slight => format!(
                "File size ({}) is slightly larger than the {} limit. Try compressing the document or removing a few pages.",
                size, max
            ),
        }
    }
}

/// Outcome of a single validation call. Failures are data, never errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub mime_type: Option<String>,
    pub file_name: Option<String>,
    pub file_size: i64,
    pub error_message: Option<String>,
    pub error_code: Option<ValidationErrorCode>,
    pub supported_formats: Vec<String>,
    pub max_size_formatted: String,
}

/// A rejected filename: the code to report and the message to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub code: ValidationErrorCode,
    pub message: String,
}

impl Rejection {
    fn new(code: ValidationErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFormat {
    pub label: &'static str,
    pub mime_type: &'static str,
    pub extensions: &'static [&'static str],
}

pub const DOCUMENT_FORMATS: [DocumentFormat; 4] = [
    DocumentFormat {
        label: "PDF",
        mime_type: "application/pdf",
        extensions: &["pdf"],
    },
    DocumentFormat {
        label: "DOC",
        mime_type: "application/msword",
        extensions: &["doc"],
    },
    DocumentFormat {
        label: "DOCX",
        mime_type: "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        extensions: &["docx"],
    },
    DocumentFormat {
        label: "TXT",
        mime_type: "text/plain",
        extensions: &["txt"],
    },
];

#[derive(Debug, Clone)]
pub struct FileValidationConfig {
    pub max_file_size: u64,
    pub formats: Vec<DocumentFormat>,
}

impl Default for FileValidationConfig {
    fn default() -> Self {
        Self {
            max_file_size: 5 * 1024 * 1024,
            formats: DOCUMENT_FORMATS.to_vec(),
        }
    }
}

impl From<&UploadConfig> for FileValidationConfig {
    fn from(upload: &UploadConfig) -> Self {
        Self {
            max_file_size: upload.max_file_size_bytes,
            ..Self::default()
        }
    }
}

enum DeclaredType {
    Generic,
    Concrete(String),
}

fn classify_declared(raw: Option<&str>) -> DeclaredType {
    let raw = match raw.map(str::trim) {
        None | Some("") => return DeclaredType::Generic,
        Some(raw) => raw,
    };

    match raw.parse::<Mime>() {
        Ok(parsed) => {
            let essence = parsed.essence_str().to_ascii_lowercase();
            if essence == GENERIC_MIME_TYPE {
                DeclaredType::Generic
            } else {
                DeclaredType::Concrete(essence)
            }
        }
        Err(_) => DeclaredType::Concrete(raw.to_ascii_lowercase()),
    }
}

#[derive(Debug, Clone)]
pub struct FileValidator {
    config: FileValidationConfig,
}

impl FileValidator {
    pub fn new(config: FileValidationConfig) -> Self {
        Self { config }
    }

    pub fn with_default_config() -> Self {
        Self::new(FileValidationConfig::default())
    }

    pub fn config(&self) -> &FileValidationConfig {
        &self.config
    }

    /// Runs every check in order; the first failure decides the result.
    pub fn validate(&self, file: Option<&FileDescriptor>) -> ValidationResult {
        let Some(file) = file else {
            return self.rejected(
                None,
                Rejection::new(
                    ValidationErrorCode::NoFile,
                    "No file selected. Please choose a document to upload.",
                ),
            );
        };

        match self.run_checks(file) {
            Ok(mime_type) => self.accepted(file, mime_type),
            Err(rejection) => self.rejected(Some(file), rejection),
        }
    }

    pub fn validate_file(&self, file: &FileDescriptor) -> ValidationResult {
        self.validate(Some(file))
    }

    /// Validates a loosely-typed descriptor such as a deserialized form payload.
    pub fn validate_value(&self, value: &Value) -> ValidationResult {
        if value.is_null() {
            return self.validate(None);
        }

        match descriptor_from_value(value) {
            Some(file) => self.validate(Some(&file)),
            None => ValidationResult {
                file_name: value
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                ..self.rejected(None, invalid_file_object())
            },
        }
    }

    fn run_checks(&self, file: &FileDescriptor) -> Result<String, Rejection> {
        if file.name.trim().is_empty() {
            return Err(invalid_file_object());
        }

        self.check_size(file)?;
        let declared = self.check_mime_type(file)?;
        let extension = self.check_extension(&file.name)?;
        self.check_filename_security(&file.name)?;

        let mime_type = match declared {
            DeclaredType::Concrete(mime_type) => mime_type,
            DeclaredType::Generic => self
                .mime_for_extension(&extension)
                .unwrap_or_else(|| GENERIC_MIME_TYPE.to_string()),
        };

        Ok(mime_type)
    }

    fn check_size(&self, file: &FileDescriptor) -> Result<(), Rejection> {
        if file.size <= 0 {
            return Err(Rejection::new(
                ValidationErrorCode::EmptyFile,
                "The selected file is empty. Please choose a file with content.",
            ));
        }

        let size = file.size as u64;
        if size > self.config.max_file_size {
            let ratio = size as f64 / self.config.max_file_size as f64;
            let message = OversizeSeverity::from_ratio(ratio)
                .message(&format_file_size(size), &self.max_size_formatted());
            return Err(Rejection::new(ValidationErrorCode::FileTooLarge, message));
        }

        if file.size < SMALL_FILE_THRESHOLD {
            tracing::warn!(
                "File {} is only {} bytes; it may not contain useful content",
                file.name,
                file.size
            );
        }

        Ok(())
    }

    fn check_mime_type(&self, file: &FileDescriptor) -> Result<DeclaredType, Rejection> {
        let declared = classify_declared(file.mime_type.as_deref());

        if let DeclaredType::Concrete(mime_type) = &declared {
            if !self.is_supported_mime_type(mime_type) {
                return Err(Rejection::new(
                    ValidationErrorCode::UnsupportedMimeType,
                    format!(
                        "Files of type '{}' are not supported. Please upload a {} document.",
                        mime_type,
                        self.supported_formats_description()
                    ),
                ));
            }
        }

        Ok(declared)
    }

    fn check_extension(&self, name: &str) -> Result<String, Rejection> {
        match extension_of(name) {
            Some(ext) if self.is_supported_extension(&ext) => Ok(ext),
            Some(ext) => Err(Rejection::new(
                ValidationErrorCode::UnsupportedExtension,
                format!(
                    "Files with the .{} extension are not supported. Please upload a {} document.",
                    ext,
                    self.supported_formats_description()
                ),
            )),
            None => Err(Rejection::new(
                ValidationErrorCode::UnsupportedExtension,
                format!(
                    "The file has no extension. Please upload a {} document.",
                    self.supported_formats_description()
                ),
            )),
        }
    }

    /// Screens a filename for patterns commonly used to disguise or smuggle
    /// content. Usable on its own, independent of size and type checks.
    pub fn check_filename_security(&self, name: &str) -> Result<(), Rejection> {
        if name.contains('\0') {
            return Err(suspicious("The file name contains a null byte."));
        }

        if name.chars().count() > MAX_FILENAME_LENGTH {
            return Err(Rejection::new(
                ValidationErrorCode::FilenameTooLong,
                format!(
                    "The file name is too long ({} characters). Please shorten it to {} characters or fewer.",
                    name.chars().count(),
                    MAX_FILENAME_LENGTH
                ),
            ));
        }

        if name.starts_with('.') {
            return Err(suspicious("Hidden files (names starting with a dot) cannot be uploaded."));
        }

        if name
            .split('.')
            .next()
            .is_some_and(|stem| stem.trim().is_empty())
        {
            return Err(suspicious(
                "The file name is blank before its extension. Please rename the file.",
            ));
        }

        if INVALID_FILENAME_CHARS.is_match(name) {
            return Err(suspicious(
                "The file name contains characters that are not allowed. Please rename the file and try again.",
            ));
        }

        let stem = name.split('.').next().unwrap_or(name).trim().to_uppercase();
        if RESERVED_NAMES.contains(&stem.as_str()) {
            return Err(suspicious("The file name is reserved by the operating system. Please rename the file."));
        }

        let segments: Vec<&str> = name.split('.').collect();
        if segments.len() > 2 {
            let intermediate = &segments[1..segments.len() - 1];
            if let Some(segment) = intermediate
                .iter()
                .find(|segment| self.is_disallowed_extension_segment(segment))
            {
                return Err(Rejection::new(
                    ValidationErrorCode::MultipleExtensions,
                    format!(
                        "The file name contains a hidden .{} extension. Please rename the file so it has a single document extension.",
                        segment.to_ascii_lowercase()
                    ),
                ));
            }
        }

        if EXECUTABLE_SUFFIX.is_match(name) {
            return Err(suspicious("Executable files cannot be uploaded."));
        }

        Ok(())
    }

    /// An intermediate segment is disallowed when it names an executable,
    /// archive or script; "C" or "md" in `Section.C.notes.md.pdf` are not.
    fn is_disallowed_extension_segment(&self, segment: &str) -> bool {
        let segment = segment.trim().to_ascii_lowercase();
        if segment.is_empty() || self.is_supported_extension(&segment) {
            return false;
        }

        EXECUTABLE_EXTENSIONS.contains(&segment.as_str())
            || DISGUISE_EXTENSIONS.contains(&segment.as_str())
    }

    /// Declared type when it is concrete, otherwise a guess from the extension.
    pub fn detect_mime_type(&self, file: &FileDescriptor) -> Option<String> {
        match classify_declared(file.mime_type.as_deref()) {
            DeclaredType::Concrete(mime_type) => Some(mime_type),
            DeclaredType::Generic => file
                .extension()
                .and_then(|ext| self.mime_for_extension(&ext)),
        }
    }

    fn mime_for_extension(&self, ext: &str) -> Option<String> {
        self.config
            .formats
            .iter()
            .find(|format| format.extensions.contains(&ext))
            .map(|format| format.mime_type.to_string())
            .or_else(|| {
                mime_guess::from_ext(ext)
                    .first()
                    .map(|guess| guess.essence_str().to_string())
            })
    }

    pub fn is_supported_mime_type(&self, mime_type: &str) -> bool {
        self.config
            .formats
            .iter()
            .any(|format| format.mime_type.eq_ignore_ascii_case(mime_type))
    }

    pub fn is_supported_extension(&self, ext: &str) -> bool {
        self.config
            .formats
            .iter()
            .any(|format| format.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    pub fn supported_formats(&self) -> Vec<String> {
        self.config
            .formats
            .iter()
            .map(|format| format.label.to_string())
            .collect()
    }

    pub fn supported_formats_description(&self) -> String {
        self.supported_formats().join(", ")
    }

    pub fn max_size_formatted(&self) -> String {
        format_file_size(self.config.max_file_size)
    }

    fn accepted(&self, file: &FileDescriptor, mime_type: String) -> ValidationResult {
        ValidationResult {
            is_valid: true,
            mime_type: Some(mime_type),
            file_name: Some(file.name.clone()),
            file_size: file.size,
            error_message: None,
            error_code: None,
            supported_formats: self.supported_formats(),
            max_size_formatted: self.max_size_formatted(),
        }
    }

    fn rejected(&self, file: Option<&FileDescriptor>, rejection: Rejection) -> ValidationResult {
        ValidationResult {
            is_valid: false,
            mime_type: file.and_then(|file| self.detect_mime_type(file)),
            file_name: file.map(|file| file.name.clone()),
            file_size: file.map(|file| file.size).unwrap_or(0),
            error_message: Some(rejection.message),
            error_code: Some(rejection.code),
            supported_formats: self.supported_formats(),
            max_size_formatted: self.max_size_formatted(),
        }
    }
}

fn suspicious(message: &str) -> Rejection {
    Rejection::new(ValidationErrorCode::SuspiciousFilename, message)
}

fn invalid_file_object() -> Rejection {
    Rejection::new(
        ValidationErrorCode::InvalidFileObject,
        "The selected file could not be read. Please select it again.",
    )
}

fn descriptor_from_value(value: &Value) -> Option<FileDescriptor> {
    let name = value.get("name")?.as_str()?;
    let size = value.get("size")?;
    let size = size
        .as_i64()
        .or_else(|| size.as_f64().map(|size| size.ceil() as i64))?;

    let mime_type = value.get("type").and_then(Value::as_str).map(str::to_string);
    let last_modified = value
        .get("lastModified")
        .and_then(Value::as_i64)
        .and_then(DateTime::<Utc>::from_timestamp_millis);

    Some(FileDescriptor {
        name: name.to_string(),
        size,
        mime_type,
        last_modified,
    })
}
