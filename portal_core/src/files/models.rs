use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// A file as handed over by the upload form: only what the browser reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub name: String,
    pub size: i64,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl FileDescriptor {
    pub fn new(name: impl Into<String>, size: i64, mime_type: Option<&str>) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: mime_type.map(str::to_string),
            last_modified: None,
        }
    }

    /// Describes a file on disk. No declared type is attached, so validation
    /// falls back to the extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let last_modified = metadata.modified().ok().map(DateTime::<Utc>::from);

        Ok(Self {
            name,
            size: i64::try_from(metadata.len()).unwrap_or(i64::MAX),
            mime_type: None,
            last_modified,
        })
    }

    /// Lowercased text after the last dot, if any.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub name: String,
    pub size: i64,
    #[serde(rename = "type")]
    pub mime_type: Option<String>,
    pub extension: Option<String>,
    pub size_formatted: String,
    pub last_modified: Option<DateTime<Utc>>,
}

impl From<&FileDescriptor> for FileMetadata {
    fn from(file: &FileDescriptor) -> Self {
        Self {
            name: file.name.clone(),
            size: file.size,
            mime_type: file.mime_type.clone(),
            extension: file.extension(),
            size_formatted: format_file_size(u64::try_from(file.size).unwrap_or(0)),
            last_modified: file.last_modified,
        }
    }
}

pub fn get_file_metadata(file: &FileDescriptor) -> FileMetadata {
    FileMetadata::from(file)
}

pub(crate) fn extension_of(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Human-readable size using 1024-based units and at most two decimals.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let formatted = format!("{:.2}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');

    format!("{} {}", trimmed, SIZE_UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(100), "100 B");
        assert_eq!(format_file_size(1000), "1000 B");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5 MB");
        assert_eq!(format_file_size(1_288_490_189), "1.2 GB");
    }

    #[test]
    fn test_extension() {
        assert_eq!(FileDescriptor::new("Report.PDF", 10, None).extension().as_deref(), Some("pdf"));
        assert_eq!(FileDescriptor::new("archive.tar.gz", 10, None).extension().as_deref(), Some("gz"));
        assert_eq!(FileDescriptor::new("README", 10, None).extension(), None);
        assert_eq!(FileDescriptor::new("trailing.", 10, None).extension(), None);
    }

    #[test]
    fn test_file_metadata() {
        let file = FileDescriptor::new("notes.txt", 2048, Some("text/plain"));
        let metadata = get_file_metadata(&file);

        assert_eq!(metadata.name, "notes.txt");
        assert_eq!(metadata.size, 2048);
        assert_eq!(metadata.mime_type.as_deref(), Some("text/plain"));
        assert_eq!(metadata.extension.as_deref(), Some("txt"));
        assert_eq!(metadata.size_formatted, "2 KB");
    }

    #[test]
    fn test_from_path() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"quarterly summary").unwrap();

        let descriptor = FileDescriptor::from_path(&path).unwrap();
        assert_eq!(descriptor.name, "summary.txt");
        assert_eq!(descriptor.size, 17);
        assert!(descriptor.mime_type.is_none());
        assert!(descriptor.last_modified.is_some());
    }

    #[test]
    fn test_from_missing_path() {
        assert!(FileDescriptor::from_path("/definitely/not/here.pdf").is_err());
    }
}
