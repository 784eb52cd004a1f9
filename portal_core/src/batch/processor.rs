use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::batch::retry::{retry, RetryPolicy};
use crate::error::{AppError, Result};
use crate::files::{FileDescriptor, FileValidator, ValidationResult};
use crate::notify::{NotificationKind, Notifier, ToastOptions};

#[derive(Debug)]
pub struct BatchFailure {
    pub file: FileDescriptor,
    pub error: AppError,
}

#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub results: Vec<T>,
    pub errors: Vec<BatchFailure>,
}

impl<T> Default for BatchOutcome<T> {
    fn default() -> Self {
        Self {
            results: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl<T> BatchOutcome<T> {
    pub fn total(&self) -> usize {
        self.results.len() + self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn summary_kind(&self) -> NotificationKind {
        match (self.results.len(), self.errors.len()) {
            (0, 0) => NotificationKind::Info,
            (_, 0) => NotificationKind::Success,
            (0, _) => NotificationKind::Error,
            _ => NotificationKind::Warning,
        }
    }

    pub fn summary_message(&self) -> String {
        let total = self.total();
        match self.summary_kind() {
            NotificationKind::Info => "No files to process".to_string(),
            NotificationKind::Success => format!("All {} file(s) processed successfully", total),
            NotificationKind::Warning => format!(
                "{} of {} file(s) processed successfully, {} failed",
                self.results.len(),
                total,
                self.errors.len()
            ),
            NotificationKind::Error => format!("All {} file(s) failed to process", total),
        }
    }
}

/// Runs an operation over a set of files one at a time, retrying each file
/// independently and reporting a single summary at the end.
pub struct BatchProcessor {
    notifier: Arc<Notifier>,
    policy: RetryPolicy,
}

impl BatchProcessor {
    pub fn new(notifier: Arc<Notifier>, policy: RetryPolicy) -> Self {
        Self { notifier, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }

    pub async fn process_batch<T, F, Fut>(&self, files: Vec<FileDescriptor>, op: F) -> BatchOutcome<T>
    where
        F: FnMut(FileDescriptor) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_batch(&self.policy, files, op).await
    }

    async fn run_batch<T, F, Fut>(
        &self,
        policy: &RetryPolicy,
        files: Vec<FileDescriptor>,
        mut op: F,
    ) -> BatchOutcome<T>
    where
        F: FnMut(FileDescriptor) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut outcome = BatchOutcome::default();

        if files.is_empty() {
            debug!("Batch is empty, nothing to process");
            return outcome;
        }

        info!("Processing batch of {} file(s)", files.len());

        for file in files {
            let name = format!("Processing {}", file.name);
            let result = retry(policy, &name, || op(file.clone())).await;

            match result {
                Ok(value) => outcome.results.push(value),
                Err(error) => {
                    warn!("{} failed: {}", file.name, error);
                    outcome.errors.push(BatchFailure { file, error });
                }
            }
        }

        info!(
            succeeded = outcome.results.len(),
            failed = outcome.errors.len(),
            "Batch finished"
        );

        self.notifier
            .notify(
                outcome.summary_kind(),
                &outcome.summary_message(),
                &ToastOptions::default(),
            )
            .await;

        outcome
    }

    /// Validates every file, treating a rejection as that file's failure.
    /// A rejection is final, so it is not retried.
    pub async fn validate_batch(
        &self,
        validator: &FileValidator,
        files: Vec<FileDescriptor>,
    ) -> BatchOutcome<ValidationResult> {
        let policy = self.policy.clone().stopping_on_permanent();
        self.run_batch(&policy, files, |file| {
            let result = validator.validate_file(&file);
            async move {
                if result.is_valid {
                    Ok(result)
                } else {
                    Err(AppError::FileRejected(format!(
                        "{}: {}",
                        file.name,
                        result.error_message.as_deref().unwrap_or("Validation failed")
                    )))
                }
            }
        })
        .await
    }
}
