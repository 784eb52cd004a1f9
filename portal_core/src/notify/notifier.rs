use futures_util::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::batch::{retry, RetryPolicy};
use crate::error::{AppError, Result};
use crate::files::ValidationResult;
use crate::notify::messages::user_message;
use crate::notify::sink::{
    log_notification, NotificationKind, NotificationSink, ToastOptions, TooltipOptions,
};

type StoredOperation = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

struct FailedOperation {
    name: String,
    policy: RetryPolicy,
    run: StoredOperation,
}

/// Routes user feedback to the injected sink, or to the log when no sink is
/// present. Never fails: a missing sink degrades to logging.
pub struct Notifier {
    sink: Option<Arc<dyn NotificationSink>>,
    last_failed: Mutex<Option<FailedOperation>>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::without_sink()
    }
}

impl Notifier {
    pub fn new(sink: Option<Arc<dyn NotificationSink>>) -> Self {
        Self {
            sink,
            last_failed: Mutex::new(None),
        }
    }

    pub fn without_sink() -> Self {
        Self::new(None)
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    pub async fn notify(&self, kind: NotificationKind, message: &str, options: &ToastOptions) {
        match &self.sink {
            Some(sink) => sink.show_toast(kind, message, options).await,
            None => log_notification(kind, message),
        }
    }

    pub async fn success(&self, message: &str) {
        self.notify(NotificationKind::Success, message, &ToastOptions::default())
            .await;
    }

    pub async fn error(&self, message: &str) {
        self.notify(NotificationKind::Error, message, &ToastOptions::default())
            .await;
    }

    pub async fn warning(&self, message: &str) {
        self.notify(NotificationKind::Warning, message, &ToastOptions::default())
            .await;
    }

    pub async fn info(&self, message: &str) {
        self.notify(NotificationKind::Info, message, &ToastOptions::default())
            .await;
    }

    /// Reports `err` to the user in plain words and returns the text shown.
    pub async fn handle_error(&self, err: &AppError, context: &str) -> String {
        let message = user_message(err);
        warn!("{}: {}", context, err);

        if let Some(sink) = &self.sink {
            sink.handle_error(&message, context).await;
        }

        message
    }

    pub async fn show_validation_error(&self, result: &ValidationResult, container_id: &str) {
        if result.is_valid {
            return;
        }

        match &self.sink {
            Some(sink) => sink.display_error(result, container_id).await,
            None => log_notification(
                NotificationKind::Error,
                result.error_message.as_deref().unwrap_or("Validation failed"),
            ),
        }
    }

    pub async fn help_tooltip(&self, element_id: &str, text: &str, options: &TooltipOptions) {
        match &self.sink {
            Some(sink) => sink.create_help_tooltip(element_id, text, options).await,
            None => debug!(element_id, "help tooltip skipped, no sink: {}", text),
        }
    }

    /// Runs `op` under `policy`. A success toast follows a success. A final
    /// failure gets an error toast; when the error is retryable the toast
    /// offers "Retry" and the operation is remembered for
    /// [`Notifier::retry_last_operation`].
    pub async fn retry_with_feedback<T, F>(&self, name: &str, policy: &RetryPolicy, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: Fn() -> BoxFuture<'static, Result<T>> + Send + Sync + 'static,
    {
        let op = Arc::new(op);
        let attempt = {
            let op = Arc::clone(&op);
            move || op()
        };

        match retry(policy, name, attempt).await {
            Ok(value) => {
                self.success(&format!("{} completed successfully", name)).await;
                Ok(value)
            }
            Err(e) => {
                let message = format!("{} failed: {}", name, user_message(&e));
                if !e.is_retryable() {
                    self.error(&message).await;
                    return Err(e);
                }

                self.notify(
                    NotificationKind::Error,
                    &message,
                    &ToastOptions::with_action("Retry"),
                )
                .await;

                let run: StoredOperation = Arc::new(move || op().map(|res| res.map(|_| ())).boxed());
                *self.last_failed.lock() = Some(FailedOperation {
                    name: name.to_string(),
                    policy: policy.clone(),
                    run,
                });

                Err(e)
            }
        }
    }

    pub fn last_failed_operation_name(&self) -> Option<String> {
        self.last_failed.lock().as_ref().map(|op| op.name.clone())
    }

    /// Re-runs the last operation that failed under
    /// [`Notifier::retry_with_feedback`]. `Ok(false)` when nothing is stored.
    pub async fn retry_last_operation(&self) -> Result<bool> {
        let Some(failed) = self.last_failed.lock().take() else {
            debug!("No failed operation to retry");
            return Ok(false);
        };

        info!("Retrying last failed operation: {}", failed.name);
        let run = Arc::clone(&failed.run);
        self.retry_with_feedback(&failed.name, &failed.policy, move || run())
            .await?;

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ProviderError;
    use crate::files::{FileDescriptor, FileValidator};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct RecordingSink {
        toasts: Mutex<Vec<(NotificationKind, String, ToastOptions)>>,
        errors: Mutex<Vec<(String, String)>>,
        displayed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn show_toast(&self, kind: NotificationKind, message: &str, options: &ToastOptions) {
            self.toasts
                .lock()
                .push((kind, message.to_string(), options.clone()));
        }

        async fn handle_error(&self, message: &str, context: &str) {
            self.errors
                .lock()
                .push((message.to_string(), context.to_string()));
        }

        async fn display_error(&self, _result: &ValidationResult, container_id: &str) {
            self.displayed.lock().push(container_id.to_string());
        }
    }

    fn notifier() -> (Arc<RecordingSink>, Notifier) {
        let sink = Arc::new(RecordingSink::default());
        let notifier = Notifier::new(Some(sink.clone() as Arc<dyn NotificationSink>));
        (sink, notifier)
    }

    #[tokio::test]
    async fn test_toasts_reach_sink() {
        let (sink, notifier) = notifier();

        notifier.success("Saved").await;
        notifier.warning("Almost full").await;

        let toasts = sink.toasts.lock();
        assert_eq!(toasts.len(), 2);
        assert_eq!(toasts[0].0, NotificationKind::Success);
        assert_eq!(toasts[1].1, "Almost full");
    }

    #[tokio::test]
    async fn test_without_sink_does_not_fail() {
        let notifier = Notifier::without_sink();
        assert!(!notifier.has_sink());

        notifier.error("Something broke").await;
        let message = notifier
            .handle_error(&AppError::Provider(ProviderError::UserNotFound), "Sign in")
            .await;
        assert_eq!(message, "No account was found for that username.");
        assert!(!notifier.retry_last_operation().await.unwrap());
    }

    #[tokio::test]
    async fn test_handle_error_uses_friendly_message() {
        let (sink, notifier) = notifier();

        notifier
            .handle_error(&AppError::Provider(ProviderError::NotAuthorized), "Sign in")
            .await;

        let errors = sink.errors.lock();
        assert_eq!(
            errors[0],
            (
                "Incorrect username or password. Please try again.".to_string(),
                "Sign in".to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_validation_error_only_for_invalid_results() {
        let (sink, notifier) = notifier();
        let validator = FileValidator::with_default_config();

        let ok = validator.validate(Some(&FileDescriptor::new("cv.pdf", 2048, Some("application/pdf"))));
        let bad = validator.validate(Some(&FileDescriptor::new("cv.pdf", 0, Some("application/pdf"))));

        notifier.show_validation_error(&ok, "upload-errors").await;
        notifier.show_validation_error(&bad, "upload-errors").await;

        assert_eq!(*sink.displayed.lock(), vec!["upload-errors".to_string()]);
    }

    #[tokio::test]
    async fn test_retry_with_feedback_success() {
        let (sink, notifier) = notifier();
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let result = notifier
            .retry_with_feedback("Upload", &RetryPolicy::default(), move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(AppError::Operation("timeout".to_string()))
                    } else {
                        Ok(7)
                    }
                }
                .boxed()
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(sink.toasts.lock()[0].0, NotificationKind::Success);
        assert!(notifier.last_failed_operation_name().is_none());
    }

    #[tokio::test]
    async fn test_failed_operation_can_be_retried_later() {
        let (sink, notifier) = notifier();
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let result = notifier
            .retry_with_feedback("Upload", &RetryPolicy::no_retry(), move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(AppError::Operation("server unavailable".to_string()))
                    } else {
                        Ok(())
                    }
                }
                .boxed()
            })
            .await;

        assert!(result.is_err());
        {
            let toasts = sink.toasts.lock();
            assert_eq!(toasts[0].0, NotificationKind::Error);
            assert_eq!(toasts[0].1, "Upload failed: server unavailable");
            assert_eq!(toasts[0].2.action.as_ref().unwrap().label, "Retry");
        }
        assert_eq!(notifier.last_failed_operation_name().as_deref(), Some("Upload"));

        assert!(notifier.retry_last_operation().await.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(notifier.last_failed_operation_name().is_none());
    }

    #[tokio::test]
    async fn test_permanent_failure_has_no_retry_action() {
        let (sink, notifier) = notifier();

        let result: Result<()> = notifier
            .retry_with_feedback("Validate", &RetryPolicy::default(), || {
                async { Err(AppError::FileRejected("File is empty".to_string())) }.boxed()
            })
            .await;

        assert!(result.is_err());
        assert!(sink.toasts.lock()[0].2.action.is_none());
        assert!(notifier.last_failed_operation_name().is_none());
        assert!(!notifier.retry_last_operation().await.unwrap());
    }

    #[tokio::test]
    async fn test_permanent_failure_keeps_earlier_retryable_one() {
        let (_sink, notifier) = notifier();

        let _: Result<()> = notifier
            .retry_with_feedback("Upload", &RetryPolicy::no_retry(), || {
                async { Err(AppError::Operation("server unavailable".to_string())) }.boxed()
            })
            .await;
        let _: Result<()> = notifier
            .retry_with_feedback("Validate", &RetryPolicy::no_retry(), || {
                async { Err(AppError::FileRejected("File is empty".to_string())) }.boxed()
            })
            .await;

        assert_eq!(notifier.last_failed_operation_name().as_deref(), Some("Upload"));
    }
}
