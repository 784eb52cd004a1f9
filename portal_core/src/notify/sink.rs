use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::files::ValidationResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToastAction {
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToastOptions {
    pub duration_ms: Option<u64>,
    pub dismissible: bool,
    pub action: Option<ToastAction>,
}

impl ToastOptions {
    pub fn with_action(label: impl Into<String>) -> Self {
        Self {
            duration_ms: None,
            dismissible: true,
            action: Some(ToastAction {
                label: label.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TooltipPlacement {
    #[default]
    Top,
    Bottom,
    Left,
    Right,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TooltipOptions {
    pub placement: TooltipPlacement,
    pub max_width_px: Option<u32>,
}

/// Whatever renders feedback to the user. Only toasts are mandatory.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn show_toast(&self, kind: NotificationKind, message: &str, options: &ToastOptions);

    async fn handle_error(&self, message: &str, context: &str) {
        let text = format!("{}: {}", context, message);
        self.show_toast(NotificationKind::Error, &text, &ToastOptions::default())
            .await;
    }

    async fn display_error(&self, result: &ValidationResult, _container_id: &str) {
        if let Some(message) = &result.error_message {
            self.show_toast(NotificationKind::Error, message, &ToastOptions::default())
                .await;
        }
    }

    async fn create_help_tooltip(&self, _element_id: &str, _text: &str, _options: &TooltipOptions) {}
}

/// Sink that writes everything to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

pub(crate) fn log_notification(kind: NotificationKind, message: &str) {
    match kind {
        NotificationKind::Error => error!(kind = "error", "{}", message),
        NotificationKind::Warning => warn!(kind = "warning", "{}", message),
        NotificationKind::Success => info!(kind = "success", "{}", message),
        NotificationKind::Info => info!(kind = "info", "{}", message),
    }
}

#[async_trait]
impl NotificationSink for TracingSink {
    async fn show_toast(&self, kind: NotificationKind, message: &str, _options: &ToastOptions) {
        log_notification(kind, message);
    }

    async fn handle_error(&self, message: &str, context: &str) {
        error!(context, "{}", message);
    }

    async fn display_error(&self, result: &ValidationResult, container_id: &str) {
        warn!(
            container_id,
            code = ?result.error_code,
            "{}",
            result.error_message.as_deref().unwrap_or("Validation failed")
        );
    }

    async fn create_help_tooltip(&self, element_id: &str, text: &str, _options: &TooltipOptions) {
        info!(element_id, "help: {}", text);
    }
}
