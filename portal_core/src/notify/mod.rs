//! User-facing feedback: toasts, error messages and retry prompts.

pub mod messages;
pub mod notifier;
pub mod sink;

pub use messages::user_message;
pub use notifier::Notifier;
pub use sink::{
    NotificationKind, NotificationSink, ToastAction, ToastOptions, TooltipOptions,
    TooltipPlacement, TracingSink,
};
