use crate::auth::ProviderError;
use crate::error::AppError;

/// Text to show a person for `err`. Known conditions get plain wording;
/// anything unclassified keeps its raw message.
pub fn user_message(err: &AppError) -> String {
    match err {
        AppError::Provider(provider) => provider_message(provider),
        AppError::InvalidRequest(msg) | AppError::FileRejected(msg) | AppError::Operation(msg) => {
            msg.clone()
        }
        AppError::Config(_) => {
            "The application is not configured correctly. Please contact support.".to_string()
        }
        other => other.to_string(),
    }
}

fn provider_message(err: &ProviderError) -> String {
    match err {
        ProviderError::NotAuthorized => "Incorrect username or password. Please try again.".to_string(),
        ProviderError::UserNotFound => "No account was found for that username.".to_string(),
        ProviderError::UsernameExists => "An account with this username already exists.".to_string(),
        ProviderError::UserNotConfirmed => {
            "Please confirm your account with the code we sent you.".to_string()
        }
        ProviderError::CodeMismatch => {
            "That confirmation code is incorrect. Please check it and try again.".to_string()
        }
        ProviderError::ExpiredCode => {
            "That confirmation code has expired. Please request a new one.".to_string()
        }
        ProviderError::InvalidPassword(detail) => {
            format!("Your password does not meet the requirements: {}", detail)
        }
        ProviderError::LimitExceeded => {
            "Too many attempts. Please wait a moment and try again.".to_string()
        }
        ProviderError::Network(_) => {
            "We couldn't reach the server. Please check your connection and try again.".to_string()
        }
        ProviderError::NotAuthenticated | ProviderError::InvalidSession(_) => {
            "Your session has ended. Please sign in again.".to_string()
        }
        ProviderError::AlreadyAuthenticated => "You are already signed in.".to_string(),
        ProviderError::Unknown(msg) => msg.clone(),
    }
}
