use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

use crate::error::{DashboardError, TransportError};

pub const DEFAULT_DISMISS_MS: u64 = 5000;

static TOAST_ID_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Notification variant for styling different types of toasts
#[derive(Serialize, Debug, Clone, PartialEq, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationVariant {
    /// Red styling for errors
    #[default]
    Error,
    /// Blue styling for informational messages
    Info,
}

/// A transient notification handed to the rendering sink.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Toast {
    pub id: String,
    pub title: String,
    pub message: String,
    pub technical_error: String, // Raw technical error for logging
    pub auto_dismiss_ms: u64,
    pub variant: NotificationVariant,
}

impl Toast {
    fn next_id(prefix: &str) -> String {
        let n = TOAST_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        format!("{}_{}", prefix, n)
    }

    pub fn info(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            id: Self::next_id("info"),
            title: "Info".to_string(),
            technical_error: message.clone(),
            message,
            auto_dismiss_ms: DEFAULT_DISMISS_MS,
            variant: NotificationVariant::Info,
        }
    }

    /// User-facing validation message, no technical detail behind it.
    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            id: Self::next_id("error"),
            title: "Error".to_string(),
            technical_error: message.clone(),
            message,
            auto_dismiss_ms: DEFAULT_DISMISS_MS,
            variant: NotificationVariant::Error,
        }
    }

    pub fn from_error(title: impl Into<String>, error: &DashboardError) -> Self {
        let technical = error.to_string();
        let message = match error {
            DashboardError::Transport(TransportError::Network(detail)) => {
                make_error_user_friendly(detail)
            }
            other => match other.user_message().trim() {
                "" => make_error_user_friendly(""),
                server_text => server_text.to_string(),
            },
        };
        Self {
            id: Self::next_id("error"),
            title: title.into(),
            message,
            technical_error: technical,
            auto_dismiss_ms: DEFAULT_DISMISS_MS,
            variant: NotificationVariant::Error,
        }
    }
}

pub fn make_error_user_friendly(error: &str) -> String {
    let error_lower = error.to_lowercase();

    if error.trim().is_empty() {
        "An unexpected error occurred. Please try again.".to_string()
    } else if error_lower.contains("permission denied")
        || error_lower.contains("forbidden")
        || error_lower.contains("unauthorized")
    {
        "You are not allowed to do that.".to_string()
    } else if error_lower.contains("timed out") || error_lower.contains("timeout") {
        "Operation timed out. Please try again.".to_string()
    } else if error_lower.contains("connection") || error_lower.contains("network") {
        "Connection error. Please check your network connection.".to_string()
    } else {
        // Server messages are already meant for people
        error.trim().to_string()
    }
}
