use thiserror::Error;

/// Failures of the underlying request/push channel.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    /// Non-2xx response. `message` is the server's `detail`/`message`/`error`
    /// text when present.
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("push channel closed")]
    ChannelClosed,
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("malformed payload from {origin}: {detail}")]
    MalformedPayload { origin: String, detail: String },
    #[error("{action} failed for {target}: {message}")]
    ActionFailure {
        action: String,
        target: String,
        message: String,
    },
    #[error("{key} is busy with {tag}")]
    Busy { key: String, tag: String },
    #[error("nothing selected")]
    NothingSelected,
    #[error("no group selected")]
    NoGroupSelected,
    #[error("view has been torn down")]
    Detached,
}

impl DashboardError {
    pub fn malformed(origin: impl Into<String>, detail: impl ToString) -> Self {
        DashboardError::MalformedPayload {
            origin: origin.into(),
            detail: detail.to_string(),
        }
    }

    /// Message suitable for a user-facing notification.
    pub fn user_message(&self) -> String {
        match self {
            DashboardError::ActionFailure { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
