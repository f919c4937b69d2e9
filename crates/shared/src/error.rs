use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{SessionId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    Unauthorized,
    NotFound,
    Persistence,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Failures scoped to a single dialog session.
#[derive(Debug, Error)]
pub enum DialogError {
    #[error("input rejected at step {step}: {reason}")]
    ValidationRejected { step: String, reason: String },
    #[error("user {actor} may not act here")]
    UnauthorizedActor { actor: UserId },
    #[error("{0} not found")]
    NotFound(String),
    #[error("persistence failure: {0:#}")]
    Persistence(#[from] anyhow::Error),
}

impl DialogError {
    pub fn rejected(step: impl ToString, reason: impl Into<String>) -> Self {
        Self::ValidationRejected {
            step: step.to_string(),
            reason: reason.into(),
        }
    }

    pub fn session_not_found(session_id: SessionId) -> Self {
        Self::NotFound(format!("session {session_id}"))
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ValidationRejected { .. } => ErrorCode::Validation,
            Self::UnauthorizedActor { .. } => ErrorCode::Unauthorized,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Persistence(_) => ErrorCode::Persistence,
        }
    }

    /// Errors the user never sees; the dialog re-prompts or ignores the input.
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            Self::ValidationRejected { .. } | Self::UnauthorizedActor { .. }
        )
    }
}

impl From<&DialogError> for ApiError {
    fn from(value: &DialogError) -> Self {
        Self::new(value.code(), value.to_string())
    }
}
