use thiserror::Error;

use crate::domain::types::PostStatus;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("domain validation failed: {message}")]
    Validation { message: String },
    #[error("post cannot move from {from} to {to}")]
    InvalidTransition { from: PostStatus, to: PostStatus },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
