use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    Backend,
    AdmissionRejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthesisError {
    #[error("project name '{name}' contains invalid characters")]
    InvalidProjectName { name: String },
    #[error("{0}")]
    Backend(String),
    #[error("a generation run is already in progress")]
    AdmissionRejected,
}

impl SynthesisError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            SynthesisError::InvalidProjectName { .. } => ErrorCode::Validation,
            SynthesisError::Backend(_) => ErrorCode::Backend,
            SynthesisError::AdmissionRejected => ErrorCode::AdmissionRejected,
        }
    }
}
