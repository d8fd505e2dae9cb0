use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("code host error: {0}")]
    CodeHost(String),
    #[error("permission denied by code host: {0}")]
    PermissionDenied(String),
    #[error("language model error: {0}")]
    LanguageModel(String),
    #[error("summary cache error: {0}")]
    Cache(String),
    #[error("pull request #{number} has a cyclic backport chain")]
    BackportCycle { number: u64 },
    #[error("background task failed: {0}")]
    Task(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl AppError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, AppError::PermissionDenied(_))
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Cache(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
