use sea_orm::{DbErr, SqlErr};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Stable discriminant for [`MediaError`], safe to expose to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Range,
    StorageIo,
    Transform,
    Database,
}

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Index out of range: {0}")]
    Range(String),

    #[error("Storage I/O error: {0}")]
    StorageIo(String),

    #[error("Transform failed: {0}")]
    Transform(String),

    #[error("Database error: {0}")]
    Database(DbErr),
}

impl MediaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MediaError::Validation(_) => ErrorKind::Validation,
            MediaError::NotFound(_) => ErrorKind::NotFound,
            MediaError::Conflict(_) => ErrorKind::Conflict,
            MediaError::Range(_) => ErrorKind::Range,
            MediaError::StorageIo(_) => ErrorKind::StorageIo,
            MediaError::Transform(_) => ErrorKind::Transform,
            MediaError::Database(_) => ErrorKind::Database,
        }
    }

    pub(crate) fn storage(err: anyhow::Error) -> Self {
        MediaError::StorageIo(format!("{:#}", err))
    }
}

impl From<DbErr> for MediaError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(msg)) => MediaError::Conflict(msg),
            Some(SqlErr::ForeignKeyConstraintViolation(msg)) => {
                MediaError::NotFound(format!("referenced media item does not exist ({})", msg))
            }
            _ => MediaError::Database(err),
        }
    }
}

pub type MediaResult<T> = Result<T, MediaError>;
