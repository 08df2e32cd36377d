use tablex_core::TablexError;
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service-level errors with user-friendly messages
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Unsupported SQL dialect: {0}")]
    UnsupportedDialect(String),

    #[error("Invalid filter on column {column}: {reason}")]
    InvalidFilter { column: String, reason: String },

    #[error("Table browse failed: {0}")]
    BrowseFailed(String),

    #[error("Schema loading failed: {0}")]
    SchemaLoadFailed(String),

    #[error("Storage failed: {0}")]
    StorageFailed(String),
}

impl From<ServiceError> for TablexError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::UnsupportedDialect(_) => TablexError::Configuration(error.to_string()),
            ServiceError::InvalidFilter { .. } | ServiceError::BrowseFailed(_) => {
                TablexError::Query(error.to_string())
            }
            ServiceError::SchemaLoadFailed(_) => TablexError::Schema(error.to_string()),
            ServiceError::StorageFailed(_) => TablexError::Storage(error.to_string()),
        }
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(error: rusqlite::Error) -> Self {
        ServiceError::StorageFailed(error.to_string())
    }
}
