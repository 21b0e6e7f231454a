use axum::http::StatusCode;
use thiserror::Error;

/// Storage error taxonomy. Each variant carries a stable numeric code that
/// clients can switch on, independent of the HTTP status it maps to.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown database error: {0}")]
    Unknown(String),

    #[error("database is not connected")]
    NotConnected,

    #[error("there cannot be two documents with the same {field}")]
    DuplicateUnique { field: String },

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("validation failed for {field}: {message}")]
    Validation { field: String, message: String },
}

impl StoreError {
    pub fn duplicate(field: impl Into<String>) -> Self {
        StoreError::DuplicateUnique {
            field: field.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>) -> Self {
        StoreError::NotFound(entity.into())
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            StoreError::Unknown(_) => 1,
            StoreError::NotConnected => 2,
            StoreError::DuplicateUnique { .. } => 3,
            StoreError::InvalidKey(_) => 4,
            StoreError::NotFound(_) => 5,
            StoreError::Validation { .. } => 6,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Unknown(_) => "UnknownError",
            StoreError::NotConnected => "NotConnectedError",
            StoreError::DuplicateUnique { .. } => "DuplicatedUniqueKeyError",
            StoreError::InvalidKey(_) => "InvalidKeyError",
            StoreError::NotFound(_) => "EntityNotFound",
            StoreError::Validation { .. } => "ValidationError",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            StoreError::Unknown(_) | StoreError::NotConnected => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            StoreError::DuplicateUnique { .. }
            | StoreError::InvalidKey(_)
            | StoreError::Validation { .. } => StatusCode::BAD_REQUEST,
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::QueryReturnedNoRows => StoreError::not_found("row"),
            rusqlite::Error::SqliteFailure(ffi_err, message)
                if ffi_err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                let detail = message.clone().unwrap_or_default();
                // rusqlite reports unique violations as
                // "UNIQUE constraint failed: <table>.<column>"
                if let Some(field) = detail.strip_prefix("UNIQUE constraint failed: ") {
                    StoreError::duplicate(field.trim())
                } else {
                    StoreError::InvalidKey(detail)
                }
            }
            _ => StoreError::Unknown(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_statuses_match_the_taxonomy() {
        let cases: [(StoreError, u16, StatusCode); 6] = [
            (StoreError::Unknown("x".into()), 1, StatusCode::INTERNAL_SERVER_ERROR),
            (StoreError::NotConnected, 2, StatusCode::INTERNAL_SERVER_ERROR),
            (StoreError::duplicate("users.email"), 3, StatusCode::BAD_REQUEST),
            (StoreError::InvalidKey("bad id".into()), 4, StatusCode::BAD_REQUEST),
            (StoreError::not_found("post"), 5, StatusCode::NOT_FOUND),
            (
                StoreError::validation("title", "must not be empty"),
                6,
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, code, status) in cases {
            assert_eq!(err.code(), code);
            assert_eq!(err.status(), status);
        }
    }

    #[test]
    fn unique_violation_names_the_conflicting_field() {
        let ffi = rusqlite::ffi::Error {
            code: rusqlite::ErrorCode::ConstraintViolation,
            extended_code: 2067,
        };
        let err = rusqlite::Error::SqliteFailure(
            ffi,
            Some("UNIQUE constraint failed: users.email".into()),
        );
        match StoreError::from(err) {
            StoreError::DuplicateUnique { field } => assert_eq!(field, "users.email"),
            other => panic!("expected duplicate error, got {other:?}"),
        }
    }
}
