use thiserror::Error;
use tonic::{Code, Status};

pub type Result<T> = std::result::Result<T, SafetyError>;

#[derive(Debug, Error)]
pub enum SafetyError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SafetyError {
    /// Convert to gRPC Status for the wire protocol
    pub fn to_status(&self) -> Status {
        match self {
            SafetyError::Validation(msg) => Status::new(Code::InvalidArgument, msg.clone()),
            SafetyError::Conflict(msg) => Status::new(Code::FailedPrecondition, msg.clone()),
            SafetyError::NotFound(msg) => Status::new(Code::NotFound, msg.clone()),
            SafetyError::Unauthorized(msg) => Status::new(Code::PermissionDenied, msg.clone()),
            SafetyError::Database(_) | SafetyError::Config(_) | SafetyError::Internal(_) => {
                // Don't leak internal details on the wire
                Status::new(Code::Internal, "Internal server error")
            }
        }
    }
}

impl From<sqlx::Error> for SafetyError {
    fn from(err: sqlx::Error) -> Self {
        // Unique-constraint violations are contention, not server faults:
        // two concurrent SubmitAppeal calls for the same ban race to the
        // unique index and exactly one insert wins.
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return SafetyError::Conflict(format!(
                    "Unique constraint violated: {}",
                    db_err.constraint().unwrap_or("unknown")
                ));
            }
        }
        tracing::error!("Database error: {}", err);
        SafetyError::Database(err.to_string())
    }
}

impl From<validator::ValidationErrors> for SafetyError {
    fn from(err: validator::ValidationErrors) -> Self {
        SafetyError::Validation(err.to_string())
    }
}

impl From<SafetyError> for Status {
    fn from(err: SafetyError) -> Self {
        err.to_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_invalid_argument() {
        let status = SafetyError::Validation("terms not accepted".into()).to_status();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[test]
    fn test_conflict_maps_to_failed_precondition() {
        let status = SafetyError::Conflict("appeal already exists".into()).to_status();
        assert_eq!(status.code(), Code::FailedPrecondition);
    }

    #[test]
    fn test_internal_errors_do_not_leak_details() {
        let status = SafetyError::Database("connection refused to 10.0.0.3".into()).to_status();
        assert_eq!(status.code(), Code::Internal);
        assert!(!status.message().contains("10.0.0.3"));
    }
}
