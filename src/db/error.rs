use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Not found")]
    NotFound,

    #[error("Poll is already soft-deleted")]
    AlreadySoftDeleted,

    #[error("Poll is not soft-deleted")]
    NotSoftDeleted,

    #[error("Poll never expires and extension of never-expiring polls is disabled")]
    AlreadyNeverExpires,

    #[error("Poll is not eligible for purge: {0}")]
    NotPurgeEligible(String),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DbError {
    /// Transition precondition mismatches. Callers treat these as no-ops.
    pub fn is_precondition_failure(&self) -> bool {
        matches!(
            self,
            DbError::AlreadySoftDeleted
                | DbError::NotSoftDeleted
                | DbError::AlreadyNeverExpires
                | DbError::NotPurgeEligible(_)
        )
    }

    /// Errors that must abort a sweep run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DbError::StoreUnavailable(_) | DbError::Migration(_) | DbError::Internal(_)
        )
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(DbError::AlreadySoftDeleted.is_precondition_failure());
        assert!(DbError::NotSoftDeleted.is_precondition_failure());
        assert!(DbError::NotPurgeEligible("active".into()).is_precondition_failure());
        assert!(!DbError::NotFound.is_precondition_failure());
        assert!(!DbError::NotFound.is_fatal());
        assert!(!DbError::InvalidDuration("3 days".into()).is_fatal());
        assert!(DbError::StoreUnavailable(sqlx::Error::PoolClosed).is_fatal());
    }
}
