use thiserror::Error;

use crate::types::JobId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FleetError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The job exists but already left the active lifecycle.
    #[error("job {id} not found or already completed")]
    AlreadyClosed { id: JobId },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid value: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl FleetError {
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        FleetError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable error code for API layers.
    pub fn code(&self) -> &'static str {
        match self {
            FleetError::NotFound { .. } => "not_found",
            FleetError::AlreadyClosed { .. } => "already_closed",
            FleetError::InvalidState(_) => "invalid_state",
            FleetError::Validation(_) => "invalid_param",
            FleetError::Storage(_) => "storage",
        }
    }

    /// True for both missing records and jobs that are no longer open.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            FleetError::NotFound { .. } | FleetError::AlreadyClosed { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FleetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_jobs_are_not_found_style_but_distinct() {
        let closed = FleetError::AlreadyClosed { id: JobId::new() };
        let missing = FleetError::not_found("job", "abc");
        assert!(closed.is_not_found());
        assert!(missing.is_not_found());
        assert_ne!(closed.code(), missing.code());
        assert!(!FleetError::InvalidState("x".into()).is_not_found());
        assert_eq!(missing.to_string(), "job not found: abc");
    }
}
