//! Errors surfaced by the form controller.

use thiserror::Error;
use uuid::Uuid;

use crate::validation::ValidationError;

/// Message shown for any failure the user can only retry.
pub const RETRY_MESSAGE: &str = "Failed to save customer. Please try again.";

/// One upload that did not make it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedUpload {
    pub file_name: String,
    pub error: String,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("no signed-in owner")]
    StoreUnavailable,

    #[error("a submit is already in flight")]
    InFlight,

    /// `begin_edit` was not called, or the edit was cancelled.
    #[error("no record is being edited")]
    NotEditing,

    /// The record exists but none of the uploads were attached to it.
    #[error("{count} upload(s) failed for record {record_id}", count = .failed.len())]
    UploadFailure {
        record_id: Uuid,
        failed: Vec<FailedUpload>,
    },

    #[error("write failed: {0}")]
    WriteFailure(#[source] b2b_core::Error),
}

impl SubmitError {
    /// Text to show the user. Validation problems are specific; everything
    /// else is a generic retry prompt.
    pub fn user_message(&self) -> String {
        match self {
            SubmitError::Validation(e) => e.to_string(),
            SubmitError::StoreUnavailable => "Sign in to manage customers.".to_string(),
            SubmitError::InFlight => "Still saving. Please wait.".to_string(),
            SubmitError::NotEditing => "Choose a customer to edit first.".to_string(),
            SubmitError::UploadFailure { .. } | SubmitError::WriteFailure(_) => {
                RETRY_MESSAGE.to_string()
            }
        }
    }

    /// Backend error code for support, when the backend reported one.
    pub fn provider_code(&self) -> Option<String> {
        match self {
            SubmitError::WriteFailure(e) => e.provider_code(),
            _ => None,
        }
    }

    /// Record left behind by a submit whose uploads failed.
    pub fn record_id(&self) -> Option<Uuid> {
        match self {
            SubmitError::UploadFailure { record_id, .. } => Some(*record_id),
            _ => None,
        }
    }
}

impl From<b2b_core::Error> for SubmitError {
    fn from(e: b2b_core::Error) -> Self {
        match e {
            b2b_core::Error::StoreUnavailable => SubmitError::StoreUnavailable,
            other => SubmitError::WriteFailure(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_unavailable_maps_through() {
        let err: SubmitError = b2b_core::Error::StoreUnavailable.into();
        assert!(matches!(err, SubmitError::StoreUnavailable));
    }

    #[test]
    fn test_write_failure_message_is_generic() {
        let err: SubmitError = b2b_core::Error::Io(std::io::Error::other("disk full")).into();
        assert_eq!(err.user_message(), RETRY_MESSAGE);
        assert!(err.provider_code().is_none());
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_upload_failure_keeps_record_id() {
        let id = Uuid::nil();
        let err = SubmitError::UploadFailure {
            record_id: id,
            failed: vec![FailedUpload {
                file_name: "a.png".into(),
                error: "timeout".into(),
            }],
        };
        assert_eq!(err.record_id(), Some(id));
        assert_eq!(err.user_message(), RETRY_MESSAGE);
        assert!(err.to_string().starts_with("1 upload(s) failed"));
    }

    #[test]
    fn test_validation_message_is_specific() {
        let err = SubmitError::from(ValidationError::MissingName);
        assert_eq!(err.user_message(), "Enter a first or last name");
    }
}
