//! Submit-time validation. Runs entirely in memory; the first failing rule
//! is reported.

use b2b_core::{defaults, is_image_upload, ImageCheck};
use thiserror::Error;

use crate::draft::CustomerDraft;
use crate::selection::FileSelection;

/// Size and count limits applied to a submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_pictures: usize,
    pub max_file_bytes: u64,
    pub max_selection_bytes: u64,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_pictures: defaults::MAX_PICTURES,
            max_file_bytes: defaults::MAX_FILE_BYTES,
            max_selection_bytes: defaults::MAX_SELECTION_BYTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Enter a first or last name")]
    MissingName,

    #[error("{name} is not an image ({detected})")]
    NonImageFile { name: String, detected: String },

    #[error("{name} is {size} bytes; the limit is {max_bytes} bytes per picture")]
    FileTooLarge { name: String, size: u64, max_bytes: u64 },

    #[error("Selected pictures total {total} bytes; the limit is {max_bytes} bytes")]
    SelectionTooLarge { total: u64, max_bytes: u64 },

    #[error("A customer can have at most {max} pictures ({count} requested)")]
    TooManyPictures { count: usize, max: usize },
}

/// Rules for a new record: name, then file checks, then picture count.
pub fn validate_create(
    draft: &CustomerDraft,
    selection: &FileSelection,
    limits: &UploadLimits,
) -> Result<(), ValidationError> {
    if !draft.fields.has_name() {
        return Err(ValidationError::MissingName);
    }
    check_files(selection, limits)?;
    let count = draft.manual_urls().len() + selection.len();
    check_count(count, limits.max_pictures)
}

/// Rules for an edit. The name rule is not applied; manual URLs already on
/// the record do not count twice.
pub fn validate_edit(
    existing: &[String],
    draft: &CustomerDraft,
    selection: &FileSelection,
    limits: &UploadLimits,
) -> Result<(), ValidationError> {
    check_files(selection, limits)?;
    let mut added: Vec<String> = Vec::new();
    for url in draft.manual_urls() {
        if !existing.contains(&url) && !added.contains(&url) {
            added.push(url);
        }
    }
    check_count(existing.len() + added.len() + selection.len(), limits.max_pictures)
}

fn check_files(selection: &FileSelection, limits: &UploadLimits) -> Result<(), ValidationError> {
    for file in selection.files() {
        if let ImageCheck::NotImage { detected } =
            is_image_upload(&file.name, &file.data, &file.content_type)
        {
            return Err(ValidationError::NonImageFile {
                name: file.name.clone(),
                detected,
            });
        }
    }
    for file in selection.files() {
        if file.size() > limits.max_file_bytes {
            return Err(ValidationError::FileTooLarge {
                name: file.name.clone(),
                size: file.size(),
                max_bytes: limits.max_file_bytes,
            });
        }
    }
    let total = selection.total_bytes();
    if total > limits.max_selection_bytes {
        return Err(ValidationError::SelectionTooLarge {
            total,
            max_bytes: limits.max_selection_bytes,
        });
    }
    Ok(())
}

fn check_count(count: usize, max: usize) -> Result<(), ValidationError> {
    if count > max {
        return Err(ValidationError::TooManyPictures { count, max });
    }
    Ok(())
}
