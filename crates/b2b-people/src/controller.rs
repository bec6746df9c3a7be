//! Customer form controller.
//!
//! Owns the draft and file selection, validates them, and drives the
//! two-phase write: store the record, upload pictures concurrently, then
//! patch the record with the resulting URLs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use futures::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use b2b_core::{
    BlobPath, BlobStore, Customer, CustomerPatch, CustomerStore, DeleteOutcome, IdentityProvider,
    OwnerId, PicturesUpdate,
};

use crate::config::PeopleConfig;
use crate::draft::CustomerDraft;
use crate::error::{FailedUpload, SubmitError};
use crate::selection::{FileSelection, Preview, SelectedFile, SelectionId};
use crate::validation::{validate_create, validate_edit, UploadLimits};

#[derive(Default)]
struct FormState {
    draft: CustomerDraft,
    selection: FileSelection,
    editing: Option<Customer>,
}

/// A delete the user has asked for but not yet confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "nothing is deleted until the request is confirmed"]
pub struct PendingDelete {
    id: Uuid,
}

impl PendingDelete {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

/// Clears the in-flight flag when the submit finishes, however it finishes.
struct SubmitGuard<'a>(&'a AtomicBool);

impl<'a> SubmitGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct PeopleController {
    store: Arc<dyn CustomerStore>,
    blobs: Arc<dyn BlobStore>,
    identity: Arc<dyn IdentityProvider>,
    limits: UploadLimits,
    form: Mutex<FormState>,
    submitting: AtomicBool,
}

impl PeopleController {
    pub fn new(
        store: Arc<dyn CustomerStore>,
        blobs: Arc<dyn BlobStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let limits = UploadLimits {
            max_pictures: store.max_pictures(),
            ..UploadLimits::default()
        };
        Self {
            store,
            blobs,
            identity,
            limits,
            form: Mutex::new(FormState::default()),
            submitting: AtomicBool::new(false),
        }
    }

    /// Open the configured stores and apply the configured limits.
    pub async fn from_config(
        config: &PeopleConfig,
        identity: Arc<dyn IdentityProvider>,
    ) -> b2b_core::Result<Self> {
        let store = config.open_store().await?;
        let blobs = config.open_blob_store().await?;
        Ok(Self::new(store, blobs, identity).with_limits(config.limits))
    }

    pub fn with_limits(mut self, limits: UploadLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> UploadLimits {
        self.limits
    }

    fn form(&self) -> MutexGuard<'_, FormState> {
        // A panic while holding the lock leaves plain data behind; keep using it.
        self.form.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // -------------------------------------------------------------------------
    // Draft and selection
    // -------------------------------------------------------------------------

    pub fn draft(&self) -> CustomerDraft {
        self.form().draft.clone()
    }

    pub fn set_draft(&self, draft: CustomerDraft) {
        self.form().draft = draft;
    }

    pub fn update_draft(&self, edit: impl FnOnce(&mut CustomerDraft)) {
        edit(&mut self.form().draft);
    }

    pub fn select_file(&self, file: SelectedFile) -> SelectionId {
        self.form().selection.add(file)
    }

    /// Remove a selected file and its preview. False when the id is unknown.
    pub fn remove_selected(&self, id: SelectionId) -> bool {
        self.form().selection.remove_selected(id).is_some()
    }

    pub fn previews(&self) -> Vec<Preview> {
        self.form().selection.previews()
    }

    pub fn selected_count(&self) -> usize {
        self.form().selection.len()
    }

    /// Id of the record being edited, if any.
    pub fn editing(&self) -> Option<Uuid> {
        self.form().editing.as_ref().map(|c| c.id)
    }

    /// Load a record into the form for editing.
    pub fn begin_edit(&self, customer: &Customer) {
        let mut form = self.form();
        form.draft = CustomerDraft::from_customer(customer);
        form.selection.clear();
        form.editing = Some(customer.clone());
    }

    /// Drop the edit and return to an empty create form.
    pub fn cancel_edit(&self) {
        *self.form() = FormState::default();
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }

    // -------------------------------------------------------------------------
    // Submit
    // -------------------------------------------------------------------------

    /// Submit whichever form is showing: the edit when one is loaded,
    /// otherwise a new record.
    pub async fn submit(&self) -> Result<Uuid, SubmitError> {
        if self.editing().is_some() {
            self.submit_edit().await.map(|c| c.id)
        } else {
            self.submit_create().await
        }
    }

    /// Create a record from the draft and attach the selected pictures.
    ///
    /// On any failure the draft and selection are left as they were.
    pub async fn submit_create(&self) -> Result<Uuid, SubmitError> {
        let _guard = SubmitGuard::acquire(&self.submitting).ok_or(SubmitError::InFlight)?;
        let start = Instant::now();

        let (draft, selection) = {
            let form = self.form();
            (form.draft.clone(), form.selection.clone())
        };
        validate_create(&draft, &selection, &self.limits)?;
        let owner = self.identity.require()?;

        let record_id = self
            .store
            .create(&owner, draft.fields.clone(), Vec::new())
            .await
            .map_err(|e| self.write_failed("create", &owner, None, e))?;

        let uploaded = self.upload_all(&owner, record_id, &selection).await?;
        let mut pictures = draft.manual_urls();
        pictures.extend(uploaded);

        if !pictures.is_empty() {
            self.store
                .patch(
                    &owner,
                    record_id,
                    CustomerPatch::pictures(PicturesUpdate::Replace(pictures.clone())),
                )
                .await
                .map_err(|e| self.write_failed("attach", &owner, Some(record_id), e))?;
        }

        *self.form() = FormState::default();
        info!(
            subsystem = "people",
            op = "create",
            owner = %owner,
            customer_id = %record_id,
            file_count = selection.len(),
            result_count = pictures.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Customer saved"
        );
        Ok(record_id)
    }

    /// Save the loaded edit: overwrite every field and append new pictures
    /// that are not already attached.
    pub async fn submit_edit(&self) -> Result<Customer, SubmitError> {
        let _guard = SubmitGuard::acquire(&self.submitting).ok_or(SubmitError::InFlight)?;
        let start = Instant::now();

        let (draft, selection, editing) = {
            let form = self.form();
            (
                form.draft.clone(),
                form.selection.clone(),
                form.editing.clone(),
            )
        };
        let editing = editing.ok_or(SubmitError::NotEditing)?;
        validate_edit(&editing.pictures, &draft, &selection, &self.limits)?;
        let owner = self.identity.require()?;

        // The record may have gained pictures since begin_edit; recheck the
        // count against what is stored before uploading anything.
        let current = self
            .store
            .get(&owner, editing.id)
            .await
            .map_err(|e| self.write_failed("edit", &owner, Some(editing.id), e))?
            .ok_or_else(|| {
                self.write_failed(
                    "edit",
                    &owner,
                    Some(editing.id),
                    b2b_core::Error::CustomerNotFound(editing.id),
                )
            })?;
        validate_edit(&current.pictures, &draft, &selection, &self.limits)?;

        let uploaded = self.upload_all(&owner, editing.id, &selection).await?;
        let mut added = draft.manual_urls();
        added.extend(uploaded);

        let patch = CustomerPatch::fields(draft.fields.clone())
            .with_pictures(PicturesUpdate::AppendDistinct(added));
        let updated = self
            .store
            .patch(&owner, editing.id, patch)
            .await
            .map_err(|e| self.write_failed("edit", &owner, Some(editing.id), e))?;

        *self.form() = FormState::default();
        info!(
            subsystem = "people",
            op = "edit",
            owner = %owner,
            customer_id = %updated.id,
            file_count = selection.len(),
            result_count = updated.pictures.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Customer updated"
        );
        Ok(updated)
    }

    /// Upload every selected file concurrently. URLs come back in selection
    /// order; any failure fails the whole batch.
    async fn upload_all(
        &self,
        owner: &OwnerId,
        record_id: Uuid,
        selection: &FileSelection,
    ) -> Result<Vec<String>, SubmitError> {
        if selection.is_empty() {
            return Ok(Vec::new());
        }
        let uploads = selection.files().map(|file| async move {
            let path = BlobPath::for_customer(owner, record_id, &file.name);
            let content_type = file.stored_content_type();
            self.blobs
                .upload(&path, &content_type, &file.data)
                .await
                .map_err(|e| FailedUpload {
                    file_name: file.name.clone(),
                    error: e.to_string(),
                })
        });
        let results = join_all(uploads).await;

        let mut urls = Vec::with_capacity(results.len());
        let mut failed = Vec::new();
        for result in results {
            match result {
                Ok(url) => urls.push(url),
                Err(f) => failed.push(f),
            }
        }
        if !failed.is_empty() {
            warn!(
                subsystem = "people",
                op = "upload",
                owner = %owner,
                customer_id = %record_id,
                file_count = selection.len(),
                failed = failed.len(),
                error = %failed[0].error,
                "Picture upload failed; record left without the new pictures"
            );
            return Err(SubmitError::UploadFailure { record_id, failed });
        }
        debug!(
            subsystem = "people",
            op = "upload",
            customer_id = %record_id,
            file_count = urls.len(),
            "Pictures uploaded"
        );
        Ok(urls)
    }

    fn write_failed(
        &self,
        op: &'static str,
        owner: &OwnerId,
        record_id: Option<Uuid>,
        e: b2b_core::Error,
    ) -> SubmitError {
        let code = e.provider_code();
        warn!(
            subsystem = "people",
            op,
            owner = %owner,
            customer_id = ?record_id,
            error = %e,
            error_code = code.as_deref().unwrap_or(""),
            "Customer write failed"
        );
        SubmitError::from(e)
    }

    // -------------------------------------------------------------------------
    // Delete
    // -------------------------------------------------------------------------

    /// Ask to delete a record. Nothing is sent until [`Self::confirm_delete`].
    pub fn request_delete(&self, id: Uuid) -> PendingDelete {
        PendingDelete { id }
    }

    /// Delete a confirmed record. A record that is already gone counts as
    /// deleted.
    pub async fn confirm_delete(&self, pending: PendingDelete) -> Result<DeleteOutcome, SubmitError> {
        let owner = self.identity.require()?;
        let outcome = self
            .store
            .delete(&owner, pending.id)
            .await
            .map_err(|e| self.write_failed("delete", &owner, Some(pending.id), e))?;

        {
            let mut form = self.form();
            if form.editing.as_ref().map(|c| c.id) == Some(pending.id) {
                *form = FormState::default();
            }
        }
        info!(
            subsystem = "people",
            op = "delete",
            owner = %owner,
            customer_id = %pending.id,
            outcome = ?outcome,
            "Customer delete confirmed"
        );
        Ok(outcome)
    }
}
