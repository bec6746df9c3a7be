//! Customer record model and patch types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::file_safety::sanitize_filename;
use crate::uuid_utils::new_v7;

// =============================================================================
// OWNER
// =============================================================================

/// Identity every customer record is scoped under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Build an owner id, rejecting blank identities.
    ///
    /// A blank identity means nobody is signed in, which is reported as
    /// [`Error::StoreUnavailable`].
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(Error::StoreUnavailable);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// CUSTOMER
// =============================================================================

/// Free-text scalar fields of a customer record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomerFields {
    pub first_name: String,
    pub last_name: String,
    pub street_address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub email: String,
    pub phone: String,
    pub notes: String,
}

impl CustomerFields {
    /// True when at least one of first/last name is non-blank.
    pub fn has_name(&self) -> bool {
        !self.first_name.trim().is_empty() || !self.last_name.trim().is_empty()
    }

    /// Name as shown in lists: "First Last", trimmed.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

/// A stored customer record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    pub owner: OwnerId,
    #[serde(flatten)]
    pub fields: CustomerFields,
    #[serde(default)]
    pub pictures: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sort records newest first, the order every store lists in.
pub fn sort_newest_first(records: &mut [Customer]) {
    records.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

// =============================================================================
// PATCH
// =============================================================================

/// How a patch changes the picture list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PicturesUpdate {
    /// Replace the whole list.
    Replace(Vec<String>),
    /// Add references not already present; never removes any.
    AppendDistinct(Vec<String>),
}

impl PicturesUpdate {
    /// Compute the resulting list from the current one.
    pub fn apply(&self, current: &[String]) -> Vec<String> {
        match self {
            PicturesUpdate::Replace(list) => list.clone(),
            PicturesUpdate::AppendDistinct(extra) => {
                let mut merged = current.to_vec();
                for reference in extra {
                    if !merged.contains(reference) {
                        merged.push(reference.clone());
                    }
                }
                merged
            }
        }
    }
}

/// Partial update for a customer record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerPatch {
    /// Overwrite every scalar field when set.
    pub fields: Option<CustomerFields>,
    pub pictures: Option<PicturesUpdate>,
}

impl CustomerPatch {
    pub fn fields(fields: CustomerFields) -> Self {
        Self {
            fields: Some(fields),
            pictures: None,
        }
    }

    pub fn pictures(update: PicturesUpdate) -> Self {
        Self {
            fields: None,
            pictures: Some(update),
        }
    }

    pub fn with_pictures(mut self, update: PicturesUpdate) -> Self {
        self.pictures = Some(update);
        self
    }

    /// Apply this patch in memory, enforcing the picture limit.
    ///
    /// `now` is clamped so that `updated_at` never precedes `created_at`.
    pub fn apply_to(
        &self,
        customer: &mut Customer,
        now: DateTime<Utc>,
        max_pictures: usize,
    ) -> Result<()> {
        let pictures = match &self.pictures {
            Some(update) => update.apply(&customer.pictures),
            None => customer.pictures.clone(),
        };
        check_picture_count(pictures.len(), max_pictures)?;

        if let Some(fields) = &self.fields {
            customer.fields = fields.clone();
        }
        customer.pictures = pictures;
        customer.updated_at = now.max(customer.created_at);
        Ok(())
    }
}

/// Reject picture lists longer than `max`.
pub fn check_picture_count(count: usize, max: usize) -> Result<()> {
    if count > max {
        return Err(Error::TooManyPictures { count, max });
    }
    Ok(())
}

/// Outcome of a delete. Both variants mean the record is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Removed,
    AlreadyAbsent,
}

// =============================================================================
// BLOB PATHS
// =============================================================================

/// Owner- and record-scoped location of an uploaded blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobPath(String);

impl BlobPath {
    /// Path for a customer picture:
    /// `users/{owner}/customers/{record}/{v7}-{file name}`.
    ///
    /// The UUIDv7 prefix keeps two uploads of the same file name apart.
    pub fn for_customer(owner: &OwnerId, record_id: Uuid, file_name: &str) -> Self {
        let safe_owner = sanitize_segment(owner.as_str());
        let safe_name = sanitize_segment(&sanitize_filename(file_name));
        Self(format!(
            "users/{}/customers/{}/{}-{}",
            safe_owner,
            record_id.as_hyphenated(),
            new_v7().as_simple(),
            safe_name
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn sanitize_segment(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| match c {
            '/' | '\\' | '#' | '?' | '%' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}
