//! Centralized default constants for bid2build.
//!
//! **This module is the single source of truth** for shared default values.
//! Runtime overrides are read by `b2b_people::PeopleConfig`; every other crate
//! references these constants instead of defining its own magic numbers.

// =============================================================================
// ATTACHMENTS
// =============================================================================

/// Maximum number of pictures a customer record may carry.
pub const MAX_PICTURES: usize = 5;

/// Maximum size of a single selected image (1 MiB).
pub const MAX_FILE_BYTES: u64 = 1024 * 1024;

/// Maximum combined size of one file selection (5 MiB).
pub const MAX_SELECTION_BYTES: u64 = 5 * 1024 * 1024;

/// Public base URL prepended to blob paths when no override is configured.
pub const BLOB_BASE_URL: &str = "http://localhost:8080/files";

/// Default filesystem root for the blob backend.
pub const FILE_STORAGE_PATH: &str = "/var/lib/bid2build/files";

// =============================================================================
// STORE
// =============================================================================

/// Namespace key under which the local fallback snapshot is stored.
pub const LOCAL_CACHE_NAMESPACE: &str = "bid2build.customers";

/// PostgreSQL NOTIFY channel carrying owner ids of changed records.
pub const CHANGE_CHANNEL: &str = "customer_changes";

// =============================================================================
// EVENTS
// =============================================================================

/// Broadcast buffer for the record event bus.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// WIPE
// =============================================================================

/// Rows deleted per batch by the administrative wipe.
pub const WIPE_BATCH_SIZE: i64 = 200;

/// Collections wiped when `COLLECTIONS` is unset.
pub const WIPE_COLLECTIONS: &str = "people,products,projects";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_cap_fits_max_pictures_at_file_cap() {
        assert!(MAX_SELECTION_BYTES >= MAX_FILE_BYTES * MAX_PICTURES as u64);
    }

    #[test]
    fn test_wipe_batch_positive() {
        assert!(WIPE_BATCH_SIZE > 0);
    }
}
