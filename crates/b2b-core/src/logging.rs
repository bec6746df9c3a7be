//! Structured logging field name constants for bid2build.
//!
//! All crates use these constants for consistent structured logging fields.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Write or upload failed, user sees an error |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration (individual uploads, emissions) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "store", "blob", "people", "wipe"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pg_customers", "memory_customers", "live_feed", "controller"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "create", "patch", "delete", "upload", "submit_create"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Owner identity scoping the record.
pub const OWNER: &str = "owner";

/// Customer UUID being operated on.
pub const CUSTOMER_ID: &str = "customer_id";

/// Blob path being written.
pub const BLOB_PATH: &str = "blob_path";

/// Search query text.
pub const QUERY: &str = "query";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of records returned or emitted.
pub const RESULT_COUNT: &str = "result_count";

/// Number of files in an upload batch.
pub const FILE_COUNT: &str = "file_count";

/// Byte size of a file or batch.
pub const SIZE_BYTES: &str = "size_bytes";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Provider-specific error code (SQLSTATE, HTTP status).
pub const ERROR_CODE: &str = "error_code";
