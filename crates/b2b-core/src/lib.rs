//! # b2b-core
//!
//! Core types, traits, and abstractions for bid2build.
//!
//! This crate provides the customer data model, the error taxonomy, and the
//! adapter traits (record store, blob store, identity) that the storage and
//! form crates build on.

pub mod defaults;
pub mod error;
pub mod events;
pub mod file_safety;
pub mod identity;
pub mod logging;
pub mod models;
pub mod search;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use events::{EventActor, EventBus, EventEnvelope, RecordEvent};
pub use file_safety::{detect_content_type, is_image_upload, sanitize_filename, ImageCheck};
pub use identity::{IdentityProvider, SessionHandle, SessionState};
pub use models::*;
pub use search::{search_customers, search_haystack};
pub use traits::*;
pub use uuid_utils::{extract_timestamp, new_v7};
