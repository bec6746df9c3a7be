//! # b2b-people
//!
//! The "People" page behind bid2build: a form controller that validates a
//! customer draft and its selected pictures and saves them through the
//! record and blob stores, and a view-model that keeps a searchable live
//! list of the signed-in owner's customers.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use b2b_people::{PeopleController, PeopleView, SelectedFile};
//!
//! let controller = PeopleController::new(store.clone(), blobs, session.clone());
//! controller.update_draft(|d| d.fields.first_name = "Ann".into());
//! controller.select_file(SelectedFile::new("porch.jpg", "image/jpeg", bytes));
//! let id = controller.submit().await?;
//!
//! let mut view = PeopleView::new(store, session);
//! view.sync_owner().await;
//! view.set_query("lee");
//! let shown = view.visible();
//! ```

pub mod config;
pub mod controller;
pub mod draft;
pub mod error;
pub mod selection;
pub mod validation;
pub mod view;

pub use config::PeopleConfig;
pub use controller::{PeopleController, PendingDelete};
pub use draft::{parse_picture_urls, CustomerDraft};
pub use error::{FailedUpload, SubmitError, RETRY_MESSAGE};
pub use selection::{preview_data_url, FileSelection, Preview, SelectedFile, SelectionId};
pub use validation::{validate_create, validate_edit, UploadLimits, ValidationError};
pub use view::PeopleView;
