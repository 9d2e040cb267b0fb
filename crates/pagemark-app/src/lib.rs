//! Pagemark Application
//!
//! Command line shell: flattens saved annotations over page images and
//! inspects annotation records.

mod app;
pub mod backend;

pub use app::{App, AppError, AppResult, PageSummary, fingerprint, load_record, summarize};
pub use backend::{ImageBackend, ImageDocument};
