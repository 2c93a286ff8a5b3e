//! Workbook storage: credential vault and content queue
//!
//! A single JSON file models the tabular store backing the service: a
//! `credentials` table holding one row per authorized user, and named
//! `channels` holding candidate post texts. All writes go through an async
//! Mutex and an atomic temp-file + rename, so overlapping triggers cannot
//! corrupt the file.
//!
//! The credentials table may be absent (reads fail with `StoreUnavailable`
//! until the first authorization provisions it). Content channels are
//! auto-provisioned with sample entries on first access.

pub mod content;
pub mod error;
pub mod workbook;

pub use content::{HeaderMode, filter_contents};
pub use error::{Error, Result};
pub use workbook::{Credential, Workbook};
