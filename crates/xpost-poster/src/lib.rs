//! Posting with transparent token refresh
//!
//! Publishes content as a specific user and handles access-token expiry
//! in-line: a 401 from the publish endpoint triggers one refresh-and-retry
//! cycle, with the refreshed pair persisted before the retry. Every failure
//! mode is folded into a structured `PostResult`, so a scheduled trigger
//! never dies on a posting fault.
//!
//! Posting flow:
//! 1. Trigger calls `Poster::post_random_for_user` (or the first-user /
//!    literal-text variants)
//! 2. Credentials come from the workbook, content from the channel pool
//! 3. `Poster::post` publishes, refreshing on 401 exactly once
//! 4. Refreshed tokens are written back to the workbook

pub mod poster;

pub use poster::{PostResult, Poster};
