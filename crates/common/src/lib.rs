//! Common types for the X autopost workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
