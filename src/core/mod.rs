//! Core types shared across the crate.

mod cancel;
mod error;
pub mod progress;
mod test_id;

pub use cancel::CancellationToken;
pub use error::{Error, Result};
pub use test_id::TestId;
