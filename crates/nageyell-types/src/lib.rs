//! Shared domain types for the Nage-Yell project.

pub mod config;
pub mod events;
pub mod frame;
pub mod record;
pub mod session;
pub mod status;

mod errors;

pub use errors::{NageError, Result};
