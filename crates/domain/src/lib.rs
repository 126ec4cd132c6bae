pub mod config;
pub mod conversation;
pub mod error;
pub mod events;
pub mod telemetry;
pub mod topic;

pub use error::{Error, Result};
