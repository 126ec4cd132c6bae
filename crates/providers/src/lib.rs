pub mod anthropic;
pub mod client;
pub mod factory;
pub mod google;
pub mod resilience;
pub mod traits;

pub use client::ResilientClient;
pub use factory::LlmClientFactory;
pub use traits::{GenerateRequest, GenerateResponse, HistoryTurn, RawProvider};
