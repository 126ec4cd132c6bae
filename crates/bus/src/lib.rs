pub mod consumer;
pub mod producer;

pub use consumer::{EventConsumer, Handler};
pub use producer::EventProducer;
