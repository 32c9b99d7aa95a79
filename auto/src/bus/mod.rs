//! Message bus - in-process pub/sub with a bounded durable history

mod core;
mod message;

pub use core::{MessageBus, NO_RESPONSE_TIMEOUT_LOG};
pub use message::{BusMessage, MessageFilter, MessagePriority, MessageType, Recipient};
