//! Event bus, its application payload, and chained waits.

pub mod chain;
pub mod emitter;
pub mod payload;

pub use chain::{ChainError, chain_events};
pub use emitter::{EventBus, Listener, ListenerId, listener};
pub use payload::Payload;
