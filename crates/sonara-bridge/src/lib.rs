//! Bridge to the external compute fabric: message envelope, channel
//! abstraction, ZeroMQ transports and the [`ComputeBridge`] that ties
//! handlers to inbound traffic.

pub mod bridge;
pub mod message;
pub mod transport;
pub mod zmq;

pub use bridge::ComputeBridge;
pub use message::{AiResult, AiTask, Message, MessageHandler};
pub use transport::{in_memory_pair, InMemoryChannel, MessageChannel};
pub use zmq::{PubChannel, RepChannel, ReqChannel, SubChannel};
