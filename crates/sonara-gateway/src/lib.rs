//! Request-level orchestration: parse the requested tasks, run them against
//! the model runtime, aggregate the outcomes, and emit completion events.

pub mod events;
pub mod gateway;
pub mod task;

pub use events::{completion_event, dispatch_external, publish_completions};
pub use gateway::{
    InferenceGateway, ProcessAudioRequest, ProcessAudioResponse, TaskResult, WarmupEntry,
};
pub use task::GatewayTask;
