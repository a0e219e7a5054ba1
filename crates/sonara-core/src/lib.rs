pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, BridgeConfig, ModelConfig, RuntimeConfig};
pub use error::{
    AssetError, AudioError, BridgeError, ConfigError, InferenceError, TaskError,
};
pub use types::{InferenceRequest, InferenceResult, InputRepr, ModelSpec, TaskKind};
