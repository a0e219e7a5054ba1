pub mod assets;
pub mod client;
pub mod decode;
pub mod model;
pub mod runtime;

pub use assets::{load_labels, DecodeConfig, SpecialTokens, WhisperAssets};
pub use client::{HttpTensorClient, TensorBackend, TensorData, TensorInput, TensorOutput};
pub use decode::greedy_decode;
pub use model::Model;
pub use runtime::ModelRuntime;
