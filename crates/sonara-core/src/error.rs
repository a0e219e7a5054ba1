use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid audio payload: {0}")]
    InvalidPayload(String),

    #[error("audio data is empty")]
    Empty,

    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(u32),
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read asset file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("malformed asset file {path}: {reason}")]
    Malformed { path: String, reason: String },
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference request failed: {0}")]
    RequestFailed(String),

    #[error("model {model} returned status {status}: {body}")]
    BackendStatus {
        model: String,
        status: u16,
        body: String,
    },

    #[error("model not ready: {0}")]
    ModelNotReady(String),

    #[error("malformed inference response: {0}")]
    BadResponse(String),

    #[error("model has no decoder configured: {0}")]
    MissingDecoder(String),

    #[error("unsupported input for task: {0}")]
    Unsupported(String),

    #[error("model not loaded: {0}")]
    ModelNotLoaded(String),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Asset(#[from] AssetError),
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("unsupported task: {0}")]
    UnknownTask(String),

    #[error("prerequisite missing: {0}")]
    PrerequisiteMissing(String),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Audio(#[from] AudioError),
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("{0} channel not configured")]
    ChannelNotConfigured(&'static str),

    #[error("bridge listener already running")]
    AlreadyListening,

    #[error("service registration failed: {0}")]
    RegistrationFailed(String),

    #[error("remote error: {0}")]
    Remote(String),

    #[error("failed to close bridge: {0}")]
    CloseFailed(String),
}
