use crate::error::ConfigError;
use crate::types::{InputRepr, ModelSpec, TaskKind};
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub bridge: Option<BridgeConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            service_name: default_service_name(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ModelsConfig {
    #[serde(default)]
    pub asr: Option<ModelConfig>,

    #[serde(default)]
    pub emotion: Option<ModelConfig>,

    #[serde(default)]
    pub synthesis: Option<ModelConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    pub model_name: String,

    #[serde(default)]
    pub decoder_name: Option<String>,

    #[serde(default)]
    pub input_name: Option<String>,

    #[serde(default)]
    pub output_names: Vec<String>,

    /// "waveform" or "mel"; defaults to the per-task convention.
    #[serde(default)]
    pub input_repr: Option<String>,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default)]
    pub language: Option<String>,

    #[serde(default)]
    pub vocab_path: Option<PathBuf>,

    #[serde(default)]
    pub special_tokens_path: Option<PathBuf>,

    #[serde(default)]
    pub decode_config_path: Option<PathBuf>,

    #[serde(default)]
    pub labels_path: Option<PathBuf>,
}

impl ModelConfig {
    pub fn to_spec(&self, task: TaskKind) -> Result<ModelSpec, ConfigError> {
        let mut spec = ModelSpec::new(task, self.model_name.clone());
        spec.decoder_name = self.decoder_name.clone();
        spec.input_name = self.input_name.clone();
        spec.output_names = self.output_names.clone();
        spec.sample_rate = self.sample_rate;
        spec.language = self.language.clone();
        spec.vocab_path = self.vocab_path.clone();
        spec.special_tokens_path = self.special_tokens_path.clone();
        spec.decode_config_path = self.decode_config_path.clone();
        spec.labels_path = self.labels_path.clone();

        if let Some(repr) = self.input_repr.as_deref() {
            spec.input_repr = match repr {
                "waveform" => InputRepr::Waveform,
                "mel" => InputRepr::Mel,
                other => {
                    return Err(ConfigError::Invalid(format!(
                        "unknown input_repr '{other}' for model {}",
                        self.model_name
                    )))
                }
            };
        }

        Ok(spec)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BridgeConfig {
    #[serde(default)]
    pub publish_url: Option<String>,

    #[serde(default)]
    pub subscribe_url: Option<String>,

    #[serde(default)]
    pub request_url: Option<String>,

    #[serde(default)]
    pub reply_url: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "sonara".to_string()
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_sample_rate() -> u32 {
    16000
}

/// Interpolate `${VAR}` patterns with environment variable values.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([^}]+)\}").unwrap();
    let mut result = input.to_string();
    let mut errors = Vec::new();

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(val) => {
                result = result.replace(&cap[0], &val);
            }
            Err(_) => {
                errors.push(var_name.to_string());
            }
        }
    }

    if let Some(first_missing) = errors.into_iter().next() {
        return Err(ConfigError::EnvVarNotFound(first_missing));
    }

    Ok(result)
}

impl AppConfig {
    /// Load configuration from a TOML file, with environment variable interpolation.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let interpolated = interpolate_env_vars(&content)?;
        let config: AppConfig = toml::from_str(&interpolated)?;
        Ok(config)
    }

    /// Parse configuration from a TOML string (for testing).
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let interpolated = interpolate_env_vars(s)?;
        let config: AppConfig = toml::from_str(&interpolated)?;
        Ok(config)
    }

    /// Build specs for every configured model, keyed by task.
    pub fn model_specs(&self) -> Result<Vec<ModelSpec>, ConfigError> {
        let mut specs = Vec::new();
        if let Some(cfg) = &self.models.asr {
            specs.push(cfg.to_spec(TaskKind::Asr)?);
        }
        if let Some(cfg) = &self.models.emotion {
            specs.push(cfg.to_spec(TaskKind::Emotion)?);
        }
        if let Some(cfg) = &self.models.synthesis {
            specs.push(cfg.to_spec(TaskKind::Synthesis)?);
        }
        Ok(specs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parse_valid_toml() {
        let toml_str = r#"
[general]
log_level = "debug"
service_name = "ai-inference"

[runtime]
endpoint = "http://triton:8000"
timeout_secs = 10

[models.asr]
model_name = "whisper_encoder"
decoder_name = "whisper_decoder"
language = "en"
vocab_path = "./assets/vocab.json"

[models.emotion]
model_name = "emotion_model"
labels_path = "./assets/emotion_labels.json"

[bridge]
publish_url = "tcp://*:5555"
subscribe_url = "tcp://localhost:5556"
request_url = "tcp://localhost:5557"
reply_url = "tcp://*:5558"
"#;
        let config = AppConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.service_name, "ai-inference");
        assert_eq!(config.runtime.endpoint, "http://triton:8000");
        assert_eq!(config.runtime.timeout_secs, 10);

        let asr = config.models.asr.as_ref().unwrap();
        assert_eq!(asr.model_name, "whisper_encoder");
        assert_eq!(asr.decoder_name.as_deref(), Some("whisper_decoder"));
        assert_eq!(asr.language.as_deref(), Some("en"));

        let bridge = config.bridge.unwrap();
        assert_eq!(bridge.publish_url.as_deref(), Some("tcp://*:5555"));
        assert_eq!(bridge.reply_url.as_deref(), Some("tcp://*:5558"));
    }

    #[test]
    fn test_config_default_values() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.service_name, "sonara");
        assert_eq!(config.runtime.endpoint, "http://127.0.0.1:8000");
        assert_eq!(config.runtime.timeout_secs, 30);
        assert!(config.models.asr.is_none());
        assert!(config.bridge.is_none());
    }

    #[test]
    fn test_config_env_var_interpolation() {
        std::env::set_var("SONARA_TEST_ENDPOINT", "http://gpu-box:8000");
        let toml_str = r#"
[runtime]
endpoint = "${SONARA_TEST_ENDPOINT}"
"#;
        let config = AppConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.runtime.endpoint, "http://gpu-box:8000");
        std::env::remove_var("SONARA_TEST_ENDPOINT");
    }

    #[test]
    fn test_config_missing_env_var_error() {
        let toml_str = r#"
[runtime]
endpoint = "${DEFINITELY_DOES_NOT_EXIST_12345}"
"#;
        let result = AppConfig::from_toml_str(toml_str);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("DEFINITELY_DOES_NOT_EXIST_12345"));
    }

    #[test]
    fn test_config_invalid_toml_error() {
        let result = AppConfig::from_toml_str("this is not valid toml [[[");
        assert!(result.is_err());
    }

    #[test]
    fn test_model_config_to_spec_defaults() {
        let toml_str = r#"
[models.asr]
model_name = "whisper_encoder"
"#;
        let config = AppConfig::from_toml_str(toml_str).unwrap();
        let spec = config
            .models
            .asr
            .unwrap()
            .to_spec(TaskKind::Asr)
            .unwrap();
        assert_eq!(spec.model_name, "whisper_encoder");
        assert_eq!(spec.sample_rate, 16000);
        assert_eq!(spec.input_repr, InputRepr::Mel);
        assert_eq!(spec.resolved_input_name(), "mel");
    }

    #[test]
    fn test_model_config_invalid_input_repr() {
        let cfg = ModelConfig {
            model_name: "m".to_string(),
            decoder_name: None,
            input_name: None,
            output_names: Vec::new(),
            input_repr: Some("spectrogram".to_string()),
            sample_rate: 16000,
            language: None,
            vocab_path: None,
            special_tokens_path: None,
            decode_config_path: None,
            labels_path: None,
        };
        let result = cfg.to_spec(TaskKind::Synthesis);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_model_config_mel_input_repr_for_synthesis() {
        let toml_str = r#"
[models.synthesis]
model_name = "synthesis_model"
input_repr = "mel"
"#;
        let config = AppConfig::from_toml_str(toml_str).unwrap();
        let spec = config
            .models
            .synthesis
            .unwrap()
            .to_spec(TaskKind::Synthesis)
            .unwrap();
        assert_eq!(spec.input_repr, InputRepr::Mel);
    }

    #[test]
    fn test_config_model_specs_skips_unconfigured() {
        let toml_str = r#"
[models.asr]
model_name = "whisper_encoder"

[models.synthesis]
model_name = "synthesis_model"
"#;
        let config = AppConfig::from_toml_str(toml_str).unwrap();
        let specs = config.model_specs().unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].task, TaskKind::Asr);
        assert_eq!(specs[1].task, TaskKind::Synthesis);
    }

    #[test]
    fn test_config_load_from_file() {
        let dir = std::env::temp_dir().join("sonara_test_config");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("test.toml");
        std::fs::write(
            &path,
            r#"
[general]
log_level = "warn"

[models.emotion]
model_name = "emotion_model"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.models.emotion.unwrap().model_name, "emotion_model");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_config_load_from_file_not_found() {
        let result = AppConfig::load_from_file(std::path::Path::new("/nonexistent/path.toml"));
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("failed to read config file"));
    }
}
