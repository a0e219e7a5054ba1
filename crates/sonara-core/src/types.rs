use std::collections::HashMap;
use std::path::PathBuf;

/// The inference tasks this service knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Asr,
    Emotion,
    Synthesis,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Asr => "asr",
            TaskKind::Emotion => "emotion",
            TaskKind::Synthesis => "synthesis",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a model expects its audio input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRepr {
    /// Raw mono f32 samples, shape `[1, len]`.
    Waveform,
    /// Log-mel spectrogram, shape `[1, n_mels, frames]`.
    Mel,
}

/// Static description of a deployed model. Immutable once built.
#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub task: TaskKind,
    pub model_name: String,
    /// Second-stage decoder model, required for speech recognition.
    pub decoder_name: Option<String>,
    pub input_name: Option<String>,
    pub output_names: Vec<String>,
    pub input_repr: InputRepr,
    pub sample_rate: u32,
    /// Default decode language hint.
    pub language: Option<String>,
    pub vocab_path: Option<PathBuf>,
    pub special_tokens_path: Option<PathBuf>,
    pub decode_config_path: Option<PathBuf>,
    pub labels_path: Option<PathBuf>,
}

impl ModelSpec {
    pub fn new(task: TaskKind, model_name: impl Into<String>) -> Self {
        Self {
            task,
            model_name: model_name.into(),
            decoder_name: None,
            input_name: None,
            output_names: Vec::new(),
            input_repr: match task {
                TaskKind::Asr => InputRepr::Mel,
                TaskKind::Emotion | TaskKind::Synthesis => InputRepr::Waveform,
            },
            sample_rate: 16000,
            language: None,
            vocab_path: None,
            special_tokens_path: None,
            decode_config_path: None,
            labels_path: None,
        }
    }

    /// Input tensor name, falling back to the per-task convention.
    pub fn resolved_input_name(&self) -> &str {
        if let Some(name) = self.input_name.as_deref() {
            if !name.trim().is_empty() {
                return name;
            }
        }
        match self.task {
            TaskKind::Asr => "mel",
            TaskKind::Emotion | TaskKind::Synthesis => "audio_input",
        }
    }

    /// Requested output tensor names with blanks dropped, falling back to
    /// the per-task convention.
    pub fn resolved_output_names(&self) -> Vec<String> {
        let named: Vec<String> = self
            .output_names
            .iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        if !named.is_empty() {
            return named;
        }
        match self.task {
            TaskKind::Asr => vec!["encoder_output".to_string()],
            TaskKind::Emotion => vec!["logits".to_string()],
            TaskKind::Synthesis => vec!["synthesis_output".to_string()],
        }
    }
}

/// One inference call against a loaded model.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub task: TaskKind,
    /// Mono samples in [-1.0, 1.0] at `sample_rate`.
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub params: HashMap<String, String>,
}

impl InferenceRequest {
    pub fn new(task: TaskKind, samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            task,
            samples,
            sample_rate,
            params: HashMap::new(),
        }
    }
}

/// Task-specific output map, e.g. `text`/`tokens`/`language` for speech
/// recognition or `emotion`/`probabilities` for emotion detection.
#[derive(Debug, Clone, Default)]
pub struct InferenceResult {
    pub outputs: HashMap<String, serde_json::Value>,
}

impl InferenceResult {
    pub fn text(&self) -> Option<&str> {
        self.outputs.get("text").and_then(|v| v.as_str())
    }

    pub fn confidence(&self) -> f64 {
        self.outputs
            .get("confidence")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_kind_as_str() {
        assert_eq!(TaskKind::Asr.as_str(), "asr");
        assert_eq!(TaskKind::Emotion.as_str(), "emotion");
        assert_eq!(TaskKind::Synthesis.as_str(), "synthesis");
    }

    #[test]
    fn test_model_spec_default_tensor_names() {
        let spec = ModelSpec::new(TaskKind::Asr, "whisper_encoder");
        assert_eq!(spec.resolved_input_name(), "mel");
        assert_eq!(spec.resolved_output_names(), vec!["encoder_output"]);

        let spec = ModelSpec::new(TaskKind::Emotion, "emotion_model");
        assert_eq!(spec.resolved_input_name(), "audio_input");
        assert_eq!(spec.resolved_output_names(), vec!["logits"]);

        let spec = ModelSpec::new(TaskKind::Synthesis, "synthesis_model");
        assert_eq!(spec.resolved_output_names(), vec!["synthesis_output"]);
    }

    #[test]
    fn test_model_spec_blank_output_names_dropped() {
        let mut spec = ModelSpec::new(TaskKind::Emotion, "emotion_model");
        spec.output_names = vec!["  ".to_string(), "scores".to_string(), String::new()];
        assert_eq!(spec.resolved_output_names(), vec!["scores"]);
    }

    #[test]
    fn test_model_spec_all_blank_outputs_fall_back() {
        let mut spec = ModelSpec::new(TaskKind::Emotion, "emotion_model");
        spec.output_names = vec![String::new(), " ".to_string()];
        assert_eq!(spec.resolved_output_names(), vec!["logits"]);
    }

    #[test]
    fn test_model_spec_default_input_repr() {
        assert_eq!(
            ModelSpec::new(TaskKind::Asr, "m").input_repr,
            InputRepr::Mel
        );
        assert_eq!(
            ModelSpec::new(TaskKind::Synthesis, "m").input_repr,
            InputRepr::Waveform
        );
    }

    #[test]
    fn test_inference_result_helpers() {
        let mut result = InferenceResult::default();
        assert!(result.text().is_none());
        assert_eq!(result.confidence(), 0.0);

        result
            .outputs
            .insert("text".to_string(), serde_json::json!("hello"));
        result
            .outputs
            .insert("confidence".to_string(), serde_json::json!(0.75));
        assert_eq!(result.text(), Some("hello"));
        assert_eq!(result.confidence(), 0.75);
    }
}
