use crate::assets::{load_labels, WhisperAssets};
use crate::client::{select_output, TensorBackend, TensorInput};
use crate::decode::greedy_decode;
use sonara_audio::{compute_log_mel, MelConfig};
use sonara_core::{
    AudioError, InferenceError, InferenceRequest, InferenceResult, InputRepr, ModelSpec, TaskKind,
};
use std::sync::Arc;

/// A model bound to a backend together with its decode-time assets.
/// Cheap to share; all inference goes through the backend.
pub struct Model {
    spec: ModelSpec,
    backend: Arc<dyn TensorBackend>,
    whisper: Option<WhisperAssets>,
    labels: Vec<String>,
}

impl Model {
    pub(crate) fn new(spec: ModelSpec, backend: Arc<dyn TensorBackend>) -> Result<Self, InferenceError> {
        let mut model = Self {
            spec,
            backend,
            whisper: None,
            labels: Vec::new(),
        };
        match model.spec.task {
            TaskKind::Asr => {
                let mut assets = WhisperAssets::load(
                    model.spec.decode_config_path.as_deref(),
                    model.spec.special_tokens_path.as_deref(),
                    model.spec.vocab_path.as_deref(),
                )?;
                assets.language_hint = model.spec.language.clone();
                model.whisper = Some(assets);
            }
            TaskKind::Emotion => {
                if let Some(path) = &model.spec.labels_path {
                    model.labels = load_labels(path)?;
                }
            }
            TaskKind::Synthesis => {}
        }
        Ok(model)
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub async fn infer(&self, req: &InferenceRequest) -> Result<InferenceResult, InferenceError> {
        match self.spec.task {
            TaskKind::Asr => self.infer_speech(req).await,
            TaskKind::Emotion => self.infer_emotion(req).await,
            TaskKind::Synthesis => self.infer_synthesis(req).await,
        }
    }

    async fn infer_speech(&self, req: &InferenceRequest) -> Result<InferenceResult, InferenceError> {
        if req.samples.is_empty() {
            return Err(AudioError::Empty.into());
        }
        let decoder_model = self
            .spec
            .decoder_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| InferenceError::MissingDecoder(self.spec.model_name.clone()))?;

        let assets = self.whisper.clone().unwrap_or_default();
        let mut mel_cfg = MelConfig::whisper(req.sample_rate);
        if assets.config.n_mels > 0 {
            mel_cfg.n_mels = assets.config.n_mels;
        }
        let (mel, frames) = compute_log_mel(&req.samples, &mel_cfg, assets.config.mel_length)?;

        let output_names = self.spec.resolved_output_names();
        let inputs = vec![TensorInput::fp32(
            self.spec.resolved_input_name(),
            vec![1, mel_cfg.n_mels as i64, frames as i64],
            mel,
        )];
        let outputs = self
            .backend
            .infer(&self.spec.model_name, inputs, &output_names)
            .await?;
        let encoder_tensor = select_output(outputs, &output_names)?;
        let encoder_data = encoder_tensor.to_f32()?;
        if encoder_data.is_empty() {
            return Err(InferenceError::BadResponse(
                "encoder output empty".to_string(),
            ));
        }

        let language = req.params.get("language").cloned().unwrap_or_default();
        let (tokens, text) = greedy_decode(
            self.backend.as_ref(),
            decoder_model,
            &assets,
            &encoder_data,
            &encoder_tensor.shape,
            &language,
        )
        .await?;

        let mut result = InferenceResult::default();
        result.outputs.insert("text".to_string(), serde_json::json!(text));
        result
            .outputs
            .insert("tokens".to_string(), serde_json::json!(tokens));
        result
            .outputs
            .insert("language".to_string(), serde_json::json!(language));
        result
            .outputs
            .insert("confidence".to_string(), serde_json::json!(0.0));
        Ok(result)
    }

    async fn infer_emotion(&self, req: &InferenceRequest) -> Result<InferenceResult, InferenceError> {
        if req.samples.is_empty() {
            if req.params.contains_key("text") {
                return Err(InferenceError::Unsupported(
                    "text emotion inference is not supported by this runtime".to_string(),
                ));
            }
            return Err(AudioError::Empty.into());
        }

        let output_names = self.spec.resolved_output_names();
        let inputs = vec![TensorInput::fp32(
            self.spec.resolved_input_name(),
            vec![1, req.samples.len() as i64],
            req.samples.clone(),
        )];
        let outputs = self
            .backend
            .infer(&self.spec.model_name, inputs, &output_names)
            .await?;
        let tensor = select_output(outputs, &output_names)?;
        let logits = tensor.to_f32()?;
        if logits.is_empty() {
            return Err(InferenceError::BadResponse(
                "emotion output empty".to_string(),
            ));
        }

        let probs = softmax(&logits);
        let best = argmax_f64(&probs);
        let label = self
            .labels
            .get(best)
            .cloned()
            .unwrap_or_else(|| format!("emotion_{best}"));
        let mut all = serde_json::Map::new();
        for (i, p) in probs.iter().enumerate() {
            let name = self
                .labels
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("emotion_{i}"));
            all.insert(name, serde_json::json!(p));
        }

        let mut result = InferenceResult::default();
        result
            .outputs
            .insert("emotion".to_string(), serde_json::json!(label));
        result
            .outputs
            .insert("confidence".to_string(), serde_json::json!(probs[best]));
        result
            .outputs
            .insert("emotions".to_string(), serde_json::Value::Object(all));
        Ok(result)
    }

    async fn infer_synthesis(&self, req: &InferenceRequest) -> Result<InferenceResult, InferenceError> {
        if req.samples.is_empty() {
            return Err(AudioError::Empty.into());
        }

        let input_name = self.spec.resolved_input_name();
        let inputs = match self.spec.input_repr {
            InputRepr::Waveform => vec![TensorInput::fp32(
                input_name,
                vec![1, req.samples.len() as i64],
                req.samples.clone(),
            )],
            InputRepr::Mel => {
                let mel_cfg = MelConfig::whisper(req.sample_rate);
                let (mel, frames) = compute_log_mel(&req.samples, &mel_cfg, 0)?;
                vec![TensorInput::fp32(
                    input_name,
                    vec![1, mel_cfg.n_mels as i64, frames as i64],
                    mel,
                )]
            }
        };

        let output_names = self.spec.resolved_output_names();
        let outputs = self
            .backend
            .infer(&self.spec.model_name, inputs, &output_names)
            .await?;
        let tensor = select_output(outputs, &output_names)?;
        let values = tensor.to_f32()?;
        if values.is_empty() {
            return Err(InferenceError::BadResponse(
                "synthesis output empty".to_string(),
            ));
        }

        let prob = synthesis_probability(&values);
        let mut result = InferenceResult::default();
        result
            .outputs
            .insert("is_synthetic".to_string(), serde_json::json!(prob > 0.5));
        result.outputs.insert(
            "probability_synthetic".to_string(),
            serde_json::json!(prob),
        );
        result
            .outputs
            .insert("confidence".to_string(), serde_json::json!(prob));
        Ok(result)
    }
}

pub fn argmax(values: &[f32]) -> usize {
    let mut best_idx = 0;
    let mut best_val = f32::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if v > best_val {
            best_val = v;
            best_idx = i;
        }
    }
    best_idx
}

pub fn argmax_f64(values: &[f64]) -> usize {
    let mut best_idx = 0;
    let mut best_val = f64::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if v > best_val {
            best_val = v;
            best_idx = i;
        }
    }
    best_idx
}

/// Numerically stable softmax over f32 logits.
pub fn softmax(values: &[f32]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let max_val = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut out: Vec<f64> = values
        .iter()
        .map(|&v| f64::from(v - max_val).exp())
        .collect();
    let sum: f64 = out.iter().sum();
    if sum != 0.0 {
        for v in out.iter_mut() {
            *v /= sum;
        }
    }
    out
}

/// Single logit means sigmoid; multiple means the softmax probability of
/// class 1 (synthetic).
pub fn synthesis_probability(values: &[f32]) -> f64 {
    if values.len() == 1 {
        return sigmoid(f64::from(values[0]));
    }
    let probs = softmax(values);
    if probs.len() > 1 {
        probs[1]
    } else {
        probs[0]
    }
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
