use crate::task::GatewayTask;
use serde::Serialize;
use sonara_audio::{decode_audio, resample_linear};
use sonara_core::{InferenceRequest, ModelSpec, TaskError, TaskKind};
use sonara_runtime::ModelRuntime;
use std::collections::HashMap;
use std::sync::Arc;

const DEFAULT_FORMAT: &str = "wav";
const DEFAULT_SAMPLE_RATE: u32 = 16000;
const DEFAULT_CHANNELS: u16 = 1;

/// One audio processing request as received from callers. Unset fields
/// take gateway defaults; an empty task list means speech recognition.
#[derive(Debug, Clone, Default)]
pub struct ProcessAudioRequest {
    pub audio_data: Vec<u8>,
    pub format: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub tasks: Vec<String>,
    pub meeting_id: String,
    pub user_id: String,
    pub language: String,
}

/// Result of one task within a request, keyed by the task name the caller
/// used.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    pub result_type: String,
    pub result_data: serde_json::Value,
    pub confidence: f64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessAudioResponse {
    pub task_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub results: HashMap<String, TaskResult>,
}

impl ProcessAudioResponse {
    fn failed(task_id: String, error: impl Into<String>) -> Self {
        Self {
            task_id,
            status: "error".to_string(),
            error: Some(error.into()),
            results: HashMap::new(),
        }
    }
}

/// Per-model outcome of a warmup pass.
#[derive(Debug, Clone, Serialize)]
pub struct WarmupEntry {
    pub model_name: String,
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Front door for audio inference. Holds the model runtime and the static
/// model specs, fans each request out to its tasks, and aggregates the
/// per-task outcomes into one response.
pub struct InferenceGateway {
    runtime: Arc<ModelRuntime>,
    specs: HashMap<TaskKind, ModelSpec>,
    service_name: String,
}

impl InferenceGateway {
    pub fn new(
        runtime: Arc<ModelRuntime>,
        specs: Vec<ModelSpec>,
        service_name: impl Into<String>,
    ) -> Self {
        let specs = specs.into_iter().map(|s| (s.task, s)).collect();
        Self {
            runtime,
            specs,
            service_name: service_name.into(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Decode the payload once, then run the requested tasks in order.
    /// One failing task degrades the response to partial; if nothing
    /// succeeds the response is an error carrying the first failure.
    pub async fn process_audio(&self, req: &ProcessAudioRequest) -> ProcessAudioResponse {
        let task_id = format!("ai_{}", uuid::Uuid::new_v4());
        if req.audio_data.is_empty() {
            return ProcessAudioResponse::failed(task_id, "audio_data is required");
        }

        let format = {
            let f = req.format.trim();
            if f.is_empty() {
                DEFAULT_FORMAT
            } else {
                f
            }
        };
        let sample_rate = if req.sample_rate == 0 {
            DEFAULT_SAMPLE_RATE
        } else {
            req.sample_rate
        };
        let channels = if req.channels == 0 {
            DEFAULT_CHANNELS
        } else {
            req.channels
        };
        let task_names: Vec<String> = if req.tasks.is_empty() {
            vec!["speech_recognition".to_string()]
        } else {
            req.tasks.clone()
        };

        let decoded = match decode_audio(&req.audio_data, format, sample_rate, channels) {
            Ok(decoded) => decoded,
            Err(e) => return ProcessAudioResponse::failed(task_id, e.to_string()),
        };
        tracing::debug!(
            task_id = %task_id,
            samples = decoded.samples.len(),
            sample_rate = decoded.sample_rate,
            tasks = task_names.len(),
            "processing audio request"
        );

        let mut results: HashMap<String, TaskResult> = HashMap::new();
        let mut first_err: Option<String> = None;
        let mut transcript: Option<String> = None;

        for raw in &task_names {
            let task = match GatewayTask::parse(raw) {
                Ok(Some(task)) => task,
                Ok(None) => continue,
                Err(e) => {
                    first_err.get_or_insert(e.to_string());
                    continue;
                }
            };

            match self
                .run_task(task, &decoded.samples, decoded.sample_rate, req, &transcript)
                .await
            {
                Ok(result) => {
                    if task == GatewayTask::SpeechRecognition {
                        transcript = result
                            .result_data
                            .get("text")
                            .and_then(|v| v.as_str())
                            .map(str::to_string);
                    }
                    results.insert(raw.clone(), result);
                }
                Err(e) => {
                    tracing::warn!(task = %task, error = %e, "task failed");
                    first_err.get_or_insert(e.to_string());
                }
            }
        }

        let status = match (&first_err, results.is_empty()) {
            (None, _) => "ok",
            (Some(_), true) => "error",
            (Some(_), false) => "partial",
        };
        ProcessAudioResponse {
            task_id,
            status: status.to_string(),
            error: first_err,
            results,
        }
    }

    async fn run_task(
        &self,
        task: GatewayTask,
        samples: &[f32],
        sample_rate: u32,
        req: &ProcessAudioRequest,
        transcript: &Option<String>,
    ) -> Result<TaskResult, TaskError> {
        let kind = task.kind();
        if kind == TaskKind::Emotion && transcript.is_none() {
            return Err(TaskError::PrerequisiteMissing(
                "emotion detection needs a speech transcript from the same request".to_string(),
            ));
        }

        let model = self
            .runtime
            .get_for_task(kind)
            .await
            .ok_or_else(|| sonara_core::InferenceError::ModelNotLoaded(kind.to_string()))?;

        let target_rate = model.spec().sample_rate;
        let samples = if sample_rate == target_rate {
            samples.to_vec()
        } else {
            resample_linear(samples, sample_rate, target_rate)
        };

        let mut ireq = InferenceRequest::new(kind, samples, target_rate);
        if !req.language.trim().is_empty() {
            ireq.params
                .insert("language".to_string(), req.language.trim().to_string());
        }
        if kind == TaskKind::Emotion {
            if let Some(text) = transcript {
                ireq.params.insert("text".to_string(), text.clone());
            }
        }

        let outcome = model.infer(&ireq).await?;
        let confidence = outcome.confidence();
        Ok(TaskResult {
            result_type: task.as_str().to_string(),
            result_data: serde_json::json!(outcome.outputs),
            confidence,
            created_at: chrono::Utc::now().timestamp(),
        })
    }

    /// Load the named models ahead of traffic. An empty key list warms
    /// everything configured.
    pub async fn warm_up(&self, keys: &[String]) -> HashMap<String, WarmupEntry> {
        let keys: Vec<String> = if keys.is_empty() {
            vec![
                "asr".to_string(),
                "emotion".to_string(),
                "synthesis".to_string(),
            ]
        } else {
            keys.to_vec()
        };

        let mut report = HashMap::new();
        for key in keys {
            let kind = match key.trim().to_lowercase().as_str() {
                "asr" => Some(TaskKind::Asr),
                "emotion" => Some(TaskKind::Emotion),
                "synthesis" => Some(TaskKind::Synthesis),
                _ => None,
            };
            let entry = match kind {
                None => WarmupEntry {
                    model_name: String::new(),
                    ready: false,
                    error: Some("unknown model key".to_string()),
                },
                Some(kind) => match self.specs.get(&kind) {
                    None => WarmupEntry {
                        model_name: String::new(),
                        ready: false,
                        error: Some("model not configured".to_string()),
                    },
                    Some(spec) => match self.runtime.load_model(spec.clone()).await {
                        Ok(_) => WarmupEntry {
                            model_name: spec.model_name.clone(),
                            ready: true,
                            error: None,
                        },
                        Err(e) => WarmupEntry {
                            model_name: spec.model_name.clone(),
                            ready: false,
                            error: Some(e.to_string()),
                        },
                    },
                },
            };
            report.insert(key, entry);
        }
        report
    }

    /// Probe every configured model against the backend.
    pub async fn health_check(&self) -> serde_json::Value {
        let mut models = serde_json::Map::new();
        let mut all_ready = true;
        for kind in [TaskKind::Asr, TaskKind::Emotion, TaskKind::Synthesis] {
            if let Some(spec) = self.specs.get(&kind) {
                let ready = self.runtime.probe(&spec.model_name).await.is_ok();
                all_ready &= ready;
                models.insert(kind.as_str().to_string(), serde_json::json!(ready));
            }
        }
        serde_json::json!({
            "status": if all_ready { "healthy" } else { "degraded" },
            "service": self.service_name,
            "models": models,
            "timestamp": chrono::Utc::now().timestamp(),
        })
    }

    pub fn service_info(&self) -> serde_json::Value {
        let mut models = serde_json::Map::new();
        for kind in [TaskKind::Asr, TaskKind::Emotion, TaskKind::Synthesis] {
            if let Some(spec) = self.specs.get(&kind) {
                models.insert(
                    kind.as_str().to_string(),
                    serde_json::json!(spec.model_name),
                );
            }
        }
        serde_json::json!({
            "service": self.service_name,
            "version": env!("CARGO_PKG_VERSION"),
            "description": "audio inference gateway for speech, emotion and synthesis analysis",
            "capabilities": [
                "speech_recognition",
                "emotion_detection",
                "synthesis_detection",
            ],
            "models": models,
            "timestamp": chrono::Utc::now().timestamp(),
        })
    }
}
