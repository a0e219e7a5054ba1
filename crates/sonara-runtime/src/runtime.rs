use crate::client::TensorBackend;
use crate::model::Model;
use sonara_core::{InferenceError, ModelSpec, TaskKind};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Registry of loaded models keyed by model name. Loading is idempotent;
/// a second load of the same name returns the existing handle.
pub struct ModelRuntime {
    backend: Arc<dyn TensorBackend>,
    models: RwLock<HashMap<String, Arc<Model>>>,
}

impl ModelRuntime {
    pub fn new(backend: Arc<dyn TensorBackend>) -> Self {
        Self {
            backend,
            models: RwLock::new(HashMap::new()),
        }
    }

    /// Probe readiness, load decode assets, and register the model. For
    /// speech recognition the decoder model is probed as well.
    pub async fn load_model(&self, spec: ModelSpec) -> Result<Arc<Model>, InferenceError> {
        let name = spec.model_name.trim().to_string();
        if name.is_empty() {
            return Err(InferenceError::RequestFailed(
                "model name is required".to_string(),
            ));
        }

        {
            let models = self.models.read().await;
            if let Some(model) = models.get(&name) {
                tracing::debug!(model = %name, "model already loaded");
                return Ok(Arc::clone(model));
            }
        }

        self.backend.model_ready(&name).await?;
        if spec.task == TaskKind::Asr {
            if let Some(decoder) = spec.decoder_name.as_deref() {
                let decoder = decoder.trim();
                if !decoder.is_empty() {
                    self.backend.model_ready(decoder).await?;
                }
            }
        }

        let model = Arc::new(Model::new(spec, Arc::clone(&self.backend))?);

        let mut models = self.models.write().await;
        // A concurrent load may have won the race.
        if let Some(existing) = models.get(&name) {
            return Ok(Arc::clone(existing));
        }
        models.insert(name.clone(), Arc::clone(&model));
        tracing::info!(model = %name, task = %model.spec().task, "model loaded");
        Ok(model)
    }

    pub async fn get(&self, name: &str) -> Result<Arc<Model>, InferenceError> {
        let models = self.models.read().await;
        models
            .get(name)
            .cloned()
            .ok_or_else(|| InferenceError::ModelNotLoaded(name.to_string()))
    }

    /// First loaded model for the given task, if any.
    pub async fn get_for_task(&self, task: TaskKind) -> Option<Arc<Model>> {
        let models = self.models.read().await;
        models
            .values()
            .find(|m| m.spec().task == task)
            .cloned()
    }

    pub async fn loaded_names(&self) -> Vec<String> {
        let models = self.models.read().await;
        let mut names: Vec<String> = models.keys().cloned().collect();
        names.sort();
        names
    }

    /// Readiness probe against the backend, independent of load state.
    pub async fn probe(&self, name: &str) -> Result<(), InferenceError> {
        self.backend.model_ready(name).await
    }

    /// Drop all registered models. Safe to call more than once.
    pub async fn close(&self) {
        let mut models = self.models.write().await;
        if !models.is_empty() {
            tracing::info!(count = models.len(), "unloading models");
        }
        models.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{TensorInput, TensorOutput};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ReadyBackend {
        ready_calls: AtomicUsize,
    }

    impl ReadyBackend {
        fn new() -> Self {
            Self {
                ready_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TensorBackend for ReadyBackend {
        async fn model_ready(&self, _model: &str) -> Result<(), InferenceError> {
            self.ready_calls.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn infer(
            &self,
            _model: &str,
            _inputs: Vec<TensorInput>,
            _output_names: &[String],
        ) -> Result<HashMap<String, TensorOutput>, InferenceError> {
            Ok(HashMap::new())
        }
    }

    struct NeverReadyBackend;

    #[async_trait]
    impl TensorBackend for NeverReadyBackend {
        async fn model_ready(&self, model: &str) -> Result<(), InferenceError> {
            Err(InferenceError::ModelNotReady(model.to_string()))
        }

        async fn infer(
            &self,
            _model: &str,
            _inputs: Vec<TensorInput>,
            _output_names: &[String],
        ) -> Result<HashMap<String, TensorOutput>, InferenceError> {
            Ok(HashMap::new())
        }
    }

    #[tokio::test]
    async fn test_load_model_registers_and_is_idempotent() {
        let backend = Arc::new(ReadyBackend::new());
        let runtime = ModelRuntime::new(backend.clone());

        let spec = ModelSpec::new(TaskKind::Emotion, "emotion_model");
        let first = runtime.load_model(spec.clone()).await.unwrap();
        let second = runtime.load_model(spec).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        // Only the first load probes readiness.
        assert_eq!(backend.ready_calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_load_asr_probes_decoder_too() {
        let backend = Arc::new(ReadyBackend::new());
        let runtime = ModelRuntime::new(backend.clone());

        let mut spec = ModelSpec::new(TaskKind::Asr, "whisper_encoder");
        spec.decoder_name = Some("whisper_decoder".to_string());
        runtime.load_model(spec).await.unwrap();
        assert_eq!(backend.ready_calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_load_model_not_ready_fails() {
        let runtime = ModelRuntime::new(Arc::new(NeverReadyBackend));
        let result = runtime
            .load_model(ModelSpec::new(TaskKind::Synthesis, "synthesis_model"))
            .await;
        assert!(matches!(result, Err(InferenceError::ModelNotReady(_))));
    }

    #[tokio::test]
    async fn test_load_model_blank_name_fails() {
        let runtime = ModelRuntime::new(Arc::new(ReadyBackend::new()));
        let result = runtime
            .load_model(ModelSpec::new(TaskKind::Emotion, "  "))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_get_unknown_model_fails() {
        let runtime = ModelRuntime::new(Arc::new(ReadyBackend::new()));
        let result = runtime.get("nope").await;
        assert!(matches!(result, Err(InferenceError::ModelNotLoaded(_))));
    }

    #[tokio::test]
    async fn test_get_for_task() {
        let runtime = ModelRuntime::new(Arc::new(ReadyBackend::new()));
        runtime
            .load_model(ModelSpec::new(TaskKind::Emotion, "emotion_model"))
            .await
            .unwrap();
        assert!(runtime.get_for_task(TaskKind::Emotion).await.is_some());
        assert!(runtime.get_for_task(TaskKind::Synthesis).await.is_none());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let runtime = ModelRuntime::new(Arc::new(ReadyBackend::new()));
        runtime
            .load_model(ModelSpec::new(TaskKind::Emotion, "emotion_model"))
            .await
            .unwrap();
        runtime.close().await;
        runtime.close().await;
        assert!(runtime.get("emotion_model").await.is_err());
    }
}
