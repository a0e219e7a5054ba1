use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sonara_core::InferenceError;
use std::collections::HashMap;
use std::time::Duration;

/// One input tensor for an inference call.
#[derive(Debug, Clone, Serialize)]
pub struct TensorInput {
    pub name: String,
    pub datatype: String,
    pub shape: Vec<i64>,
    pub data: TensorData,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TensorData {
    F32(Vec<f32>),
    I64(Vec<i64>),
}

impl TensorInput {
    pub fn fp32(name: impl Into<String>, shape: Vec<i64>, data: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            datatype: "FP32".to_string(),
            shape,
            data: TensorData::F32(data),
        }
    }

    pub fn int64(name: impl Into<String>, shape: Vec<i64>, data: Vec<i64>) -> Self {
        Self {
            name: name.into(),
            datatype: "INT64".to_string(),
            shape,
            data: TensorData::I64(data),
        }
    }
}

/// One output tensor from an inference response. `data` stays as JSON
/// values until a typed decode is requested.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TensorOutput {
    pub name: String,

    #[serde(default)]
    pub datatype: String,

    #[serde(default)]
    pub shape: Vec<i64>,

    #[serde(default)]
    pub data: Vec<serde_json::Value>,
}

impl TensorOutput {
    /// Decode the data array to f32, failing on any non-numeric entry.
    pub fn to_f32(&self) -> Result<Vec<f32>, InferenceError> {
        self.data
            .iter()
            .enumerate()
            .map(|(i, v)| {
                v.as_f64().map(|f| f as f32).ok_or_else(|| {
                    InferenceError::BadResponse(format!(
                        "non-numeric value at index {i} in tensor '{}'",
                        self.name
                    ))
                })
            })
            .collect()
    }
}

/// A tensor-inference backend. The HTTP implementation talks to a model
/// server; tests substitute a scripted one.
#[async_trait]
pub trait TensorBackend: Send + Sync {
    /// Probe whether the named model is loaded and ready to serve.
    async fn model_ready(&self, model: &str) -> Result<(), InferenceError>;

    /// Run one inference call and return output tensors keyed by name.
    async fn infer(
        &self,
        model: &str,
        inputs: Vec<TensorInput>,
        output_names: &[String],
    ) -> Result<HashMap<String, TensorOutput>, InferenceError>;
}

#[derive(Serialize)]
struct InferBody<'a> {
    inputs: &'a [TensorInput],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    outputs: Vec<OutputRequest>,
}

#[derive(Serialize)]
struct OutputRequest {
    name: String,
}

#[derive(Deserialize)]
struct InferResponse {
    #[serde(default)]
    outputs: Vec<TensorOutput>,
}

/// HTTP client for a v2-protocol tensor server. Stateless and safe to
/// share across concurrent requests.
pub struct HttpTensorClient {
    endpoint: String,
    http: reqwest::Client,
}

impl HttpTensorClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, InferenceError> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Err(InferenceError::RequestFailed(
                "inference endpoint is required".to_string(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InferenceError::RequestFailed(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TensorBackend for HttpTensorClient {
    async fn model_ready(&self, model: &str) -> Result<(), InferenceError> {
        let url = format!("{}/v2/models/{}/ready", self.endpoint, model);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| InferenceError::RequestFailed(e.to_string()))?;
        if resp.status() != reqwest::StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(InferenceError::ModelNotReady(format!(
                "{model} ({})",
                body.trim()
            )));
        }
        Ok(())
    }

    async fn infer(
        &self,
        model: &str,
        inputs: Vec<TensorInput>,
        output_names: &[String],
    ) -> Result<HashMap<String, TensorOutput>, InferenceError> {
        let outputs: Vec<OutputRequest> = output_names
            .iter()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .map(|n| OutputRequest {
                name: n.to_string(),
            })
            .collect();
        let body = InferBody {
            inputs: &inputs,
            outputs,
        };

        let url = format!("{}/v2/models/{}/infer", self.endpoint, model);
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| InferenceError::RequestFailed(e.to_string()))?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(InferenceError::BackendStatus {
                model: model.to_string(),
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        let decoded: InferResponse = resp
            .json()
            .await
            .map_err(|e| InferenceError::BadResponse(e.to_string()))?;

        Ok(decoded
            .outputs
            .into_iter()
            .map(|out| (out.name.clone(), out))
            .collect())
    }
}

/// Pick the first requested output present in the response, falling back
/// to any returned tensor.
pub fn select_output(
    mut outputs: HashMap<String, TensorOutput>,
    output_names: &[String],
) -> Result<TensorOutput, InferenceError> {
    for name in output_names {
        if let Some(out) = outputs.remove(name) {
            return Ok(out);
        }
    }
    if let Some(key) = outputs.keys().next().cloned() {
        if let Some(out) = outputs.remove(&key) {
            return Ok(out);
        }
    }
    Err(InferenceError::BadResponse(
        "no outputs returned from backend".to_string(),
    ))
}
