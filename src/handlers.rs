use async_trait::async_trait;
use sonara_bridge::{AiTask, ComputeBridge, Message, MessageHandler};
use sonara_core::BridgeError;
use sonara_gateway::{publish_completions, InferenceGateway, ProcessAudioRequest};
use std::sync::{Arc, Weak};

fn param(task: &AiTask, key: &str) -> String {
    task.params.get(key).cloned().unwrap_or_default()
}

/// Runs an inbound inference task through the gateway and publishes a
/// completion event per finished sub-task.
pub struct InferenceHandler {
    gateway: Arc<InferenceGateway>,
    // Weak to avoid a cycle: the bridge owns the handlers.
    bridge: Weak<ComputeBridge>,
}

impl InferenceHandler {
    pub fn new(gateway: Arc<InferenceGateway>, bridge: Weak<ComputeBridge>) -> Self {
        Self { gateway, bridge }
    }
}

#[async_trait]
impl MessageHandler for InferenceHandler {
    async fn handle(&self, msg: &Message) -> Result<Option<Message>, BridgeError> {
        let task: AiTask = serde_json::from_value(msg.data.clone())?;

        let tasks: Vec<String> = {
            let listed = param(&task, "tasks");
            if listed.trim().is_empty() {
                vec![task.task_type.clone()]
            } else {
                listed.split(',').map(|t| t.trim().to_string()).collect()
            }
        };
        let request = ProcessAudioRequest {
            audio_data: task.input_data.clone(),
            format: param(&task, "format"),
            sample_rate: param(&task, "sample_rate").parse().unwrap_or(0),
            channels: param(&task, "channels").parse().unwrap_or(0),
            tasks,
            meeting_id: param(&task, "meeting_id"),
            user_id: param(&task, "user_id"),
            language: param(&task, "language"),
        };

        let response = self.gateway.process_audio(&request).await;
        if let Some(bridge) = self.bridge.upgrade() {
            if let Err(e) =
                publish_completions(&bridge, &response, &request.meeting_id, &request.user_id)
                    .await
            {
                tracing::warn!(error = %e, "failed to publish completion events");
            }
        }

        let mut reply = msg.ok_reply();
        reply.data = serde_json::to_value(&response)?;
        Ok(Some(reply))
    }
}

pub struct HealthHandler {
    gateway: Arc<InferenceGateway>,
}

impl HealthHandler {
    pub fn new(gateway: Arc<InferenceGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl MessageHandler for HealthHandler {
    async fn handle(&self, msg: &Message) -> Result<Option<Message>, BridgeError> {
        let mut reply = msg.ok_reply();
        reply.data = self.gateway.health_check().await;
        Ok(Some(reply))
    }
}

pub struct ServiceInfoHandler {
    gateway: Arc<InferenceGateway>,
}

impl ServiceInfoHandler {
    pub fn new(gateway: Arc<InferenceGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl MessageHandler for ServiceInfoHandler {
    async fn handle(&self, msg: &Message) -> Result<Option<Message>, BridgeError> {
        let mut reply = msg.ok_reply();
        reply.data = self.gateway.service_info();
        Ok(Some(reply))
    }
}

/// Warms the requested models; an empty request warms everything.
pub struct SetupHandler {
    gateway: Arc<InferenceGateway>,
}

impl SetupHandler {
    pub fn new(gateway: Arc<InferenceGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl MessageHandler for SetupHandler {
    async fn handle(&self, msg: &Message) -> Result<Option<Message>, BridgeError> {
        let keys: Vec<String> = msg
            .data
            .get("models")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        let report = self.gateway.warm_up(&keys).await;
        let mut reply = msg.ok_reply();
        reply.data = serde_json::to_value(&report)?;
        Ok(Some(reply))
    }
}
