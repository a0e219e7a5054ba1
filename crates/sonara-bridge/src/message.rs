use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sonara_core::BridgeError;
use std::collections::HashMap;

/// Envelope exchanged with the external compute fabric. Compatible with
/// the fabric's unit-manager wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub request_id: String,

    pub work_id: String,

    pub action: String,

    pub object: String,

    #[serde(default)]
    pub data: serde_json::Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub timestamp: String,
}

impl Message {
    pub fn new(
        action: impl Into<String>,
        object: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            work_id: String::new(),
            action: action.into(),
            object: object.into(),
            data,
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Error reply echoing the request's correlation ids.
    pub fn error_reply(&self, error: impl Into<String>) -> Self {
        Self {
            request_id: self.request_id.clone(),
            work_id: self.work_id.clone(),
            action: self.action.clone(),
            object: self.object.clone(),
            data: serde_json::Value::Null,
            error: Some(error.into()),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Bare acknowledgement reply for handlers that return no payload.
    pub fn ok_reply(&self) -> Self {
        Self {
            request_id: self.request_id.clone(),
            work_id: self.work_id.clone(),
            action: self.action.clone(),
            object: self.object.clone(),
            data: serde_json::json!("OK"),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// An inference task handed to the external fabric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiTask {
    pub task_id: String,

    pub task_type: String,

    #[serde(default)]
    pub model_path: String,

    #[serde(default, with = "base64_bytes")]
    pub input_data: Vec<u8>,

    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Outcome of a dispatched [`AiTask`], correlated by task id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiResult {
    pub task_id: String,

    #[serde(default)]
    pub output: serde_json::Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Handles one inbound action. Returning `None` acknowledges with a bare
/// OK reply.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, msg: &Message) -> Result<Option<Message>, BridgeError>;
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_roundtrip() {
        let msg = Message::new("inference", "ai_task", serde_json::json!({"k": "v"}));
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.action, "inference");
        assert_eq!(back.object, "ai_task");
        assert_eq!(back.data["k"], "v");
        assert!(back.error.is_none());
    }

    #[test]
    fn test_message_error_omitted_when_none() {
        let msg = Message::new("a", "b", serde_json::Value::Null);
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_error_reply_echoes_correlation_ids() {
        let mut msg = Message::new("unknown_thing", "obj", serde_json::Value::Null);
        msg.work_id = "worker-7".to_string();
        let reply = msg.error_reply("Unknown action: unknown_thing");
        assert_eq!(reply.request_id, msg.request_id);
        assert_eq!(reply.work_id, "worker-7");
        assert_eq!(reply.error.as_deref(), Some("Unknown action: unknown_thing"));
    }

    #[test]
    fn test_ok_reply_carries_ok_data() {
        let msg = Message::new("ping", "obj", serde_json::Value::Null);
        let reply = msg.ok_reply();
        assert_eq!(reply.data, serde_json::json!("OK"));
        assert!(reply.error.is_none());
    }

    #[test]
    fn test_ai_task_input_data_is_base64_on_the_wire() {
        let task = AiTask {
            task_id: "t1".to_string(),
            task_type: "speech_recognition".to_string(),
            model_path: "/models/whisper_base.onnx".to_string(),
            input_data: vec![1, 2, 3, 4],
            params: HashMap::new(),
        };
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["input_data"], "AQIDBA==");
        let back: AiTask = serde_json::from_value(json).unwrap();
        assert_eq!(back.input_data, vec![1, 2, 3, 4]);
    }
}
