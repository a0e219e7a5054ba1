use crate::gateway::{ProcessAudioResponse, TaskResult};
use sonara_bridge::{AiResult, AiTask, ComputeBridge, Message};
use sonara_core::BridgeError;

/// Build the completion event for one finished task. The event type is the
/// canonical task name with a `.completed` suffix.
pub fn completion_event(
    result: &TaskResult,
    task_id: &str,
    meeting_id: &str,
    user_id: &str,
) -> Message {
    let event_type = format!("{}.completed", result.result_type);
    Message::new(
        "ai_event",
        event_type.clone(),
        serde_json::json!({
            "type": event_type,
            "payload": {
                "task_id": task_id,
                "meeting_id": meeting_id,
                "user_id": user_id,
                "result": result,
            },
        }),
    )
}

/// Publish one completion event per finished task. Stops on the first
/// transport failure.
pub async fn publish_completions(
    bridge: &ComputeBridge,
    response: &ProcessAudioResponse,
    meeting_id: &str,
    user_id: &str,
) -> Result<(), BridgeError> {
    for result in response.results.values() {
        let event = completion_event(result, &response.task_id, meeting_id, user_id);
        bridge.publish_message(&event).await?;
        tracing::debug!(
            task_id = %response.task_id,
            event = %event.object,
            "published completion event"
        );
    }
    Ok(())
}

/// Hand a task to the external compute fabric. A successful outcome is
/// announced as a completion event; a publish channel is optional.
pub async fn dispatch_external(
    bridge: &ComputeBridge,
    task: &AiTask,
    meeting_id: &str,
    user_id: &str,
) -> Result<AiResult, BridgeError> {
    let result = bridge.send_task(task).await?;
    if result.error.is_none() {
        let event_type = format!("{}.completed", task.task_type);
        let event = Message::new(
            "ai_event",
            event_type.clone(),
            serde_json::json!({
                "type": event_type,
                "payload": {
                    "task_id": task.task_id,
                    "meeting_id": meeting_id,
                    "user_id": user_id,
                    "result": result.output,
                },
            }),
        );
        match bridge.publish_message(&event).await {
            Ok(()) => {}
            Err(BridgeError::ChannelNotConfigured(_)) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(result)
}
