use sonara_core::{TaskError, TaskKind};

/// A task name as it appears on the request surface. Short aliases map to
/// the same task as the long form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayTask {
    SpeechRecognition,
    EmotionDetection,
    SynthesisDetection,
}

impl GatewayTask {
    /// Parse a requested task name. Blank names are skipped rather than
    /// rejected; unknown names are an error carrying the raw input.
    pub fn parse(raw: &str) -> Result<Option<Self>, TaskError> {
        let normalized = raw.trim().to_lowercase().replace(' ', "_");
        if normalized.is_empty() {
            return Ok(None);
        }
        match normalized.as_str() {
            "speech_recognition" | "asr" => Ok(Some(GatewayTask::SpeechRecognition)),
            "emotion_detection" | "emotion" => Ok(Some(GatewayTask::EmotionDetection)),
            "synthesis_detection" | "synthesis" => Ok(Some(GatewayTask::SynthesisDetection)),
            _ => Err(TaskError::UnknownTask(raw.to_string())),
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            GatewayTask::SpeechRecognition => TaskKind::Asr,
            GatewayTask::EmotionDetection => TaskKind::Emotion,
            GatewayTask::SynthesisDetection => TaskKind::Synthesis,
        }
    }

    /// Canonical long-form name used in results and events.
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayTask::SpeechRecognition => "speech_recognition",
            GatewayTask::EmotionDetection => "emotion_detection",
            GatewayTask::SynthesisDetection => "synthesis_detection",
        }
    }
}

impl std::fmt::Display for GatewayTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
