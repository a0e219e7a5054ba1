use crate::assets::{WhisperAssets, DEFAULT_MAX_DECODE_STEPS};
use crate::client::{select_output, TensorBackend, TensorInput};
use sonara_core::InferenceError;

const DECODER_TOKENS_INPUT: &str = "tokens";
const DECODER_ENCODER_INPUT: &str = "encoder_output";
const DECODER_LOGITS_OUTPUT: &str = "logits";

// Multilingual Whisper start-of-transcript, used when no seed tokens are
// configured at all.
const FALLBACK_SOT: i64 = 50258;

/// Greedy autoregressive decode against a two-stage speech model. Each step
/// feeds the full token sequence plus the fixed encoder output and appends
/// the argmax of the last-position logits. Terminates on the
/// end-of-transcript token or after the step budget.
pub async fn greedy_decode(
    backend: &dyn TensorBackend,
    decoder_model: &str,
    assets: &WhisperAssets,
    encoder_data: &[f32],
    encoder_shape: &[i64],
    language: &str,
) -> Result<(Vec<i64>, String), InferenceError> {
    let mut tokens = assets.initial_tokens(language);
    if tokens.is_empty() {
        tokens.push(FALLBACK_SOT);
    }
    let max_steps = if assets.config.max_decode_steps == 0 {
        DEFAULT_MAX_DECODE_STEPS
    } else {
        assets.config.max_decode_steps
    };
    let output_names = vec![DECODER_LOGITS_OUTPUT.to_string()];

    for step in 0..max_steps {
        let inputs = vec![
            TensorInput::int64(
                DECODER_TOKENS_INPUT,
                vec![1, tokens.len() as i64],
                tokens.clone(),
            ),
            TensorInput::fp32(
                DECODER_ENCODER_INPUT,
                encoder_shape.to_vec(),
                encoder_data.to_vec(),
            ),
        ];
        let outputs = backend.infer(decoder_model, inputs, &output_names).await?;
        let tensor = select_output(outputs, &output_names)?;
        let logits = tensor.to_f32()?;

        if tensor.shape.len() < 3 {
            return Err(InferenceError::BadResponse(format!(
                "unexpected decoder output shape: {:?}",
                tensor.shape
            )));
        }
        let seq_len = tensor.shape[tensor.shape.len() - 2] as usize;
        let vocab = tensor.shape[tensor.shape.len() - 1] as usize;
        if seq_len == 0 || vocab == 0 {
            return Err(InferenceError::BadResponse(format!(
                "invalid decoder output shape: {:?}",
                tensor.shape
            )));
        }
        let start = (seq_len - 1) * vocab;
        if start + vocab > logits.len() {
            return Err(InferenceError::BadResponse(
                "decoder output size mismatch".to_string(),
            ));
        }

        let best = crate::model::argmax(&logits[start..start + vocab]) as i64;
        if best == assets.special.eot && best != 0 {
            tracing::trace!(step, "decode hit end-of-transcript");
            break;
        }
        tokens.push(best);
    }

    let text = assets.tokens_to_text(&tokens);
    Ok((tokens, text))
}
