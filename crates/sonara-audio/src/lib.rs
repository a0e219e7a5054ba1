pub mod mel;
pub mod pcm;

pub use mel::{compute_log_mel, MelConfig};
pub use pcm::{decode_audio, pcm16_to_mono_f32, resample_linear, DecodedAudio};
