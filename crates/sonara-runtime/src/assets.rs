use serde::Deserialize;
use sonara_core::AssetError;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

pub const DEFAULT_MAX_DECODE_STEPS: usize = 128;

/// Decode-time model geometry, loaded from an optional JSON sidecar.
#[derive(Debug, Clone, Deserialize)]
pub struct DecodeConfig {
    #[serde(default = "default_n_mels")]
    pub n_mels: usize,

    #[serde(default = "default_mel_length")]
    pub mel_length: usize,

    #[serde(default = "default_n_audio_ctx")]
    pub n_audio_ctx: usize,

    #[serde(default = "default_max_decode_steps")]
    pub max_decode_steps: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            n_mels: default_n_mels(),
            mel_length: default_mel_length(),
            n_audio_ctx: default_n_audio_ctx(),
            max_decode_steps: default_max_decode_steps(),
        }
    }
}

fn default_n_mels() -> usize {
    80
}

fn default_mel_length() -> usize {
    3000
}

fn default_n_audio_ctx() -> usize {
    1500
}

fn default_max_decode_steps() -> usize {
    DEFAULT_MAX_DECODE_STEPS
}

/// Special token ids. Zero means "not present"; seed positions for absent
/// tokens are simply omitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpecialTokens {
    #[serde(default)]
    pub sot: i64,

    #[serde(default)]
    pub eot: i64,

    #[serde(default)]
    pub sot_prev: i64,

    #[serde(default)]
    pub no_timestamps: i64,

    // BTreeMap keeps the "first available" fallback deterministic.
    #[serde(default)]
    pub language_tokens: BTreeMap<String, i64>,

    #[serde(default)]
    pub task_tokens: BTreeMap<String, i64>,
}

/// Everything the autoregressive decoder needs besides the models
/// themselves.
#[derive(Debug, Clone, Default)]
pub struct WhisperAssets {
    pub config: DecodeConfig,
    pub special: SpecialTokens,
    pub vocab: HashMap<i64, String>,
    pub language_hint: Option<String>,
}

impl WhisperAssets {
    /// Load decode assets from optional sidecar files. A missing path means
    /// defaults; a file that exists but fails to read or parse is an error.
    pub fn load(
        decode_config_path: Option<&Path>,
        special_tokens_path: Option<&Path>,
        vocab_path: Option<&Path>,
    ) -> Result<Self, AssetError> {
        let mut assets = WhisperAssets::default();

        if let Some(path) = decode_config_path {
            assets.config = read_json_file(path)?;
        }
        if let Some(path) = special_tokens_path {
            assets.special = read_json_file(path)?;
        }
        if let Some(path) = vocab_path {
            assets.vocab = load_vocab(path)?;
        }

        Ok(assets)
    }

    /// Seed token sequence for a decode pass. The language resolution chain
    /// is requested language, configured hint, English, first available.
    pub fn initial_tokens(&self, language: &str) -> Vec<i64> {
        let mut tokens = Vec::with_capacity(4);
        if self.special.sot != 0 {
            tokens.push(self.special.sot);
        }
        let lang_token = self.language_token(language);
        if lang_token != 0 {
            tokens.push(lang_token);
        }
        if let Some(&task) = self.special.task_tokens.get("transcribe") {
            tokens.push(task);
        }
        if self.special.no_timestamps != 0 {
            tokens.push(self.special.no_timestamps);
        }
        tokens
    }

    pub fn language_token(&self, lang: &str) -> i64 {
        let mut lang = lang.trim().to_lowercase();
        if lang.is_empty() {
            if let Some(hint) = &self.language_hint {
                lang = hint.clone();
            }
        }
        if !lang.is_empty() {
            if let Some(&token) = self.special.language_tokens.get(&lang) {
                return token;
            }
        }
        if let Some(&token) = self.special.language_tokens.get("en") {
            return token;
        }
        if let Some(&token) = self.special.language_tokens.values().next() {
            return token;
        }
        0
    }

    /// Render decoded tokens as text, dropping special tokens, `<|…|>`
    /// markers, and unknown ids.
    pub fn tokens_to_text(&self, tokens: &[i64]) -> String {
        let mut out = String::new();
        for &token in tokens {
            if self.is_special_token(token) {
                continue;
            }
            if let Some(text) = self.vocab.get(&token) {
                if text.starts_with("<|") {
                    continue;
                }
                out.push_str(text);
            }
        }
        out.trim().to_string()
    }

    pub fn is_special_token(&self, token: i64) -> bool {
        if token == self.special.sot
            || token == self.special.eot
            || token == self.special.sot_prev
            || token == self.special.no_timestamps
        {
            return true;
        }
        self.special.language_tokens.values().any(|&v| v == token)
            || self.special.task_tokens.values().any(|&v| v == token)
    }
}

fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, AssetError> {
    let data = std::fs::read_to_string(path).map_err(|e| AssetError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&data).map_err(|e| AssetError::Malformed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Vocabulary file: either an object keyed by stringified token index or a
/// positional array. Non-string entries and non-numeric keys are skipped.
fn load_vocab(path: &Path) -> Result<HashMap<i64, String>, AssetError> {
    let raw: serde_json::Value = read_json_file(path)?;
    let mut vocab = HashMap::new();
    match raw {
        serde_json::Value::Object(map) => {
            for (key, val) in map {
                let Ok(idx) = key.parse::<i64>() else {
                    continue;
                };
                if let serde_json::Value::String(token) = val {
                    vocab.insert(idx, token);
                }
            }
        }
        serde_json::Value::Array(items) => {
            for (idx, val) in items.into_iter().enumerate() {
                if let serde_json::Value::String(token) = val {
                    vocab.insert(idx as i64, token);
                }
            }
        }
        _ => {
            return Err(AssetError::Malformed {
                path: path.display().to_string(),
                reason: "expected object or array".to_string(),
            })
        }
    }
    Ok(vocab)
}

/// Class label file: array of strings, or an object keyed by stringified
/// index returned in index order.
pub fn load_labels(path: &Path) -> Result<Vec<String>, AssetError> {
    let raw: serde_json::Value = read_json_file(path)?;
    match raw {
        serde_json::Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|v| match v {
                serde_json::Value::String(s) => Some(s),
                _ => None,
            })
            .collect()),
        serde_json::Value::Object(map) => {
            let mut indexed: Vec<(i64, String)> = map
                .into_iter()
                .filter_map(|(key, val)| {
                    let idx = key.parse::<i64>().ok()?;
                    match val {
                        serde_json::Value::String(s) => Some((idx, s)),
                        _ => None,
                    }
                })
                .collect();
            indexed.sort_by_key(|(idx, _)| *idx);
            Ok(indexed.into_iter().map(|(_, label)| label).collect())
        }
        _ => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(name: &str, content: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join("sonara_test_assets");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn full_assets() -> WhisperAssets {
        let mut assets = WhisperAssets::default();
        assets.special.sot = 50258;
        assets.special.eot = 50257;
        assets.special.no_timestamps = 50363;
        assets.special.language_tokens.insert("en".to_string(), 50259);
        assets.special.language_tokens.insert("ja".to_string(), 50266);
        assets.special.task_tokens.insert("transcribe".to_string(), 50359);
        assets.vocab.insert(1, "hello".to_string());
        assets.vocab.insert(2, " world".to_string());
        assets.vocab.insert(3, "<|startoftranscript|>".to_string());
        assets
    }

    #[test]
    fn test_assets_load_all_missing_yields_defaults() {
        let assets = WhisperAssets::load(None, None, None).unwrap();
        assert_eq!(assets.config.n_mels, 80);
        assert_eq!(assets.config.mel_length, 3000);
        assert_eq!(assets.config.n_audio_ctx, 1500);
        assert_eq!(assets.config.max_decode_steps, 128);
        assert!(assets.vocab.is_empty());
    }

    #[test]
    fn test_assets_partial_decode_config_keeps_defaults() {
        let path = write_temp("decode_partial.json", r#"{"n_mels": 128}"#);
        let assets = WhisperAssets::load(Some(&path), None, None).unwrap();
        assert_eq!(assets.config.n_mels, 128);
        assert_eq!(assets.config.mel_length, 3000);
    }

    #[test]
    fn test_assets_malformed_file_fails() {
        let path = write_temp("decode_bad.json", "{not json");
        let result = WhisperAssets::load(Some(&path), None, None);
        assert!(matches!(result, Err(AssetError::Malformed { .. })));
    }

    #[test]
    fn test_assets_missing_file_fails() {
        let path = std::path::Path::new("/nonexistent/decode.json");
        let result = WhisperAssets::load(Some(path), None, None);
        assert!(matches!(result, Err(AssetError::Read { .. })));
    }

    #[test]
    fn test_vocab_indexed_object() {
        let path = write_temp("vocab_obj.json", r#"{"0": "a", "2": "b", "x": "skip"}"#);
        let assets = WhisperAssets::load(None, None, Some(&path)).unwrap();
        assert_eq!(assets.vocab.get(&0).map(String::as_str), Some("a"));
        assert_eq!(assets.vocab.get(&2).map(String::as_str), Some("b"));
        assert_eq!(assets.vocab.len(), 2);
    }

    #[test]
    fn test_vocab_positional_array() {
        let path = write_temp("vocab_arr.json", r#"["a", "b", "c"]"#);
        let assets = WhisperAssets::load(None, None, Some(&path)).unwrap();
        assert_eq!(assets.vocab.get(&1).map(String::as_str), Some("b"));
    }

    #[test]
    fn test_initial_tokens_full_seed() {
        let assets = full_assets();
        assert_eq!(assets.initial_tokens("en"), vec![50258, 50259, 50359, 50363]);
    }

    #[test]
    fn test_initial_tokens_omits_missing_specials() {
        let mut assets = full_assets();
        assets.special.no_timestamps = 0;
        assets.special.task_tokens.clear();
        assert_eq!(assets.initial_tokens("en"), vec![50258, 50259]);
    }

    #[test]
    fn test_language_token_fallback_chain() {
        let assets = full_assets();
        // Requested language wins.
        assert_eq!(assets.language_token("ja"), 50266);
        // Unknown language falls back to English.
        assert_eq!(assets.language_token("xx"), 50259);

        let mut no_en = full_assets();
        no_en.special.language_tokens.remove("en");
        // First available in key order.
        assert_eq!(no_en.language_token("xx"), 50266);

        let mut hinted = full_assets();
        hinted.language_hint = Some("ja".to_string());
        assert_eq!(hinted.language_token(""), 50266);
    }

    #[test]
    fn test_tokens_to_text_skips_specials_and_markers() {
        let assets = full_assets();
        let text = assets.tokens_to_text(&[50258, 50259, 50359, 50363, 1, 2, 3, 50257]);
        assert_eq!(text, "hello world");
    }

    #[test]
    fn test_tokens_to_text_only_specials_is_empty() {
        let assets = full_assets();
        let text = assets.tokens_to_text(&[50258, 50259, 50359, 50363, 50257]);
        assert_eq!(text, "");
    }

    #[test]
    fn test_tokens_to_text_unknown_ids_dropped() {
        let assets = full_assets();
        assert_eq!(assets.tokens_to_text(&[1, 99999, 2]), "hello world");
    }

    #[test]
    fn test_load_labels_array() {
        let path = write_temp("labels_arr.json", r#"["neutral", "happy", 3, "sad"]"#);
        let labels = load_labels(&path).unwrap();
        assert_eq!(labels, vec!["neutral", "happy", "sad"]);
    }

    #[test]
    fn test_load_labels_indexed_object_sorted() {
        let path = write_temp("labels_obj.json", r#"{"2": "sad", "0": "neutral", "1": "happy"}"#);
        let labels = load_labels(&path).unwrap();
        assert_eq!(labels, vec!["neutral", "happy", "sad"]);
    }
}
