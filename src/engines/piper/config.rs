use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use super::model::PiperError;

/// Padding symbol inserted after every phoneme.
pub const PAD: char = '_';
/// Beginning-of-sentence symbol.
pub const BOS: char = '^';
/// End-of-sentence symbol.
pub const EOS: char = '$';

/// The parts of a Piper `<voice>.onnx.json` this crate uses.
#[derive(Debug, Clone, Deserialize)]
pub struct PiperConfig {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub espeak: EspeakVoice,
    #[serde(default)]
    pub inference: InferenceConfig,
    pub phoneme_id_map: HashMap<String, Vec<i64>>,
    #[serde(default = "one")]
    pub num_speakers: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: Option<u32>,
    pub quality: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EspeakVoice {
    pub voice: String,
}

impl Default for EspeakVoice {
    fn default() -> Self {
        Self {
            voice: "en-us".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct InferenceConfig {
    #[serde(default = "default_noise_scale")]
    pub noise_scale: f32,
    #[serde(default = "default_length_scale")]
    pub length_scale: f32,
    #[serde(default = "default_noise_w")]
    pub noise_w: f32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            noise_scale: default_noise_scale(),
            length_scale: default_length_scale(),
            noise_w: default_noise_w(),
        }
    }
}

fn one() -> u32 {
    1
}

fn default_noise_scale() -> f32 {
    0.667
}

fn default_length_scale() -> f32 {
    1.0
}

fn default_noise_w() -> f32 {
    0.8
}

/// Load and validate a Piper voice config.
pub fn load_config(config_path: &Path) -> Result<PiperConfig, PiperError> {
    let content = std::fs::read_to_string(config_path)?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<PiperConfig, PiperError> {
    let config: PiperConfig = serde_json::from_str(content)
        .map_err(|e| PiperError::Config(format!("Failed to parse JSON: {e}")))?;

    for symbol in [PAD, BOS, EOS] {
        if !config.phoneme_id_map.contains_key(symbol.to_string().as_str()) {
            return Err(PiperError::Config(format!(
                "'phoneme_id_map' is missing required symbol {symbol:?}"
            )));
        }
    }
    Ok(config)
}

impl PiperConfig {
    /// Phoneme map keyed by character.
    ///
    /// Piper keys are single code points; anything longer cannot match a
    /// phonemizer character and is rejected.
    pub fn phoneme_ids(&self) -> Result<HashMap<char, Vec<i64>>, PiperError> {
        let mut map = HashMap::with_capacity(self.phoneme_id_map.len());
        for (k, v) in &self.phoneme_id_map {
            let mut chars = k.chars();
            let ch = match (chars.next(), chars.next()) {
                (Some(ch), None) => ch,
                _ => {
                    return Err(PiperError::Config(format!(
                        "phoneme_id_map key {k:?} is not a single character"
                    )))
                }
            };
            map.insert(ch, v.clone());
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AMY_LOW: &str = r#"{
        "audio": {"sample_rate": 16000, "quality": "low"},
        "espeak": {"voice": "en-us"},
        "inference": {"noise_scale": 0.667, "length_scale": 1, "noise_w": 0.8},
        "phoneme_type": "espeak",
        "phoneme_map": {},
        "phoneme_id_map": {"_": [0], "^": [1], "$": [2], " ": [3], "h": [20], "ə": [59]},
        "num_symbols": 256,
        "num_speakers": 1,
        "speaker_id_map": {}
    }"#;

    #[test]
    fn parses_piper_voice_config() {
        let config = parse_config(AMY_LOW).unwrap();
        assert_eq!(config.audio.sample_rate, Some(16000));
        assert_eq!(config.espeak.voice, "en-us");
        assert_eq!(config.inference.length_scale, 1.0);
        assert_eq!(config.num_speakers, 1);

        let ids = config.phoneme_ids().unwrap();
        assert_eq!(ids[&'ə'], vec![59]);
        assert_eq!(ids[&' '], vec![3]);
    }

    #[test]
    fn optional_sections_take_defaults() {
        let config = parse_config(r#"{"phoneme_id_map": {"_": [0], "^": [1], "$": [2]}}"#).unwrap();
        assert_eq!(config.audio.sample_rate, None);
        assert_eq!(config.espeak.voice, "en-us");
        assert_eq!(config.inference.noise_w, 0.8);
        assert_eq!(config.num_speakers, 1);
    }

    #[test]
    fn rejects_map_without_sentence_markers() {
        let err = parse_config(r#"{"phoneme_id_map": {"_": [0]}}"#).unwrap_err();
        assert!(matches!(err, PiperError::Config(_)));
    }

    #[test]
    fn rejects_multi_character_keys() {
        let config =
            parse_config(r#"{"phoneme_id_map": {"_": [0], "^": [1], "$": [2], "ab": [9]}}"#)
                .unwrap();
        assert!(matches!(config.phoneme_ids(), Err(PiperError::Config(_))));
    }

    #[test]
    fn rejects_invalid_json() {
        assert!(matches!(parse_config("{"), Err(PiperError::Config(_))));
    }
}
