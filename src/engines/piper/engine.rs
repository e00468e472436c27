use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::speech::VoiceLoader;
use crate::{AudioSink, Voice};

use super::config::{load_config, InferenceConfig};
use super::model::{audio_to_i16, PiperError, PiperModel};
use super::phonemizer::{phonemes_to_ids, phonemize, EspeakConfig};

/// Loads Piper voices from a model file and its JSON config.
///
/// # Quick Start
///
/// ```rust,no_run
/// use readout::{engines::piper::PiperLoader, load_voice, synthesize};
/// use std::path::Path;
///
/// let loader = PiperLoader::default();
/// let mut voice = load_voice(&loader, Path::new("TTS/en_US-amy-low.onnx"), None, false)?;
/// let audio = synthesize(&mut voice, "Hello from Piper")?;
/// audio.write_wav(Path::new("hello.wav"))?;
/// # Ok::<(), readout::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct PiperLoader {
    /// Number of CPU threads to use for inference.
    /// `None` uses the ORT default (typically all available cores).
    pub num_threads: Option<usize>,
    /// Speaker for multi-speaker voices. `None` uses speaker 0.
    pub speaker_id: Option<i64>,
    pub espeak: EspeakConfig,
}

impl PiperLoader {
    /// Use a bundled espeak-ng binary and data directory.
    pub fn with_espeak(bin_path: Option<PathBuf>, data_path: Option<PathBuf>) -> Self {
        Self {
            espeak: EspeakConfig {
                bin_path,
                data_path,
            },
            ..Self::default()
        }
    }
}

impl VoiceLoader for PiperLoader {
    type Voice = PiperVoice;

    fn load(&self, model_path: &Path, config_path: &Path, _use_gpu: bool) -> Result<PiperVoice> {
        PiperVoice::load(model_path, config_path, self).map_err(|e| Error::Synthesis(Box::new(e)))
    }
}

/// A loaded Piper voice.
pub struct PiperVoice {
    model: PiperModel,
    phoneme_ids: HashMap<char, Vec<i64>>,
    espeak_voice: String,
    scales: InferenceConfig,
    sample_rate: Option<u32>,
    speaker_id: Option<i64>,
    espeak: EspeakConfig,
}

impl PiperVoice {
    fn load(
        model_path: &Path,
        config_path: &Path,
        params: &PiperLoader,
    ) -> std::result::Result<Self, PiperError> {
        let config = load_config(config_path)?;
        let phoneme_ids = config.phoneme_ids()?;
        let model = PiperModel::load(model_path, params.num_threads)?;

        let speaker_id = if config.num_speakers > 1 {
            Some(params.speaker_id.unwrap_or(0))
        } else {
            None
        };

        log::info!(
            "Piper voice ready: espeak voice '{}', {} Hz, quality {}",
            config.espeak.voice,
            config.audio.sample_rate.unwrap_or_default(),
            config.audio.quality.as_deref().unwrap_or("unknown")
        );

        Ok(Self {
            model,
            phoneme_ids,
            espeak_voice: config.espeak.voice,
            scales: config.inference,
            sample_rate: config.audio.sample_rate,
            speaker_id,
            espeak: params.espeak.clone(),
        })
    }

    pub fn espeak_voice(&self) -> &str {
        &self.espeak_voice
    }
}

impl Voice for PiperVoice {
    type Error = PiperError;

    fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    /// One chunk per sentence, pushed as soon as it is synthesized.
    fn synthesize_stream_raw(
        &mut self,
        text: &str,
        sink: &mut dyn AudioSink,
    ) -> std::result::Result<(), PiperError> {
        let sentences = phonemize(text, &self.espeak_voice, &self.espeak)?;
        if sentences.is_empty() {
            log::warn!("No phonemes produced for text: {text:?}");
        }

        for phonemes in &sentences {
            let ids = phonemes_to_ids(phonemes, &self.phoneme_ids);
            log::debug!("Synthesizing sentence of {} phoneme ids", ids.len());
            let audio = self.model.infer(&ids, &self.scales, self.speaker_id)?;
            sink.write_chunk(&audio_to_i16(&audio));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn with_espeak_keeps_other_defaults() {
        let loader = PiperLoader::with_espeak(Some(PathBuf::from("/opt/espeak-ng")), None);
        assert_eq!(loader.espeak.bin_path, Some(PathBuf::from("/opt/espeak-ng")));
        assert!(loader.espeak.data_path.is_none());
        assert!(loader.num_threads.is_none());
        assert!(loader.speaker_id.is_none());
    }

    #[test]
    fn config_without_phoneme_map_fails_before_model_load() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("voice.onnx");
        let config = dir.path().join("voice.onnx.json");
        std::fs::write(&model, b"not an onnx model").unwrap();
        std::fs::write(&config, br#"{"audio": {"sample_rate": 16000}}"#).unwrap();

        let err = PiperLoader::default().load(&model, &config, false).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Synthesis);
        assert!(err.to_string().contains("phoneme"), "{err}");
    }
}
