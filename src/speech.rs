//! Voice loading and in-memory synthesis.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::DEFAULT_SAMPLE_RATE;
use crate::error::{Error, Result};
use crate::{AudioSamples, Voice};

/// Builds a [`Voice`] from files already known to exist.
pub trait VoiceLoader {
    type Voice: Voice;

    fn load(&self, model_path: &Path, config_path: &Path, use_gpu: bool) -> Result<Self::Voice>;
}

/// Config path inferred for a voice model: `<model>.json`.
pub fn inferred_config_path(model_path: &Path) -> PathBuf {
    let mut name = OsString::from(model_path.as_os_str());
    name.push(".json");
    PathBuf::from(name)
}

/// Load a voice after checking its files exist.
///
/// An omitted `config_path` is inferred next to the model (see
/// [`inferred_config_path`]) and must exist as well. The loader is not called
/// unless both files are present.
pub fn load_voice<L: VoiceLoader>(
    loader: &L,
    model_path: &Path,
    config_path: Option<&Path>,
    use_gpu: bool,
) -> Result<L::Voice> {
    let start = Instant::now();

    if !model_path.is_file() {
        return Err(Error::not_found("voice model", model_path));
    }
    let config_path = match config_path {
        Some(path) if path.is_file() => path.to_path_buf(),
        Some(path) => return Err(Error::not_found("voice config", path)),
        None => {
            let inferred = inferred_config_path(model_path);
            if !inferred.is_file() {
                return Err(Error::not_found("voice config (inferred from model)", &inferred));
            }
            inferred
        }
    };

    if use_gpu {
        log::warn!("GPU acceleration requested for TTS; no accelerator available, running on CPU");
    }

    let voice = loader.load(model_path, &config_path, use_gpu)?;
    log::info!(
        "Loaded voice {} in {:.3?}",
        model_path.display(),
        start.elapsed()
    );
    Ok(voice)
}

/// Synthesize `text` into one contiguous buffer.
///
/// `text` must contain something other than whitespace. The result is tagged
/// with the voice's sample rate, or [`DEFAULT_SAMPLE_RATE`] if it has none.
pub fn synthesize<V: Voice>(voice: &mut V, text: &str) -> Result<AudioSamples> {
    if text.trim().is_empty() {
        return Err(Error::InvalidArgument(
            "text to synthesise must not be empty".to_string(),
        ));
    }

    let start = Instant::now();
    let mut samples: Vec<i16> = Vec::new();
    voice
        .synthesize_stream_raw(text, &mut samples)
        .map_err(|e| Error::Synthesis(Box::new(e)))?;

    if samples.is_empty() {
        return Err(Error::Synthesis(
            format!("voice produced no audio for {text:?}").into(),
        ));
    }

    let audio = AudioSamples {
        samples,
        sample_rate: voice.sample_rate().unwrap_or(DEFAULT_SAMPLE_RATE),
    };
    log::info!(
        "Synthesised {:.2}s of audio in {:.3?}",
        audio.duration_secs(),
        start.elapsed()
    );
    Ok(audio)
}
