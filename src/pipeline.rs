//! Image → speech orchestration.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use derive_builder::Builder;

use crate::capture::{CaptureProvider, UploadMetadata, UploadOutcome, UploadProvider};
use crate::config::{DEFAULT_FALLBACK_TEXT, DEFAULT_VOICE_CONFIG, DEFAULT_VOICE_MODEL};
use crate::error::{Error, Result, Stage};
use crate::ocr::{detect_text, EngineCache, Recognition, RecognitionEngine};
use crate::speech::{load_voice, synthesize, VoiceLoader};

/// Per-run settings for [`Pipeline::run`].
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(default)]
pub struct PipelineOptions {
    /// Ask for GPU recognition; always downgraded to CPU.
    pub ocr_gpu: bool,
    /// Ask for GPU synthesis; always downgraded to CPU.
    pub tts_gpu: bool,
    /// Voice model override.
    #[builder(setter(into, strip_option))]
    pub model_path: Option<PathBuf>,
    /// Voice config override. Defaults to the bundled voice's config even
    /// when the model is overridden.
    #[builder(setter(into, strip_option))]
    pub config_path: Option<PathBuf>,
    /// Spoken when no text is recognized.
    #[builder(setter(into))]
    pub fallback_text: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            ocr_gpu: false,
            tts_gpu: false,
            model_path: None,
            config_path: None,
            fallback_text: DEFAULT_FALLBACK_TEXT.to_string(),
        }
    }
}

impl PipelineOptions {
    /// Voice model and config to load: explicit override, then default location.
    pub fn voice_paths(&self) -> (PathBuf, PathBuf) {
        let model = self
            .model_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_VOICE_MODEL));
        let config = self
            .config_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_VOICE_CONFIG));
        (model, config)
    }
}

/// What a pipeline run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechArtifact {
    /// Absolute path of the written WAV file
    pub path: PathBuf,
    /// Text that was spoken
    pub transcript: String,
    /// True when nothing was recognized and the fallback text was spoken
    pub used_fallback: bool,
    pub sample_count: usize,
    pub sample_rate: u32,
}

impl SpeechArtifact {
    pub fn duration_secs(&self) -> f64 {
        self.sample_count as f64 / self.sample_rate as f64
    }
}

/// Recognize → synthesize → write, sharing one warm recognition engine
/// across runs and keeping the last loaded voice warm.
///
/// Every stage must succeed for the next to run. Errors keep their kind and
/// are tagged with the [`Stage`] they came from. The only recovery is
/// speaking the fallback text when no text is recognized.
pub struct Pipeline<E, L: VoiceLoader> {
    engines: Arc<EngineCache<E>>,
    loader: L,
    voice: Mutex<Option<WarmVoice<L::Voice>>>,
}

/// A loaded voice and the files it came from.
struct WarmVoice<V> {
    model_path: PathBuf,
    config_path: PathBuf,
    voice: V,
}

impl<E, L> Pipeline<E, L>
where
    E: RecognitionEngine,
    L: VoiceLoader,
{
    pub fn new(engines: EngineCache<E>, loader: L) -> Self {
        Self::with_shared_engines(Arc::new(engines), loader)
    }

    /// Build a pipeline around an engine cache shared with other callers.
    pub fn with_shared_engines(engines: Arc<EngineCache<E>>, loader: L) -> Self {
        Self {
            engines,
            loader,
            voice: Mutex::new(None),
        }
    }

    pub fn engines(&self) -> &Arc<EngineCache<E>> {
        &self.engines
    }

    /// Whether a voice is loaded and waiting for the next run.
    pub fn has_warm_voice(&self) -> bool {
        self.voice
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Speak the text in `image_path` into `output_path`, returning the
    /// absolute path of the WAV file.
    pub fn run(
        &self,
        image_path: &Path,
        output_path: &Path,
        options: &PipelineOptions,
    ) -> Result<PathBuf> {
        self.run_detailed(image_path, output_path, options)
            .map(|artifact| artifact.path)
    }

    /// Like [`run`](Self::run), also reporting the transcript and audio size.
    pub fn run_detailed(
        &self,
        image_path: &Path,
        output_path: &Path,
        options: &PipelineOptions,
    ) -> Result<SpeechArtifact> {
        if !image_path.exists() {
            return Err(Error::not_found("image", image_path).in_stage(Stage::Recognize));
        }

        let detected = detect_text(&self.engines, image_path, options.ocr_gpu)
            .map_err(|e| e.in_stage(Stage::Recognize))?;
        let (transcript, used_fallback) = match detected.recognition() {
            Recognition::Recognized(text) => (text, false),
            Recognition::Empty => {
                log::info!(
                    "No text detected in {}, speaking fallback text",
                    image_path.display()
                );
                (options.fallback_text.clone(), true)
            }
        };

        let (model_path, config_path) = options.voice_paths();
        let mut slot = self.voice.lock().unwrap_or_else(PoisonError::into_inner);
        let warm = match slot.take() {
            Some(warm) if warm.model_path == model_path && warm.config_path == config_path => {
                log::debug!("Reusing loaded voice {}", model_path.display());
                warm
            }
            _ => {
                // load_voice rejects a missing model or config before constructing anything.
                let voice =
                    load_voice(&self.loader, &model_path, Some(&config_path), options.tts_gpu)
                        .map_err(|e| e.in_stage(Stage::LoadVoice))?;
                WarmVoice {
                    model_path,
                    config_path,
                    voice,
                }
            }
        };
        let warm = slot.insert(warm);

        let audio =
            synthesize(&mut warm.voice, &transcript).map_err(|e| e.in_stage(Stage::Synthesize))?;
        drop(slot);

        audio
            .write_wav(output_path)
            .map_err(|e| e.in_stage(Stage::Write))?;
        let path = std::fs::canonicalize(output_path)
            .map_err(|e| Error::from(e).in_stage(Stage::Write))?;

        Ok(SpeechArtifact {
            path,
            transcript,
            used_fallback,
            sample_count: audio.samples.len(),
            sample_rate: audio.sample_rate,
        })
    }

    /// Capture a photo, optionally upload it, then speak its text.
    ///
    /// Capture failure aborts the run. Upload failure is logged and ignored.
    pub fn capture_and_speak<C>(
        &self,
        capture: &C,
        uploader: Option<&dyn UploadProvider>,
        output_path: &Path,
        options: &PipelineOptions,
    ) -> Result<(PathBuf, SpeechArtifact)>
    where
        C: CaptureProvider + ?Sized,
    {
        let photo = capture
            .capture_photo(None)
            .map_err(|e| e.in_stage(Stage::Capture))?;
        log::info!("Photo captured: {}", photo.display());

        if let Some(uploader) = uploader {
            match uploader.upload(&photo, &UploadMetadata::default()) {
                UploadOutcome::Uploaded { url } => log::info!("Uploaded photo to {url}"),
                UploadOutcome::Failed { error } => {
                    log::warn!("Photo upload failed, continuing: {error}")
                }
            }
        }

        let artifact = self.run_detailed(&photo, output_path, options)?;
        Ok((photo, artifact))
    }
}
