//! ocrs recognition engine.
//!
//! # Model Layout
//!
//! ```text
//! models/ocrs/
//! ├── text-detection.rten     # word/line detection
//! └── text-recognition.rten   # Latin alphabet line recognition
//! ```
//!
//! Download links:
//! - <https://huggingface.co/robertknight/ocrs/resolve/main/text-detection-ssfbcj81.rten>
//! - <https://huggingface.co/robertknight/ocrs/resolve/main/text-rec-checkpoint-s52qdbqt.rten>
//!
//! Paths can be overridden with `OCR_DETECTION_MODEL` / `OCR_RECOGNITION_MODEL`.

use std::path::Path;

use image::DynamicImage;
use ocrs::{ImageSource, OcrEngine, OcrEngineParams};
use rten::Model;
use rten_imageproc::BoundingRect;

use super::{Bounds, Detection, EngineCache, RecognitionEngine};
use crate::config::{self, OcrModelPaths, OCR_LANGUAGES};
use crate::error::{Error, Result};

/// Parameters for building an [`OcrsEngine`].
///
/// The inference thread count is not set here: rten reads
/// `RTEN_NUM_THREADS`, which the binary exports at startup from
/// `OCR_THREADS` (see [`config::rten_threads_value`]).
#[derive(Debug, Clone, Default)]
pub struct OcrsParams {
    pub models: OcrModelPaths,
}

impl OcrsParams {
    pub fn from_env() -> Self {
        Self {
            models: OcrModelPaths::from_env(),
        }
    }
}

/// CPU-only English text recognizer backed by ocrs.
pub struct OcrsEngine {
    engine: OcrEngine,
}

impl OcrsEngine {
    pub fn load(params: &OcrsParams) -> Result<Self> {
        log::info!(
            "Loading ocrs models (languages {:?}, {} = {:?})",
            OCR_LANGUAGES,
            config::RTEN_THREADS_ENV,
            std::env::var_os(config::RTEN_THREADS_ENV)
        );

        let detection_model = load_model("text detection model", &params.models.detection)?;
        let recognition_model = load_model("text recognition model", &params.models.recognition)?;

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|e| Error::Recognition(format!("failed to create ocrs engine: {e}")))?;

        Ok(Self { engine })
    }

    /// Lazily built engine configured from the environment.
    pub fn cache_from_env() -> EngineCache<Self> {
        let params = OcrsParams::from_env();
        EngineCache::new(move || Self::load(&params))
    }

    pub fn languages(&self) -> &'static [&'static str] {
        OCR_LANGUAGES
    }
}

fn load_model(what: &'static str, path: &Path) -> Result<Model> {
    if !path.is_file() {
        return Err(Error::not_found(what, path));
    }
    log::debug!("Loading {what} from {}", path.display());
    Model::load_file(path)
        .map_err(|e| Error::Recognition(format!("failed to load {what} {}: {e}", path.display())))
}

impl RecognitionEngine for OcrsEngine {
    fn readtext(&self, image: &DynamicImage) -> Result<Vec<Detection>> {
        let rgb = image.to_rgb8();
        let source = ImageSource::from_bytes(rgb.as_raw(), rgb.dimensions())
            .map_err(|e| Error::Recognition(format!("unsupported image layout: {e}")))?;
        let input = self
            .engine
            .prepare_input(source)
            .map_err(|e| Error::Recognition(e.to_string()))?;

        let word_rects = self
            .engine
            .detect_words(&input)
            .map_err(|e| Error::Recognition(e.to_string()))?;
        let line_rects = self.engine.find_text_lines(&input, &word_rects);
        let line_texts = self
            .engine
            .recognize_text(&input, &line_rects)
            .map_err(|e| Error::Recognition(e.to_string()))?;

        let detections = line_texts
            .iter()
            .zip(line_rects.iter())
            .filter_map(|(line, words)| {
                let text = line.as_ref()?.to_string();
                if text.trim().is_empty() {
                    return None;
                }
                let bounds = words.iter().map(|w| w.bounding_rect()).reduce(|a, b| a.union(b));
                Some(match bounds {
                    Some(r) => Detection::with_bounds(
                        text,
                        Bounds {
                            left: r.left(),
                            top: r.top(),
                            width: r.width(),
                            height: r.height(),
                        },
                    ),
                    None => Detection::new(text),
                })
            })
            .collect();

        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::path::PathBuf;

    fn missing_params() -> OcrsParams {
        OcrsParams {
            models: OcrModelPaths {
                detection: PathBuf::from("/nonexistent/text-detection.rten"),
                recognition: PathBuf::from("/nonexistent/text-recognition.rten"),
            },
        }
    }

    #[test]
    fn default_params_use_bundled_models() {
        let params = OcrsParams::default();
        assert_eq!(params.models, OcrModelPaths::default());
    }

    #[test]
    fn missing_detection_model_is_not_found() {
        let err = OcrsEngine::load(&missing_params()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn loading_leaves_the_environment_alone() {
        let before = std::env::var_os(config::RTEN_THREADS_ENV);
        let _ = OcrsEngine::load(&missing_params());
        assert_eq!(std::env::var_os(config::RTEN_THREADS_ENV), before);
    }

    #[test]
    fn cache_reports_construction_failure_and_stays_empty() {
        let params = missing_params();
        let cache = EngineCache::new(move || OcrsEngine::load(&params));

        let err = cache.get(false).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::EngineConstruction);
        assert!(!cache.is_initialized());
    }
}
