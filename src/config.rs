//! Defaults and environment-driven settings.

use std::ffi::OsStr;
use std::path::PathBuf;

/// Languages the recognition engine is built for.
pub const OCR_LANGUAGES: &[&str] = &["en"];

/// Inference threads used by the recognition engine when `OCR_THREADS` is unset.
pub const DEFAULT_OCR_THREADS: usize = 2;

/// Sample rate assumed when a voice does not report one.
pub const DEFAULT_SAMPLE_RATE: u32 = 22050;

/// Spoken when recognition finds no text.
pub const DEFAULT_FALLBACK_TEXT: &str = "No text detected in image.";

pub const DEFAULT_VOICE_MODEL: &str = "TTS/en_US-amy-low.onnx";
pub const DEFAULT_VOICE_CONFIG: &str = "TTS/en_US-amy-low.onnx.json";

pub const DEFAULT_DETECTION_MODEL: &str = "models/ocrs/text-detection.rten";
pub const DEFAULT_RECOGNITION_MODEL: &str = "models/ocrs/text-recognition.rten";

pub const OCR_THREADS_ENV: &str = "OCR_THREADS";
pub const DETECTION_MODEL_ENV: &str = "OCR_DETECTION_MODEL";
pub const RECOGNITION_MODEL_ENV: &str = "OCR_RECOGNITION_MODEL";

/// Thread pool size variable read by the rten runtime on first inference.
pub const RTEN_THREADS_ENV: &str = "RTEN_NUM_THREADS";

/// Thread count for recognition inference, read from `OCR_THREADS`.
pub fn ocr_threads() -> usize {
    parse_threads(std::env::var(OCR_THREADS_ENV).ok().as_deref())
}

/// Value to export as `RTEN_NUM_THREADS`, or `None` if the user already set it.
///
/// The environment is process-wide; only set it from `main` before any
/// threads are spawned.
pub fn rten_threads_value(current: Option<&OsStr>, threads: usize) -> Option<String> {
    match current {
        Some(_) => None,
        None => Some(threads.to_string()),
    }
}

fn parse_threads(raw: Option<&str>) -> usize {
    match raw.map(str::trim) {
        None | Some("") => DEFAULT_OCR_THREADS,
        Some(value) => match value.parse::<usize>() {
            Ok(threads) if threads > 0 => threads,
            _ => {
                log::warn!(
                    "Ignoring invalid {OCR_THREADS_ENV}={value:?}, using {DEFAULT_OCR_THREADS}"
                );
                DEFAULT_OCR_THREADS
            }
        },
    }
}

/// Location of the recognition model weights.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrModelPaths {
    pub detection: PathBuf,
    pub recognition: PathBuf,
}

impl Default for OcrModelPaths {
    fn default() -> Self {
        Self {
            detection: PathBuf::from(DEFAULT_DETECTION_MODEL),
            recognition: PathBuf::from(DEFAULT_RECOGNITION_MODEL),
        }
    }
}

impl OcrModelPaths {
    /// Defaults, overridden by `OCR_DETECTION_MODEL` / `OCR_RECOGNITION_MODEL`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            detection: std::env::var_os(DETECTION_MODEL_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.detection),
            recognition: std::env::var_os(RECOGNITION_MODEL_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.recognition),
        }
    }
}
