//! Text recognition.
//!
//! [`detect_text`] decodes an image, fetches the shared engine from an
//! [`EngineCache`] and returns the recognized fragments in detection order.
//! [`detect_regions`] does the same but keeps each fragment's bounding box.
//!
//! Enable engines via Cargo features:
//! - `ocrs` - ocrs detection + recognition models on the rten runtime

pub mod cache;
#[cfg(feature = "ocrs")]
pub mod ocrs;

use std::fmt;
use std::path::Path;
use std::time::Instant;

use image::DynamicImage;
use serde::Serialize;

use crate::error::{Error, Result};

pub use cache::EngineCache;

/// Axis-aligned box around a detection, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.0},{:.0} {:.0}x{:.0}",
            self.left, self.top, self.width, self.height
        )
    }
}

/// One piece of text found by an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub text: String,
    pub bounds: Option<Bounds>,
}

impl Detection {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bounds: None,
        }
    }

    pub fn with_bounds(text: impl Into<String>, bounds: Bounds) -> Self {
        Self {
            text: text.into(),
            bounds: Some(bounds),
        }
    }
}

/// A model-backed text recognizer.
///
/// Engines are expensive to build and hold no per-call state, so one
/// instance is shared through an [`EngineCache`].
pub trait RecognitionEngine: Send + Sync {
    /// Run detection and recognition over a decoded image.
    fn readtext(&self, image: &DynamicImage) -> Result<Vec<Detection>>;
}

/// Text fragments recognized in one image, in detection order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DetectedText(Vec<String>);

/// Outcome of joining detected fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recognition {
    Recognized(String),
    Empty,
}

impl DetectedText {
    pub fn new(fragments: Vec<String>) -> Self {
        Self(fragments)
    }

    pub fn fragments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fragments joined with spaces and trimmed.
    pub fn joined(&self) -> String {
        self.0.join(" ").trim().to_string()
    }

    /// [`Recognition::Empty`] when nothing but whitespace was found.
    pub fn recognition(&self) -> Recognition {
        let joined = self.joined();
        if joined.is_empty() {
            Recognition::Empty
        } else {
            Recognition::Recognized(joined)
        }
    }
}

impl From<Vec<String>> for DetectedText {
    fn from(fragments: Vec<String>) -> Self {
        Self(fragments)
    }
}

/// Decode the image at `path`.
///
/// A missing file is `NotFound`; anything that exists but is not a readable
/// raster is `Decode`.
pub fn open_image(path: &Path) -> Result<DynamicImage> {
    if !path.is_file() {
        return Err(Error::not_found("image", path));
    }
    image::open(path).map_err(|source| Error::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Recognize the text in the image at `image_path`.
///
/// The image is decoded before the engine is requested, so a bad path never
/// triggers a model load.
pub fn detect_text<E: RecognitionEngine>(
    engines: &EngineCache<E>,
    image_path: &Path,
    gpu_requested: bool,
) -> Result<DetectedText> {
    let detections = detect_regions(engines, image_path, gpu_requested)?;
    Ok(detections.into_iter().map(|d| d.text).collect::<Vec<_>>().into())
}

/// Like [`detect_text`], keeping the engine's bounding boxes.
pub fn detect_regions<E: RecognitionEngine>(
    engines: &EngineCache<E>,
    image_path: &Path,
    gpu_requested: bool,
) -> Result<Vec<Detection>> {
    let start = Instant::now();
    log::debug!("OCR on '{}' started", image_path.display());

    let image = open_image(image_path)?;
    let engine = engines.get(gpu_requested)?;
    let detections = engine.readtext(&image)?;

    log::info!(
        "OCR on '{}' completed in {:.3}s ({} fragments)",
        image_path.display(),
        start.elapsed().as_secs_f64(),
        detections.len()
    );

    Ok(detections)
}
