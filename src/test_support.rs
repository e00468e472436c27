//! In-memory engine and voice doubles shared by unit tests.

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::DynamicImage;

use crate::error::{Error, Result};
use crate::ocr::{Detection, RecognitionEngine};
use crate::speech::VoiceLoader;
use crate::{AudioSink, Voice};

/// Write a blank RGB image of the given size and return its path.
pub fn write_test_image(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    image::RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255]))
        .save(&path)
        .unwrap();
    path
}

/// Engine returning fixed fragments and recording the sizes it saw.
pub struct ScriptedEngine {
    fragments: Vec<String>,
    pub seen: Mutex<Vec<(u32, u32)>>,
}

impl ScriptedEngine {
    pub fn new(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|s| s.to_string()).collect(),
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl RecognitionEngine for ScriptedEngine {
    fn readtext(&self, image: &DynamicImage) -> Result<Vec<Detection>> {
        self.seen.lock().unwrap().push((image.width(), image.height()));
        Ok(self.fragments.iter().map(Detection::new).collect())
    }
}

/// Engine that always fails while running.
pub struct FailingEngine;

impl RecognitionEngine for FailingEngine {
    fn readtext(&self, _image: &DynamicImage) -> Result<Vec<Detection>> {
        Err(Error::Recognition("inference exploded".to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("tone voice failure")]
pub struct ToneError;

/// Voice emitting one 100-sample chunk per word. Punctuation alone is silent.
pub struct ToneVoice {
    pub sample_rate: Option<u32>,
    pub spoken: Vec<String>,
}

impl Voice for ToneVoice {
    type Error = ToneError;

    fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    fn synthesize_stream_raw(
        &mut self,
        text: &str,
        sink: &mut dyn AudioSink,
    ) -> std::result::Result<(), ToneError> {
        self.spoken.push(text.to_string());
        let words = text
            .split_whitespace()
            .filter(|w| w.chars().any(char::is_alphanumeric));
        for _ in words {
            sink.write_chunk(&[1000; 100]);
        }
        Ok(())
    }
}

/// Loader producing [`ToneVoice`]s and counting how often it ran.
#[derive(Default)]
pub struct ToneLoader {
    pub sample_rate: Option<u32>,
    pub loads: Cell<usize>,
}

impl VoiceLoader for ToneLoader {
    type Voice = ToneVoice;

    fn load(&self, _model_path: &Path, _config_path: &Path, _use_gpu: bool) -> Result<ToneVoice> {
        self.loads.set(self.loads.get() + 1);
        Ok(ToneVoice {
            sample_rate: self.sample_rate,
            spoken: Vec::new(),
        })
    }
}

/// Create empty model and config files for a loader to "load".
pub fn write_voice_files(dir: &Path) -> (PathBuf, PathBuf) {
    let model = dir.join("voice.onnx");
    let config = dir.join("voice.onnx.json");
    std::fs::write(&model, b"onnx").unwrap();
    std::fs::write(&config, b"{}").unwrap();
    (model, config)
}
