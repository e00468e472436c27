//! # readout
//!
//! Reads printed text aloud: recognizes the text in a photograph and speaks it
//! into a WAV file, reusing warm model state between calls.
//!
//! ## Features
//!
//! - **ocrs recognition**: CPU-only text detection and recognition, built once
//!   per [`EngineCache`] and shared by every call
//! - **Piper voices**: VITS ONNX voices with their JSON config, phonemized by espeak-ng
//! - **Fallback speech**: a placeholder sentence is spoken when no text is found
//! - **Benchmarking**: recognition timing across downscaled copies of an image
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! readout = { version = "0.1", features = ["piper", "ocrs"] }
//! ```
//!
//! ```ignore
//! use std::path::Path;
//! use readout::{engines::piper::PiperLoader, ocr::ocrs::OcrsEngine, Pipeline, PipelineOptions};
//!
//! let pipeline = Pipeline::new(OcrsEngine::cache_from_env(), PiperLoader::default());
//! let wav = pipeline.run(
//!     Path::new("page.jpg"),
//!     Path::new("out/page.wav"),
//!     &PipelineOptions::default(),
//! )?;
//! println!("Saved synthesised audio to {}", wav.display());
//! # Ok::<(), readout::Error>(())
//! ```

pub mod benchmark;
pub mod capture;
pub mod config;
pub mod engines;
pub mod error;
pub mod ocr;
pub mod pipeline;
pub mod speech;

#[cfg(test)]
pub(crate) mod test_support;

use std::path::Path;

pub use benchmark::{run_benchmark, BenchmarkReport, BenchmarkResult, DEFAULT_SCALE_FACTORS};
pub use capture::{CaptureProvider, CommandCapture, UploadMetadata, UploadOutcome, UploadProvider};
pub use error::{Error, ErrorKind, Result, Stage};
pub use ocr::{
    detect_regions, detect_text, Bounds, DetectedText, Detection, EngineCache, Recognition,
    RecognitionEngine,
};
pub use pipeline::{Pipeline, PipelineOptions, PipelineOptionsBuilder, SpeechArtifact};
pub use speech::{load_voice, synthesize, VoiceLoader};

/// Mono 16-bit PCM audio held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSamples {
    /// Signed 16-bit samples, one channel
    pub samples: Vec<i16>,
    /// Sample rate of the audio, as reported by the voice
    pub sample_rate: u32,
}

impl AudioSamples {
    /// Write the audio as a mono 16-bit PCM WAV file. See [`write_wav`].
    pub fn write_wav(&self, path: &Path) -> Result<()> {
        write_wav(&self.samples, self.sample_rate, path)
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Persist samples as a single-channel, 16-bit little-endian PCM WAV file.
///
/// Missing parent directories are created. An existing file at `path` is
/// overwritten without warning.
pub fn write_wav(samples: &[i16], sample_rate: u32, path: &Path) -> Result<()> {
    let start = std::time::Instant::now();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    log::info!(
        "Wrote {} samples at {}Hz to {} in {:.3?}",
        samples.len(),
        sample_rate,
        path.display(),
        start.elapsed()
    );
    Ok(())
}

/// Destination for synthesized audio chunks.
///
/// Voices push audio here as it is produced. [`synthesize`] collects into a
/// `Vec<i16>`; an incremental player can implement this over a channel.
pub trait AudioSink {
    fn write_chunk(&mut self, chunk: &[i16]);
}

impl AudioSink for Vec<i16> {
    fn write_chunk(&mut self, chunk: &[i16]) {
        self.extend_from_slice(chunk);
    }
}

/// A loaded speech-synthesis voice.
///
/// Voices are immutable once loaded apart from the inference session state an
/// engine may need to mutate while running.
pub trait Voice {
    /// Engine-specific failure type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Native output sample rate, if the voice reports one.
    fn sample_rate(&self) -> Option<u32>;

    /// Synthesize `text`, pushing raw 16-bit PCM chunks into `sink` in order.
    fn synthesize_stream_raw(
        &mut self,
        text: &str,
        sink: &mut dyn AudioSink,
    ) -> std::result::Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_wav_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/out.wav");

        write_wav(&[0, 1000, -1000, i16::MAX], 16000, &path).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_rate, 16000);
        assert_eq!(spec.sample_format, hound::SampleFormat::Int);
        assert_eq!(reader.len(), 4);
    }

    #[test]
    fn write_wav_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");

        write_wav(&[1; 100], 22050, &path).unwrap();
        write_wav(&[2; 10], 22050, &path).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![2; 10]);
    }

    #[test]
    fn wav_duration_matches_sample_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("second.wav");
        let audio = AudioSamples {
            samples: vec![0; 22050],
            sample_rate: 22050,
        };

        audio.write_wav(&path).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.duration(), 22050);
        assert!((audio.duration_secs() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn vec_sink_concatenates_chunks() {
        let mut sink: Vec<i16> = Vec::new();
        sink.write_chunk(&[1, 2]);
        sink.write_chunk(&[]);
        sink.write_chunk(&[3]);
        assert_eq!(sink, vec![1, 2, 3]);
    }
}
