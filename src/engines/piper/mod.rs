//! Piper text-to-speech engine implementation.
//!
//! Piper voices are VITS models exported to ONNX, each shipped with a JSON
//! config holding the sample rate, espeak-ng voice, inference scales and the
//! phoneme-to-id map. Text is phonemized with espeak-ng, split into sentences,
//! and each sentence is synthesized as one chunk.
//!
//! # System Requirements
//!
//! **espeak-ng** must be installed on your system:
//! - **Linux / Raspberry Pi OS**: `sudo apt-get install espeak-ng`
//! - **macOS**: `brew install espeak-ng`
//!
//! # Voice Layout
//!
//! ```text
//! TTS/
//! ├── en_US-amy-low.onnx        # VITS model
//! └── en_US-amy-low.onnx.json   # config (inferred as `<model>.json` when omitted)
//! ```
//!
//! Prebuilt voices: <https://huggingface.co/rhasspy/piper-voices>
//!
//! GPU execution is not supported; voices always run on the ONNX Runtime CPU
//! provider.

pub mod config;
pub mod engine;
pub mod model;
pub mod phonemizer;

pub use engine::{PiperLoader, PiperVoice};
pub use model::PiperError;
pub use phonemizer::EspeakConfig;
