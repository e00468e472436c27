use std::path::Path;

use ndarray::Array2;
use ort::execution_providers::CPUExecutionProvider;
use ort::inputs;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;

use super::config::InferenceConfig;

/// Lower bound on the peak used for normalization, so near-silence is not
/// amplified into noise.
const MIN_PEAK: f32 = 0.01;

#[derive(thiserror::Error, Debug)]
pub enum PiperError {
    #[error("ONNX runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error(
        "espeak-ng not found. Install: Linux: `sudo apt-get install espeak-ng`, \
         macOS: `brew install espeak-ng`, Windows: https://espeak-ng.org/download"
    )]
    EspeakNotFound,
    #[error("Phonemization failed: {0}")]
    PhonemizerFailed(String),
    #[error("Invalid voice config: {0}")]
    Config(String),
}

/// Piper VITS ONNX session.
pub struct PiperModel {
    session: Session,
    /// True for multi-speaker models, which take a `sid` input
    has_speaker_input: bool,
}

impl PiperModel {
    pub fn load(model_path: &Path, num_threads: Option<usize>) -> Result<Self, PiperError> {
        log::info!("Loading Piper model from {}", model_path.display());

        let providers = vec![CPUExecutionProvider::default().build()];
        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_execution_providers(providers)?;
        if let Some(threads) = num_threads {
            builder = builder
                .with_intra_threads(threads)?
                .with_inter_threads(1)?;
        }
        let session = builder.commit_from_file(model_path)?;

        let has_speaker_input = session.inputs().iter().any(|input| input.name() == "sid");
        log::debug!("Detected: has_speaker_input={has_speaker_input}");

        Ok(Self {
            session,
            has_speaker_input,
        })
    }

    /// Run the model over one sentence of phoneme ids, returning float audio.
    pub fn infer(
        &mut self,
        ids: &[i64],
        scales: &InferenceConfig,
        speaker_id: Option<i64>,
    ) -> Result<Vec<f32>, PiperError> {
        let input = Array2::from_shape_vec((1, ids.len()), ids.to_vec())?;
        let input_lengths = ndarray::arr1(&[ids.len() as i64]);
        let scales = ndarray::arr1(&[scales.noise_scale, scales.length_scale, scales.noise_w]);

        let output = match speaker_id.filter(|_| self.has_speaker_input) {
            Some(sid) => {
                let sid_arr = ndarray::arr1(&[sid]);
                let inputs = inputs![
                    "input" => TensorRef::from_array_view(input.view())?,
                    "input_lengths" => TensorRef::from_array_view(input_lengths.view())?,
                    "scales" => TensorRef::from_array_view(scales.view())?,
                    "sid" => TensorRef::from_array_view(sid_arr.view())?,
                ];
                self.session.run(inputs)?
            }
            None => {
                let inputs = inputs![
                    "input" => TensorRef::from_array_view(input.view())?,
                    "input_lengths" => TensorRef::from_array_view(input_lengths.view())?,
                    "scales" => TensorRef::from_array_view(scales.view())?,
                ];
                self.session.run(inputs)?
            }
        };

        // Output shape is [1, 1, 1, samples]
        let first_output = output
            .iter()
            .next()
            .ok_or_else(|| PiperError::Ort(ort::Error::new("No output from model")))?;
        let waveform = first_output.1.try_extract_array::<f32>()?;

        Ok(waveform.iter().copied().collect())
    }
}

/// Peak-normalize float audio into 16-bit PCM.
pub fn audio_to_i16(audio: &[f32]) -> Vec<i16> {
    let peak = audio
        .iter()
        .fold(0.0f32, |max, &s| max.max(s.abs()))
        .max(MIN_PEAK);
    let gain = i16::MAX as f32 / peak;

    audio
        .iter()
        .map(|&s| (s * gain).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_peak_to_full_scale() {
        let pcm = audio_to_i16(&[0.0, 0.25, -0.5]);
        assert_eq!(pcm, vec![0, 16383, -32767]);
    }

    #[test]
    fn near_silence_is_not_amplified() {
        let pcm = audio_to_i16(&[0.001, -0.001]);
        assert_eq!(pcm, vec![3276, -3276]);
    }

    #[test]
    fn empty_audio_stays_empty() {
        assert!(audio_to_i16(&[]).is_empty());
    }
}
