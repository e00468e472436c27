use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};

use readout::engines::piper::PiperLoader;
use readout::ocr::ocrs::OcrsEngine;
use readout::config::{self, RTEN_THREADS_ENV};
use readout::{
    detect_regions, load_voice, run_benchmark, synthesize, CommandCapture, Error, Pipeline,
    PipelineOptionsBuilder, DEFAULT_SCALE_FACTORS,
};

/// Read printed text aloud: OCR on a photo, Piper speech, WAV output
#[derive(Parser)]
#[command(name = "readout", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Recognize the text in an image and speak it into a WAV file
    Run {
        /// Path to the image to analyse
        image: PathBuf,
        #[command(flatten)]
        speech: SpeechArgs,
    },
    /// Capture a photo with the camera and speak its text
    Capture {
        /// Directory for captured photos
        #[arg(long, env = "READOUT_CAPTURES_DIR", default_value = "Camera/Captures")]
        captures_dir: PathBuf,
        /// Camera still-capture command
        #[arg(long, env = "READOUT_CAMERA_CMD", default_value = "rpicam-still")]
        camera_cmd: PathBuf,
        #[command(flatten)]
        speech: SpeechArgs,
    },
    /// Print the text fragments recognized in an image
    Ocr {
        image: PathBuf,
        /// Request GPU (ignored; recognition is CPU only)
        #[arg(long)]
        gpu: bool,
        /// Print each fragment with its bounding box
        #[arg(long)]
        boxes: bool,
    },
    /// Time recognition on downscaled copies of an image
    Benchmark {
        image: PathBuf,
        /// Where to write the plain-text report
        #[arg(long, default_value = "ocr_benchmark_results.txt")]
        report: PathBuf,
        /// Scale factor in (0, 1]; repeat for several (default 1.0 0.5 0.25)
        #[arg(long = "scale")]
        scales: Vec<f64>,
        /// Request GPU (ignored; recognition is CPU only)
        #[arg(long)]
        gpu: bool,
        /// Also print the results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Synthesize text with a Piper voice
    Speak {
        /// Path to the Piper .onnx model
        #[arg(long)]
        model: PathBuf,
        /// Path to the Piper config JSON (defaults to <model>.json)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Inline text to synthesise
        #[arg(long, conflicts_with = "text_file", required_unless_present = "text_file")]
        text: Option<String>,
        /// Path to a UTF-8 text file to synthesise
        #[arg(long)]
        text_file: Option<PathBuf>,
        /// Path to write the generated WAV file
        #[arg(long, default_value = "tts_output.wav")]
        output: PathBuf,
        /// Request GPU (ignored; synthesis is CPU only)
        #[arg(long)]
        use_gpu: bool,
    },
}

#[derive(Args)]
struct SpeechArgs {
    /// Where to save the generated WAV file
    #[arg(long, default_value = "output.wav")]
    output: PathBuf,
    /// Override for the Piper .onnx model path
    #[arg(long)]
    model: Option<PathBuf>,
    /// Override for the Piper config JSON path
    #[arg(long)]
    config: Option<PathBuf>,
    /// Try to run OCR with GPU acceleration
    #[arg(long)]
    ocr_gpu: bool,
    /// Try to run TTS with GPU acceleration
    #[arg(long)]
    tts_gpu: bool,
    /// Message to speak if OCR finds no text
    #[arg(long, default_value = config::DEFAULT_FALLBACK_TEXT)]
    fallback_text: String,
}

impl SpeechArgs {
    fn options(&self) -> Result<readout::PipelineOptions, Error> {
        let mut builder = PipelineOptionsBuilder::default();
        builder
            .ocr_gpu(self.ocr_gpu)
            .tts_gpu(self.tts_gpu)
            .fallback_text(self.fallback_text.clone());
        if let Some(model) = &self.model {
            builder.model_path(model.clone());
        }
        if let Some(config) = &self.config {
            builder.config_path(config.clone());
        }
        builder
            .build()
            .map_err(|e| Error::InvalidArgument(e.to_string()))
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Still single-threaded: safe to touch the environment.
    if let Some(threads) = config::rten_threads_value(
        std::env::var_os(RTEN_THREADS_ENV).as_deref(),
        config::ocr_threads(),
    ) {
        std::env::set_var(RTEN_THREADS_ENV, threads);
    }

    let cli = Cli::parse();
    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            let mut source = std::error::Error::source(&err);
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn execute(command: Command) -> Result<(), Error> {
    match command {
        Command::Run { image, speech } => {
            let pipeline = Pipeline::new(OcrsEngine::cache_from_env(), PiperLoader::default());
            let wav = pipeline.run(&image, &speech.output, &speech.options()?)?;
            println!("Saved synthesised audio to {}", wav.display());
        }
        Command::Capture {
            captures_dir,
            camera_cmd,
            speech,
        } => {
            let camera = CommandCapture {
                program: camera_cmd,
                captures_dir,
                ..CommandCapture::default()
            };
            let pipeline = Pipeline::new(OcrsEngine::cache_from_env(), PiperLoader::default());
            let (photo, artifact) =
                pipeline.capture_and_speak(&camera, None, &speech.output, &speech.options()?)?;
            println!("Photo: {}", photo.display());
            println!("Audio: {}", artifact.path.display());
        }
        Command::Ocr { image, gpu, boxes } => {
            let engines = OcrsEngine::cache_from_env();
            let detections = detect_regions(&engines, &image, gpu)?;
            if boxes {
                for detection in &detections {
                    match &detection.bounds {
                        Some(bounds) => println!("[{bounds}] {}", detection.text),
                        None => println!("[?] {}", detection.text),
                    }
                }
            } else {
                let fragments: Vec<&str> = detections.iter().map(|d| d.text.as_str()).collect();
                println!("Detected text: {fragments:?}");
            }
        }
        Command::Benchmark {
            image,
            report,
            scales,
            gpu,
            json,
        } => {
            let scales = if scales.is_empty() {
                DEFAULT_SCALE_FACTORS.to_vec()
            } else {
                scales
            };
            let engines = OcrsEngine::cache_from_env();
            let results = run_benchmark(&engines, &image, &scales, &report, gpu)?;
            if json {
                let rendered = serde_json::to_string_pretty(&results)
                    .map_err(|e| Error::InvalidArgument(format!("cannot render JSON: {e}")))?;
                println!("{rendered}");
            }
            println!("Benchmark results saved to: {}", report.display());
        }
        Command::Speak {
            model,
            config,
            text,
            text_file,
            output,
            use_gpu,
        } => {
            let start = Instant::now();
            let text = read_text_argument(text, text_file.as_deref())?;
            let mut voice = load_voice(&PiperLoader::default(), &model, config.as_deref(), use_gpu)?;
            let audio = synthesize(&mut voice, &text)?;
            audio.write_wav(&output)?;
            println!(
                "Synthesised {:.2}s of audio to {} in {:.2?}",
                audio.duration_secs(),
                output.display(),
                start.elapsed()
            );
        }
    }
    Ok(())
}

fn read_text_argument(text: Option<String>, text_file: Option<&Path>) -> Result<String, Error> {
    match (text, text_file) {
        (Some(text), _) if !text.trim().is_empty() => Ok(text),
        (_, Some(path)) => {
            if !path.is_file() {
                return Err(Error::not_found("text file", path));
            }
            Ok(std::fs::read_to_string(path)?.trim().to_string())
        }
        _ => Err(Error::InvalidArgument(
            "either --text or --text-file must be provided and non-empty".to_string(),
        )),
    }
}
