//! Recognition timing across image resolutions.
//!
//! Each scale factor is run in isolation: a failing iteration is recorded in
//! the report and the remaining factors still run.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Local};
use image::{DynamicImage, GenericImageView};
use serde::Serialize;

use crate::config::OCR_LANGUAGES;
use crate::error::{Error, Result};
use crate::ocr::{detect_text, open_image, DetectedText, EngineCache, RecognitionEngine};

/// Full, half and quarter resolution.
pub const DEFAULT_SCALE_FACTORS: [f64; 3] = [1.0, 0.5, 0.25];

const RULE_WIDE: usize = 50;
const RULE_NARROW: usize = 40;

/// Outcome of recognizing one scaled copy of the image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkResult {
    pub scale_factor: f64,
    pub resolution: (u32, u32),
    /// Seconds spent in recognition; 0 for failed tests
    pub execution_time: f64,
    pub detected_text: DetectedText,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BenchmarkResult {
    pub fn resolution_label(&self) -> String {
        format!("{}x{}", self.resolution.0, self.resolution.1)
    }
}

/// Average, fastest and slowest over successful tests.
#[derive(Debug, Clone, Copy)]
pub struct Summary<'a> {
    pub average_secs: f64,
    pub fastest: &'a BenchmarkResult,
    pub slowest: &'a BenchmarkResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    pub image_path: PathBuf,
    pub original_resolution: (u32, u32),
    pub timestamp: DateTime<Local>,
    pub languages: Vec<String>,
    pub gpu_enabled: bool,
    pub results: Vec<BenchmarkResult>,
}

impl BenchmarkReport {
    pub fn successful(&self) -> impl Iterator<Item = &BenchmarkResult> {
        self.results.iter().filter(|r| r.success)
    }

    /// `None` when no test succeeded.
    pub fn summary(&self) -> Option<Summary<'_>> {
        let fastest = self
            .successful()
            .min_by(|a, b| a.execution_time.total_cmp(&b.execution_time))?;
        let slowest = self
            .successful()
            .max_by(|a, b| a.execution_time.total_cmp(&b.execution_time))?;
        let (count, total) = self
            .successful()
            .fold((0usize, 0.0f64), |(n, sum), r| (n + 1, sum + r.execution_time));

        Some(Summary {
            average_secs: total / count as f64,
            fastest,
            slowest,
        })
    }

    /// Write the plain-text report, replacing any existing file.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_string())?;
        Ok(())
    }
}

impl fmt::Display for BenchmarkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let wide = "=".repeat(RULE_WIDE);
        let narrow = "-".repeat(RULE_NARROW);

        writeln!(f, "OCR Benchmark Results")?;
        writeln!(f, "{wide}")?;
        writeln!(f, "Original Image: {}", self.image_path.display())?;
        writeln!(
            f,
            "Original Resolution: {}x{}",
            self.original_resolution.0, self.original_resolution.1
        )?;
        writeln!(f, "Timestamp: {}", self.timestamp.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(f, "Language(s): {}", self.languages.join(", "))?;
        writeln!(f, "GPU Enabled: {}", self.gpu_enabled)?;
        writeln!(f)?;

        for (i, result) in self.results.iter().enumerate() {
            writeln!(
                f,
                "Test {}: Resolution {} (Scale: {:.2})",
                i + 1,
                result.resolution_label(),
                result.scale_factor
            )?;
            writeln!(f, "{narrow}")?;

            if result.success {
                writeln!(f, "Execution Time: {:.3} seconds", result.execution_time)?;
                writeln!(f, "Text Elements Detected: {}", result.detected_text.len())?;
                writeln!(f, "Detected Text:")?;
                if result.detected_text.is_empty() {
                    writeln!(f, "  No text detected")?;
                }
                for (j, text) in result.detected_text.fragments().iter().enumerate() {
                    writeln!(f, "  {}. {}", j + 1, text)?;
                }
            } else {
                writeln!(f, "Status: FAILED")?;
                writeln!(
                    f,
                    "Error: {}",
                    result.error.as_deref().unwrap_or("Unknown error")
                )?;
            }
            writeln!(f)?;
        }

        writeln!(f, "Summary")?;
        writeln!(f, "{wide}")?;
        match self.summary() {
            Some(summary) => {
                writeln!(
                    f,
                    "Average Execution Time: {:.3} seconds",
                    summary.average_secs
                )?;
                writeln!(
                    f,
                    "Fastest Test: {} ({:.3}s)",
                    summary.fastest.resolution_label(),
                    summary.fastest.execution_time
                )?;
                writeln!(
                    f,
                    "Slowest Test: {} ({:.3}s)",
                    summary.slowest.resolution_label(),
                    summary.slowest.execution_time
                )
            }
            None => writeln!(f, "No successful tests completed."),
        }
    }
}

/// Integer dimensions of `(width, height)` scaled by `scale`, truncated.
pub fn scaled_dimensions(width: u32, height: u32, scale: f64) -> (u32, u32) {
    (
        (f64::from(width) * scale) as u32,
        (f64::from(height) * scale) as u32,
    )
}

/// Time recognition on downscaled copies of `image_path` and write a report.
///
/// Scale factors must lie in `(0, 1]`. Scaled copies live in a temporary
/// directory that is removed afterwards; failure to remove it is only logged.
pub fn run_benchmark<E: RecognitionEngine>(
    engines: &EngineCache<E>,
    image_path: &Path,
    scale_factors: &[f64],
    report_path: &Path,
    gpu_requested: bool,
) -> Result<BenchmarkReport> {
    if let Some(bad) = scale_factors
        .iter()
        .find(|s| !(s.is_finite() && **s > 0.0 && **s <= 1.0))
    {
        return Err(Error::InvalidArgument(format!(
            "scale factor {bad} is outside (0, 1]"
        )));
    }
    if gpu_requested {
        log::warn!("GPU benchmark requested but recognition runs on CPU only; reusing cached engine");
    }

    let original = open_image(image_path)?;
    let (width, height) = original.dimensions();
    log::info!(
        "Starting benchmark for image: {} ({}x{})",
        image_path.display(),
        width,
        height
    );

    let temp_dir = tempfile::Builder::new()
        .prefix("ocr-benchmark-")
        .tempdir()?;
    let stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    let total = scale_factors.len();
    let mut results = Vec::with_capacity(total);
    for (i, &scale) in scale_factors.iter().enumerate() {
        let resolution = scaled_dimensions(width, height, scale);
        log::info!(
            "Testing resolution {}/{}: {}x{} (scale: {:.2})",
            i + 1,
            total,
            resolution.0,
            resolution.1,
            scale
        );

        let temp_path = temp_dir
            .path()
            .join(format!("scaled_{i}_{scale:.2}_{stem}.png"));
        let result = match time_scaled(engines, &original, resolution, &temp_path, gpu_requested) {
            Ok((execution_time, detected_text)) => {
                log::info!(
                    "Execution time: {:.3} seconds, {} text elements",
                    execution_time,
                    detected_text.len()
                );
                BenchmarkResult {
                    scale_factor: scale,
                    resolution,
                    execution_time,
                    detected_text,
                    success: true,
                    error: None,
                }
            }
            Err(e) => {
                log::warn!("Error during OCR at scale {scale:.2}: {e}");
                BenchmarkResult {
                    scale_factor: scale,
                    resolution,
                    execution_time: 0.0,
                    detected_text: DetectedText::default(),
                    success: false,
                    error: Some(e.to_string()),
                }
            }
        };
        results.push(result);

        if temp_path.exists() {
            if let Err(e) = std::fs::remove_file(&temp_path) {
                log::warn!("Failed to remove {}: {e}", temp_path.display());
            }
        }
    }

    if let Err(e) = temp_dir.close() {
        log::warn!("Failed to remove benchmark temp directory: {e}");
    }

    let report = BenchmarkReport {
        image_path: image_path.to_path_buf(),
        original_resolution: (width, height),
        timestamp: Local::now(),
        languages: OCR_LANGUAGES.iter().map(|l| l.to_string()).collect(),
        gpu_enabled: false,
        results,
    };
    report.write_to(report_path)?;
    log::info!(
        "Benchmark completed! Results saved to: {}",
        report_path.display()
    );

    Ok(report)
}

/// Downscale, write to `temp_path`, and time recognition on the copy.
fn time_scaled<E: RecognitionEngine>(
    engines: &EngineCache<E>,
    original: &DynamicImage,
    (width, height): (u32, u32),
    temp_path: &Path,
    gpu_requested: bool,
) -> Result<(f64, DetectedText)> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidArgument(format!(
            "scaled resolution {width}x{height} has no pixels"
        )));
    }

    if original.dimensions() == (width, height) {
        original.save(temp_path)?;
    } else {
        // Area-averaging downscale.
        original.thumbnail_exact(width, height).save(temp_path)?;
    }

    let start = Instant::now();
    let detected_text = detect_text(engines, temp_path, gpu_requested)?;
    Ok((start.elapsed().as_secs_f64(), detected_text))
}
