//! Photo capture and upload collaborators.
//!
//! Both sit outside the recognition → speech core. Capture failures are
//! fatal to a pipeline run; upload is a best-effort side channel.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::error::{Error, Result};

/// Produces a photo on disk.
pub trait CaptureProvider {
    /// Capture one photo, to `output_path` or a provider-chosen location.
    fn capture_photo(&self, output_path: Option<&Path>) -> Result<PathBuf>;
}

/// Options for an upload.
#[derive(Debug, Clone, Default)]
pub struct UploadMetadata {
    /// Remote object name; providers pick a timestamped one when `None`.
    pub remote_path: Option<String>,
    pub make_public: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded { url: String },
    Failed { error: String },
}

/// Best-effort remote persistence of an artifact.
pub trait UploadProvider {
    fn upload(&self, file_path: &Path, metadata: &UploadMetadata) -> UploadOutcome;
}

/// Captures stills by running a camera command such as `rpicam-still`.
#[derive(Debug, Clone)]
pub struct CommandCapture {
    pub program: PathBuf,
    pub captures_dir: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Sensor warm-up before the shot.
    pub warmup: Duration,
}

impl Default for CommandCapture {
    fn default() -> Self {
        Self {
            program: PathBuf::from("rpicam-still"),
            captures_dir: PathBuf::from("Camera/Captures"),
            width: 1920,
            height: 1080,
            warmup: Duration::from_secs(1),
        }
    }
}

impl CommandCapture {
    /// `captures_dir/capture_<YYYYmmdd_HHMMSS>.jpg`
    pub fn default_output_path(&self) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        self.captures_dir.join(format!("capture_{timestamp}.jpg"))
    }
}

impl CaptureProvider for CommandCapture {
    fn capture_photo(&self, output_path: Option<&Path>) -> Result<PathBuf> {
        let output_path = output_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.default_output_path());
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        log::info!(
            "Capturing {}x{} photo to {}",
            self.width,
            self.height,
            output_path.display()
        );
        let output = Command::new(&self.program)
            .arg("-n")
            .arg("-t")
            .arg(self.warmup.as_millis().to_string())
            .arg("--width")
            .arg(self.width.to_string())
            .arg("--height")
            .arg(self.height.to_string())
            .arg("-o")
            .arg(&output_path)
            .output()
            .map_err(|e| Error::Capture(format!("failed to run {}: {e}", self.program.display())))?;

        if !output.status.success() {
            return Err(Error::Capture(format!(
                "{} exited with code {:?}: {}",
                self.program.display(),
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if !output_path.is_file() {
            return Err(Error::Capture(format!(
                "{} reported success but wrote no file at {}",
                self.program.display(),
                output_path.display()
            )));
        }
        Ok(output_path)
    }
}
