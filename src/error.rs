use std::fmt;
use std::path::{Path, PathBuf};

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`], stable across added context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Decode,
    InvalidArgument,
    Synthesis,
    EngineConstruction,
    Recognition,
    Capture,
    Io,
}

/// Pipeline stage an error surfaced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Capture,
    Recognize,
    LoadVoice,
    Synthesize,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Capture => "capture",
            Stage::Recognize => "recognize",
            Stage::LoadVoice => "load voice",
            Stage::Synthesize => "synthesize",
            Stage::Write => "write",
        };
        f.write_str(name)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{what} not found: {}", path.display())]
    NotFound { what: &'static str, path: PathBuf },
    #[error("failed to decode image {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("speech synthesis failed: {0}")]
    Synthesis(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("failed to construct recognition engine: {0}")]
    EngineConstruction(#[source] Box<Error>),
    #[error("text recognition failed: {0}")]
    Recognition(String),
    #[error("photo capture failed: {0}")]
    Capture(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WAV encoding error: {0}")]
    Wav(#[from] hound::Error),
    #[error("image encoding error: {0}")]
    Image(#[from] image::ImageError),
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn not_found(what: &'static str, path: &Path) -> Self {
        Error::NotFound {
            what,
            path: path.to_path_buf(),
        }
    }

    /// Wrap this error with the pipeline stage it came from.
    pub fn in_stage(self, stage: Stage) -> Self {
        Error::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// Kind of the underlying error, looking through stage context.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Decode { .. } => ErrorKind::Decode,
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::Synthesis(_) => ErrorKind::Synthesis,
            Error::EngineConstruction(_) => ErrorKind::EngineConstruction,
            Error::Recognition(_) => ErrorKind::Recognition,
            Error::Capture(_) => ErrorKind::Capture,
            Error::Io(_) | Error::Wav(_) | Error::Image(_) => ErrorKind::Io,
            Error::Stage { source, .. } => source.kind(),
        }
    }

    /// Stage the error was attributed to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_survives_stage_context() {
        let err = Error::not_found("voice model", Path::new("missing.onnx")).in_stage(Stage::LoadVoice);
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.stage(), Some(Stage::LoadVoice));
        assert_eq!(
            err.to_string(),
            "load voice stage failed: voice model not found: missing.onnx"
        );
    }

    #[test]
    fn engine_construction_keeps_its_own_kind() {
        let err = Error::EngineConstruction(Box::new(Error::not_found(
            "detection model",
            Path::new("models/det.rten"),
        )));
        assert_eq!(err.kind(), ErrorKind::EngineConstruction);
    }

    #[test]
    fn write_failures_are_io() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert_eq!(err.in_stage(Stage::Write).kind(), ErrorKind::Io);
    }
}
