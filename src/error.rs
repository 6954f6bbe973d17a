//! Unified error types for chordscope
//!
//! Error strategy:
//! - Best-effort stages (metadata, transcription): absorbed at the stage
//!   boundary, logged, output field left absent
//! - Required stages (feature extraction, chord recognition): fatal, abort
//!   the run and surface as [`AnalysisError`] naming the stage
//!
//! All errors include actionable suggestions where possible.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Supported audio formats for helpful error messages
pub const SUPPORTED_FORMATS: &str = "MP3, WAV, FLAC, AIFF, OGG, AAC";

/// Pipeline stage identifiers, in execution order of the reference pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Metadata,
    PrimaryFeatures,
    SecondaryFeatures,
    Chords,
    Transcription,
}

impl Stage {
    /// Label used in logs and error messages
    pub fn label(self) -> &'static str {
        match self {
            Stage::Metadata => "metadata",
            Stage::PrimaryFeatures => "primary feature extraction",
            Stage::SecondaryFeatures => "secondary feature extraction",
            Stage::Chords => "chord recognition",
            Stage::Transcription => "transcription",
        }
    }

    /// Whether a failure in this stage aborts the run
    pub fn is_required(self) -> bool {
        matches!(
            self,
            Stage::PrimaryFeatures | Stage::SecondaryFeatures | Stage::Chords
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Non-fatal stage errors
// =============================================================================

/// Tag metadata could not be read
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Failed to read tags from '{path}': {reason}")]
    Unreadable { path: PathBuf, reason: String },
}

/// Speech-to-text failed; the record's transcription is left absent
#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("Transcription unavailable: {reason}\n  Tip: Set OPENAI_API_KEY or pass --openai-api-key")]
    Unavailable { reason: String },

    #[error("Transcription request failed: {reason}")]
    Request { reason: String },

    #[error("Transcription API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Transcription timed out after {}s", .timeout.as_secs())]
    Timeout { timeout: Duration },

    #[error("Cannot read audio for transcription '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// =============================================================================
// Fatal stage errors
// =============================================================================

/// Feature extraction failed (fatal)
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Failed to decode audio file '{path}': {reason}\n  Supported formats: {SUPPORTED_FORMATS}\n  Tip: If the file plays in other apps, it may be corrupted or use an unsupported codec")]
    Decode { path: PathBuf, reason: String },

    #[error("Audio too short ({duration:.1}s). Minimum {minimum:.0}s required for reliable analysis")]
    TooShort { duration: f64, minimum: f64 },

    #[error("{extractor} extraction failed: {reason}")]
    Backend {
        extractor: &'static str,
        reason: String,
    },
}

impl ExtractionError {
    /// Create a decode error with context about the issue
    pub fn decode(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ExtractionError::Decode {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Chord recognition failed (fatal)
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("Cannot recognize chords in an empty waveform")]
    EmptyWaveform,

    #[error("Invalid sample rate {0} Hz for chord recognition")]
    InvalidSampleRate(u32),

    #[error("Chord classifier '{classifier}' failed: {reason}")]
    Classifier {
        classifier: &'static str,
        reason: String,
    },

    #[error("Chord recognition cancelled")]
    Cancelled,
}

// =============================================================================
// Run-level error
// =============================================================================

/// Top-level error returned by an analysis run
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{stage} failed: {source}")]
    Extraction {
        stage: Stage,
        #[source]
        source: ExtractionError,
    },

    #[error("chord recognition failed: {source}")]
    Recognition {
        #[source]
        source: RecognitionError,
    },

    #[error("Analysis cancelled during {stage}")]
    Cancelled { stage: Stage },

    #[error("File not found: '{0}'\n  Tip: Check the path exists and is accessible")]
    FileNotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Cannot write output to '{path}': {reason}\n  Tip: Check write permissions for the output directory")]
    Output { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for analysis runs
pub type Result<T> = std::result::Result<T, AnalysisError>;

impl AnalysisError {
    /// The pipeline stage that produced this error, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            AnalysisError::Extraction { stage, .. } => Some(*stage),
            AnalysisError::Recognition { .. } => Some(Stage::Chords),
            AnalysisError::Cancelled { stage } => Some(*stage),
            _ => None,
        }
    }

    /// Wrap a fatal extraction failure with its stage
    pub fn extraction(stage: Stage, source: ExtractionError) -> Self {
        AnalysisError::Extraction { stage, source }
    }
}

impl From<RecognitionError> for AnalysisError {
    fn from(source: RecognitionError) -> Self {
        match source {
            RecognitionError::Cancelled => AnalysisError::Cancelled {
                stage: Stage::Chords,
            },
            other => AnalysisError::Recognition { source: other },
        }
    }
}
