//! Analysis trait abstractions
//!
//! These traits are the capability ports the orchestrator consumes. Default
//! implementations live next to this module; tests substitute stubs.

use crate::error::{ExtractionError, MetadataError, RecognitionError, TranscriptionError};
use crate::types::{AudioBuffer, ChordLabel, FeatureSet, TrackMetadata, TranscriptionResult};
use std::path::Path;

/// Tag metadata backend
pub trait MetadataReader: Send + Sync {
    /// Read title/artist/album/genre/year from the file's tags
    fn read(&self, path: &Path) -> Result<TrackMetadata, MetadataError>;

    /// Get the name of this reader (for logging)
    fn name(&self) -> &'static str;
}

/// Output of the primary extraction stage
///
/// `audio` is the single decoded waveform shared by every later stage; its
/// duration and source sample rate are authoritative for the record.
#[derive(Debug, Clone)]
pub struct PrimaryExtraction {
    pub features: FeatureSet,
    pub audio: AudioBuffer,
}

/// Spectral/timbral descriptor backend; also responsible for decoding
pub trait PrimaryFeatureExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<PrimaryExtraction, ExtractionError>;

    /// Get the name of this extractor (for logging)
    fn name(&self) -> &'static str;
}

/// Rhythm/tonal descriptor backend over an already-decoded waveform
pub trait SecondaryFeatureExtractor: Send + Sync {
    fn extract(&self, audio: &AudioBuffer) -> Result<FeatureSet, ExtractionError>;

    /// Get the name of this extractor (for logging)
    fn name(&self) -> &'static str;
}

/// Decision for one fixed-rate frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameClassification {
    pub label: ChordLabel,
    /// Per-frame confidence, if the classifier exposes one
    pub confidence: Option<f64>,
}

impl From<ChordLabel> for FrameClassification {
    fn from(label: ChordLabel) -> Self {
        Self {
            label,
            confidence: None,
        }
    }
}

/// Frame-level chord classifier
///
/// Maps one frame of mono samples to one of the 25 chord labels. Framing is
/// the recognizer's job, not the classifier's.
pub trait ChordClassifier: Send + Sync {
    fn classify(
        &self,
        frame: &[f32],
        sample_rate: u32,
    ) -> Result<FrameClassification, RecognitionError>;

    /// Get the name of this classifier (recorded in the summary)
    fn name(&self) -> &'static str;
}

/// Speech-to-text backend
pub trait Transcriber: Send + Sync {
    /// Transcribe the file; `Ok(None)` means the provider had nothing to return
    fn transcribe(
        &self,
        path: &Path,
        language: Option<&str>,
    ) -> Result<Option<TranscriptionResult>, TranscriptionError>;

    /// Get the name of this transcriber (for logging)
    fn name(&self) -> &'static str;
}
