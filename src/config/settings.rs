//! Runtime configuration settings
//!
//! Built once at startup and passed by value into the orchestrator; nothing
//! here is mutated after construction.

use crate::error::{AnalysisError, Result};
use std::time::Duration;

/// Default chord decision rate (one label every 100 ms)
pub const DEFAULT_FRAME_RATE: f64 = 10.0;

/// Confidence assigned to every segment when the classifier exposes none
pub const DEFAULT_CHORD_CONFIDENCE: f64 = 0.85;

/// Fixed tail length used by [`TailDuration::Fixed`] in its historical setting
pub const FIXED_TAIL_SECS: f64 = 0.5;

/// How long the final chord segment lasts, given no following frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TailDuration {
    /// Extend to the end of the segment's last frame (frame count / frame rate)
    FrameSpan,
    /// Constant length, independent of the track tail
    Fixed(f64),
}

/// What "most common chord" counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prevalence {
    /// Number of frames labeled with the chord
    Frames,
    /// Number of merged segments with the chord
    Segments,
}

/// Chord recognition and summarization parameters
#[derive(Debug, Clone)]
pub struct ChordSettings {
    /// Frames per second
    pub frame_rate: f64,
    /// Segment confidence when frames carry none
    pub default_confidence: f64,
    pub tail: TailDuration,
    pub prevalence: Prevalence,
    /// Frames with RMS below this decode as no-chord
    pub silence_rms: f32,
}

impl ChordSettings {
    /// Seconds per frame
    pub fn frame_period(&self) -> f64 {
        1.0 / self.frame_rate
    }
}

impl Default for ChordSettings {
    fn default() -> Self {
        Self {
            frame_rate: DEFAULT_FRAME_RATE,
            default_confidence: DEFAULT_CHORD_CONFIDENCE,
            tail: TailDuration::FrameSpan,
            prevalence: Prevalence::Frames,
            silence_rms: 1e-3,
        }
    }
}

/// Speech-to-text provider settings
#[derive(Debug, Clone)]
pub struct TranscriptionSettings {
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    /// Language hint passed to the provider
    pub language: Option<String>,
    /// Upper bound on the whole transcription stage
    pub timeout: Duration,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: "https://api.openai.com/v1".to_string(),
            model: "whisper-1".to_string(),
            language: None,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Runtime settings for the analysis pipeline
#[derive(Debug, Clone)]
pub struct Settings {
    /// Rate the decoder resamples to before analysis
    pub analysis_sample_rate: u32,
    /// Shorter audio fails primary extraction
    pub min_duration_secs: f64,
    /// Run secondary extraction and chord recognition concurrently
    pub parallel_stages: bool,
    pub chords: ChordSettings,
    pub transcription: TranscriptionSettings,
}

impl Settings {
    /// Create settings from CLI arguments
    pub fn from_cli(cli: &super::cli::Cli) -> Self {
        let defaults = Self::default();

        Self {
            parallel_stages: cli.parallel,
            chords: ChordSettings {
                frame_rate: cli.frame_rate,
                ..defaults.chords
            },
            transcription: TranscriptionSettings {
                api_key: cli.openai_api_key.clone().filter(|k| !k.trim().is_empty()),
                language: cli.language.clone(),
                timeout: Duration::from_secs(cli.transcription_timeout),
                ..defaults.transcription
            },
            ..defaults
        }
    }

    /// Reject values that would make the pipeline misbehave
    pub fn validate(&self) -> Result<()> {
        if self.analysis_sample_rate == 0 {
            return Err(AnalysisError::Config(
                "analysis sample rate must be positive".to_string(),
            ));
        }
        if !(self.chords.frame_rate.is_finite() && self.chords.frame_rate > 0.0) {
            return Err(AnalysisError::Config(format!(
                "chord frame rate must be positive, got {}",
                self.chords.frame_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.chords.default_confidence) {
            return Err(AnalysisError::Config(format!(
                "default chord confidence must be within [0, 1], got {}",
                self.chords.default_confidence
            )));
        }
        if let TailDuration::Fixed(secs) = self.chords.tail {
            if !(secs.is_finite() && secs >= 0.0) {
                return Err(AnalysisError::Config(format!(
                    "fixed tail duration must be non-negative, got {}",
                    secs
                )));
            }
        }
        if self.transcription.timeout.is_zero() {
            return Err(AnalysisError::Config(
                "transcription timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            analysis_sample_rate: crate::audio::TARGET_SAMPLE_RATE,
            min_duration_secs: 3.0,
            parallel_stages: false,
            chords: ChordSettings::default(),
            transcription: TranscriptionSettings::default(),
        }
    }
}
