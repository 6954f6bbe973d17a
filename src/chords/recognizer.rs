//! Fixed-rate chord framing
//!
//! The recognizer slices a waveform into frames at `F` decisions per second
//! and hands each one to a [`ChordClassifier`]. Frame `i` starts at
//! `i / F` seconds.

use crate::analysis::traits::ChordClassifier;
use crate::error::RecognitionError;
use crate::types::ChordLabel;
use std::sync::Arc;
use tracing::{debug, trace};

/// How many frames are classified between cancellation checks
pub const CANCEL_CHECK_INTERVAL: usize = 64;

/// One decision of the recognizer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameLabel {
    pub index: usize,
    /// Start of the frame in seconds (`index / frame_rate`)
    pub time: f64,
    pub label: ChordLabel,
    pub confidence: Option<f64>,
}

impl FrameLabel {
    pub fn new(index: usize, frame_rate: f64, label: ChordLabel) -> Self {
        Self {
            index,
            time: index as f64 / frame_rate,
            label,
            confidence: None,
        }
    }
}

/// Fixed-rate framing over a pluggable classifier
pub struct ChordRecognizer {
    classifier: Arc<dyn ChordClassifier>,
    frame_rate: f64,
}

impl ChordRecognizer {
    pub fn new(classifier: Arc<dyn ChordClassifier>, frame_rate: f64) -> Self {
        Self {
            classifier,
            frame_rate,
        }
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    /// Name of the underlying classifier
    pub fn classifier_name(&self) -> &'static str {
        self.classifier.name()
    }

    /// Classify every frame of `waveform`
    pub fn recognize(
        &self,
        waveform: &[f32],
        sample_rate: u32,
    ) -> Result<Vec<FrameLabel>, RecognitionError> {
        self.recognize_until(waveform, sample_rate, || false)
    }

    /// Like [`recognize`](Self::recognize), polling `is_cancelled` every
    /// [`CANCEL_CHECK_INTERVAL`] frames
    pub fn recognize_until<C>(
        &self,
        waveform: &[f32],
        sample_rate: u32,
        is_cancelled: C,
    ) -> Result<Vec<FrameLabel>, RecognitionError>
    where
        C: Fn() -> bool,
    {
        if sample_rate == 0 {
            return Err(RecognitionError::InvalidSampleRate(sample_rate));
        }
        if waveform.is_empty() {
            return Err(RecognitionError::EmptyWaveform);
        }

        let hop = self.hop_size(sample_rate)?;
        let frame_count = waveform.len().div_ceil(hop);
        debug!(
            "Recognizing chords: {} frames of {} samples ({} Hz) with {}",
            frame_count,
            hop,
            self.frame_rate,
            self.classifier.name()
        );

        let mut frames = Vec::with_capacity(frame_count);
        for (index, chunk) in waveform.chunks(hop).enumerate() {
            if index % CANCEL_CHECK_INTERVAL == 0 && is_cancelled() {
                return Err(RecognitionError::Cancelled);
            }

            let decision = self.classifier.classify(chunk, sample_rate)?;
            trace!("frame {}: {}", index, decision.label);
            frames.push(FrameLabel {
                confidence: decision.confidence,
                ..FrameLabel::new(index, self.frame_rate, decision.label)
            });
        }

        Ok(frames)
    }

    /// Samples per frame: `round(sample_rate / frame_rate)`
    ///
    /// Timestamps stay `index / frame_rate`, so when the division is inexact
    /// frame `i` starts up to `i * 0.5` samples away from its timestamp
    /// (22050 Hz at 16 Hz: hop 1378 against 1378.125).
    fn hop_size(&self, sample_rate: u32) -> Result<usize, RecognitionError> {
        let hop = (sample_rate as f64 / self.frame_rate).round();
        if !(hop.is_finite() && hop >= 1.0) {
            return Err(RecognitionError::Classifier {
                classifier: self.classifier.name(),
                reason: format!(
                    "frame rate {} Hz is too high for {} Hz audio",
                    self.frame_rate, sample_rate
                ),
            });
        }
        Ok(hop as usize)
    }
}
